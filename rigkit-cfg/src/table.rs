use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::de::DeserializeOwned;

pub use toml::Value;


/// Hierarchical key-value storage addressed with dotted keys, e.g. `router.log_events`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
	data: toml::Table,
}


impl Table {
	pub fn new() -> Table {
		Table::default()
	}

	pub fn from_toml(data: toml::Table) -> Table {
		Table { data }
	}

	pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Table> {
		let path = path.as_ref();
		let data = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file {}", path.display()))?;

		data.parse()
			.with_context(|| format!("Failed to parse config file {}", path.display()))
	}

	/// Collect `--key=value` arguments. Values are parsed as TOML where possible and kept as strings otherwise.
	/// A bare `--key` is treated as `--key=true`, anything not starting with `--` is ignored.
	pub fn from_args(args: impl IntoIterator<Item = String>) -> Table {
		let mut table = Table::new();

		for arg in args {
			let Some(arg) = arg.strip_prefix("--") else {
				log::debug!("Ignoring argument '{arg}'");
				continue
			};

			let (key, value) = match arg.split_once('=') {
				Some((key, raw)) => (key, parse_argument_value(raw)),
				None => (arg, Value::Boolean(true)),
			};

			if key.is_empty() {
				log::warn!("Ignoring argument with empty key '--{arg}'");
				continue
			}

			table.set_value(key, value);
		}

		table
	}

	pub fn from_cli() -> Table {
		// skip the executable name
		Table::from_args(std::env::args().skip(1))
	}

	pub fn save_to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
		let path = path.as_ref();

		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)
				.with_context(|| format!("Failed to create config directory {}", parent.display()))?;
		}

		let string = toml::to_string_pretty(&self.data)?;
		std::fs::write(path, string)
			.with_context(|| format!("Failed to write config file {}", path.display()))
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	pub fn as_toml(&self) -> &toml::Table {
		&self.data
	}

	/// Copy or replace values present in `other`
	pub fn merge_from(&mut self, other: &Table) {
		merge_into(&mut self.data, &other.data);
	}

	/// Recursively remove values from this table that are present in `other`
	pub fn remove_values_in(&mut self, other: &Table) {
		remove_from(&mut self.data, &other.data);
	}

	pub fn get_value(&self, key: &str) -> Option<&Value> {
		get_in(&self.data, key)
	}

	/// Deserialize the value at `key`. `Ok(None)` if there is no such value.
	pub fn get<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
		let Some(value) = self.get_value(key) else {
			return Ok(None)
		};

		let value = value.clone().try_into()
			.with_context(|| format!("Invalid value for config key '{key}'"))?;

		Ok(Some(value))
	}

	/// Set the value at `key`, creating intermediate tables as needed.
	pub fn set_value(&mut self, key: &str, value: impl Into<Value>) {
		set_in(&mut self.data, key, value.into());
	}
}

impl FromStr for Table {
	type Err = toml::de::Error;

	fn from_str(s: &str) -> Result<Table, Self::Err> {
		toml::from_str(s).map(Table::from_toml)
	}
}


fn parse_argument_value(raw: &str) -> Value {
	let parsed = toml::from_str::<toml::Table>(&format!("value = {raw}"))
		.ok()
		.and_then(|mut table| table.remove("value"));

	parsed.unwrap_or_else(|| Value::String(raw.to_owned()))
}

fn get_in<'t>(table: &'t toml::Table, key: &str) -> Option<&'t Value> {
	match key.split_once('.') {
		Some((head, tail)) => get_in(table.get(head)?.as_table()?, tail),
		None => table.get(key),
	}
}

fn set_in(table: &mut toml::Table, key: &str, value: Value) {
	let Some((head, tail)) = key.split_once('.') else {
		table.insert(key.to_owned(), value);
		return
	};

	let entry = table.entry(head)
		.or_insert_with(|| Value::Table(toml::Table::new()));

	if !entry.is_table() {
		log::warn!("Replacing non-table config value '{head}' with a table to set '{tail}'");
		*entry = Value::Table(toml::Table::new());
	}

	if let Value::Table(subtable) = entry {
		set_in(subtable, tail, value);
	}
}

fn merge_into(target: &mut toml::Table, source: &toml::Table) {
	for (key, value) in source {
		match (target.get_mut(key), value) {
			(Some(Value::Table(target)), Value::Table(source)) => merge_into(target, source),
			_ => { target.insert(key.clone(), value.clone()); }
		}
	}
}

fn remove_from(target: &mut toml::Table, other: &toml::Table) {
	for (key, value) in other {
		let remove_key = match (target.get_mut(key), value) {
			(Some(Value::Table(target)), Value::Table(other)) => {
				remove_from(target, other);
				target.is_empty()
			}

			(Some(_), _) => true,
			(None, _) => false,
		};

		if remove_key {
			target.remove(key);
		}
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn dotted_keys() {
		let mut table = Table::new();
		table.set_value("router.log_events", true);
		table.set_value("engine.tick_rate", 90.0);
		table.set_value("name", "demo");

		assert_eq!(table.get_value("router.log_events"), Some(&Value::Boolean(true)));
		assert_eq!(table.get::<f64>("engine.tick_rate").unwrap(), Some(90.0));
		assert_eq!(table.get::<String>("name").unwrap().as_deref(), Some("demo"));
		assert_eq!(table.get_value("router.missing"), None);
		assert_eq!(table.get_value("name.nested"), None);

		assert!(table.get::<bool>("engine.tick_rate").is_err());

		// Setting beneath a plain value replaces it
		table.set_value("name.first", "a");
		assert_eq!(table.get::<String>("name.first").unwrap().as_deref(), Some("a"));
	}

	#[test]
	fn arguments() {
		let args = ["game", "--engine.tick_rate=120", "--router.log_events", "--log.level=debug", "--window.title=\"My App\"", "--=oops"];
		let table = Table::from_args(args.map(String::from));

		assert_eq!(table.get_value("engine.tick_rate"), Some(&Value::Integer(120)));
		assert_eq!(table.get_value("router.log_events"), Some(&Value::Boolean(true)));
		assert_eq!(table.get::<String>("log.level").unwrap().as_deref(), Some("debug"));
		assert_eq!(table.get::<String>("window.title").unwrap().as_deref(), Some("My App"));
		assert_eq!(table.as_toml().len(), 4);
	}

	#[test]
	fn merge_and_remove() {
		let mut base: Table = "a = 1\n[b]\nc = 2\nd = 3".parse().unwrap();
		let overrides: Table = "a = 10\n[b]\nc = 20\n[e]\nf = true".parse().unwrap();

		base.merge_from(&overrides);
		assert_eq!(base.get::<i64>("a").unwrap(), Some(10));
		assert_eq!(base.get::<i64>("b.c").unwrap(), Some(20));
		assert_eq!(base.get::<i64>("b.d").unwrap(), Some(3));
		assert_eq!(base.get::<bool>("e.f").unwrap(), Some(true));

		base.remove_values_in(&overrides);
		assert_eq!(base.get_value("a"), None);
		assert_eq!(base.get_value("b.c"), None);
		assert_eq!(base.get::<i64>("b.d").unwrap(), Some(3));
		assert_eq!(base.get_value("e"), None);
	}

	#[test]
	fn save_and_load() {
		let path = std::env::temp_dir()
			.join(format!("rigkit-cfg-test-{}", std::process::id()))
			.join("config.toml");

		let mut table = Table::new();
		table.set_value("engine.tick_rate", 72.0);
		table.save_to_file(&path).unwrap();

		let loaded = Table::from_file(&path).unwrap();
		assert_eq!(loaded, table);

		let _ = std::fs::remove_dir_all(path.parent().unwrap());
	}
}
