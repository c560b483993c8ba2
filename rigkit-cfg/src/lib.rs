pub mod table;
pub use table::{Table, Value};

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;
use tracing::instrument;

pub mod prelude {
	pub use crate::Config;
}


/// Runtime representation of hierarchical key-value storage, intended for settings, command line config, etc.
///
/// Lookups resolve the preview layer first, then command line arguments, then the base layer.
#[derive(Debug, Clone, Default)]
pub struct Config {
	/// Config loaded and saved to disk.
	base: Table,

	/// Any config overrided by CLI args.
	arguments: Table,

	/// Config set during runtime that can be either committed to base or reverted.
	preview: Table,

	save_path: Option<PathBuf>,
}

impl Config {
	/// Load the base layer from `<preference dir>/rigkit/<app_name>/config.toml`, creating it if it doesn't exist,
	/// and the argument layer from the command line.
	#[instrument(name="Config::for_app_name")]
	pub fn for_app_name(app_name: &str) -> anyhow::Result<Self> {
		let save_path = config_path(app_name)?;
		let mut config = Config::from_path(&save_path)?;
		config.arguments = Table::from_cli();

		log::info!("Loaded config: {config:?}");

		Ok(config)
	}

	/// Load the base layer from `path`, or start empty and create the file if it doesn't exist.
	pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
		let path = path.as_ref();

		let base = if path.exists() {
			Table::from_file(path)?
		} else {
			let base = Table::new();
			base.save_to_file(path)?;
			base
		};

		Ok(Config {
			base,
			save_path: Some(path.to_owned()),
			..Config::default()
		})
	}

	/// Config that isn't backed by a file.
	pub fn from_tables(base: Table, arguments: Table) -> Self {
		Config {
			base,
			arguments,
			..Config::default()
		}
	}

	pub fn from_toml_str(base: &str) -> anyhow::Result<Self> {
		let base: Table = base.parse()
			.context("Failed to parse config")?;

		Ok(Config::from_tables(base, Table::new()))
	}

	pub fn save_path(&self) -> Option<&Path> {
		self.save_path.as_deref()
	}

	pub fn save(&self) -> anyhow::Result<()> {
		match &self.save_path {
			Some(path) => self.base.save_to_file(path),
			None => {
				log::warn!("Trying to save config that isn't backed by a file");
				Ok(())
			}
		}
	}

	/// Move the preview layer into the base layer. Committed values also take precedence over
	/// command line arguments from then on.
	pub fn commit(&mut self) {
		self.base.merge_from(&self.preview);
		self.arguments.remove_values_in(&self.preview);
		self.preview = Table::new();
	}

	pub fn revert(&mut self) {
		self.preview = Table::new();
	}

	pub fn set_preview(&mut self, key: &str, value: impl Into<Value>) {
		self.preview.set_value(key, value);
	}

	pub fn base(&self) -> &Table {
		&self.base
	}

	pub fn arguments(&self) -> &Table {
		&self.arguments
	}

	pub fn preview(&self) -> &Table {
		&self.preview
	}
}

impl Config {
	pub fn get_value(&self, key: &str) -> Option<&Value> {
		if let Some(value) = self.preview.get_value(key) {
			return Some(value)
		}

		if let Some(value) = self.arguments.get_value(key) {
			return Some(value)
		}

		self.base.get_value(key)
	}

	/// Deserialize the resolved value at `key`. `Ok(None)` if no layer has it.
	pub fn get<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
		let Some(value) = self.get_value(key) else {
			return Ok(None)
		};

		let value = value.clone().try_into()
			.with_context(|| format!("Invalid value for config key '{key}'"))?;

		Ok(Some(value))
	}

	/// Like [`Config::get`], but falls back to `default` if the value is missing or invalid.
	pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
		match self.get(key) {
			Ok(Some(value)) => value,
			Ok(None) => default,
			Err(err) => {
				log::warn!("{err:#}, using default");
				default
			}
		}
	}
}


pub fn config_path(app_name: &str) -> anyhow::Result<PathBuf> {
	let mut dir = dirs::preference_dir()
		.context("Couldn't get preferences dir")?;

	dir.push("rigkit");
	dir.push(app_name);
	dir.push("config.toml");

	Ok(dir)
}
