use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use rigkit_event::{Event, EventError, EventPrototype};

use crate::{BusError, Filter, Filtered, FilterId, Producer, ProducerId, Router, ALIAS_FILTER_PRIORITY};


#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasStrategy {
	/// The matching event is renamed, downstream listeners never see the original name.
	#[default]
	RenameOriginal,

	/// The original passes through untouched, followed by a renamed copy.
	RenameClone,
}

impl AliasStrategy {
	/// Apply this strategy to `event`, producing what should continue in its place.
	pub fn apply(&self, event: &Event, new_name: &str) -> Result<Filtered, EventError> {
		let renamed = event.renamed(new_name)?;

		Ok(match self {
			AliasStrategy::RenameOriginal => Filtered::single(renamed),
			AliasStrategy::RenameClone => Filtered::replace([event.clone(), renamed]),
		})
	}
}


/// Declares that one or more source events should also be known under another name.
/// Typically loaded from config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AliasDecl {
	pub alias_name: String,

	#[serde(default)]
	pub strategy: AliasStrategy,

	pub source_prototypes: Vec<EventPrototype>,
}

impl AliasDecl {
	pub fn new(alias_name: impl Into<String>, strategy: AliasStrategy, source_prototypes: impl IntoIterator<Item = EventPrototype>) -> AliasDecl {
		AliasDecl {
			alias_name: alias_name.into(),
			strategy,
			source_prototypes: source_prototypes.into_iter().collect(),
		}
	}
}


/// Filter implementing an [`AliasDecl`]. Also a [`Producer`] since it may emit the alias.
#[derive(Debug)]
pub struct EventAlias {
	decl: AliasDecl,
}

impl EventAlias {
	/// All sources must share a payload type since listeners of the alias can only expect one.
	/// Sources disagreeing with the first one are dropped.
	pub fn new(mut decl: AliasDecl) -> Result<EventAlias, BusError> {
		if decl.alias_name.is_empty() {
			return Err(EventError::EmptyName.into())
		}

		let Some(first) = decl.source_prototypes.first() else {
			return Err(BusError::EmptyAlias(decl.alias_name))
		};

		let data_type = first.data_type();
		let alias_name = decl.alias_name.clone();

		decl.source_prototypes.retain(|source| {
			let keep = source.data_type() == data_type;
			if !keep {
				log::error!("All events mapped to the alias '{alias_name}' must have the same data type. Dropping {source}, expected {data_type}");
			}
			keep
		});

		Ok(EventAlias { decl })
	}

	pub fn decl(&self) -> &AliasDecl {
		&self.decl
	}

	/// Create the alias and register it with `router` as a filter and producer.
	pub fn install(decl: AliasDecl, router: &Router) -> Result<AliasHandle, BusError> {
		let alias = Rc::new(RefCell::new(EventAlias::new(decl)?));
		let filter_id = router.add_filter(&alias, ALIAS_FILTER_PRIORITY);
		let producer_id = router.add_producer(&alias);

		log::debug!("Installed alias '{}'", alias.borrow().decl.alias_name);

		Ok(AliasHandle { alias, filter_id, producer_id })
	}
}

impl Filter for EventAlias {
	fn filter(&mut self, event: &Event, _: &Router) -> anyhow::Result<Filtered> {
		let is_source = self.decl.source_prototypes.iter()
			.any(|source| source.matches(event));

		if !is_source {
			return Ok(Filtered::Pass)
		}

		Ok(self.decl.strategy.apply(event, &self.decl.alias_name)?)
	}

	fn name(&self) -> &str {
		&self.decl.alias_name
	}
}

impl Producer for EventAlias {
	fn event_prototypes(&self) -> Vec<EventPrototype> {
		self.decl.source_prototypes.first()
			.map(|source| source.with_name(self.decl.alias_name.clone()))
			.into_iter()
			.collect()
	}

	fn name(&self) -> &str {
		&self.decl.alias_name
	}
}


/// Registration of an installed [`EventAlias`].
pub struct AliasHandle {
	pub alias: Rc<RefCell<EventAlias>>,
	pub filter_id: FilterId,
	pub producer_id: ProducerId,
}

impl AliasHandle {
	pub fn uninstall(self, router: &Router) {
		router.remove_filter(self.filter_id);
		router.remove_producer(self.producer_id);
	}
}
