use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use rigkit_bus::{AliasStrategy, Filter, Filtered, Producer, Router, ALIAS_FILTER_PRIORITY};
use rigkit_event::{Event, EventPrototype};

use crate::Installed;


/// Modifiers run just ahead of aliases, so that aliases can rename modified events too.
pub const MODIFIER_FILTER_PRIORITY: i32 = ALIAS_FILTER_PRIORITY - 1;


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifiedEventsSettings {
	pub base_event: EventPrototype,

	pub modifier_on: EventPrototype,
	pub modifier_off: EventPrototype,

	/// Appended to the name of the base event while the modifier is on.
	#[serde(default = "default_suffix")]
	pub suffix: String,

	#[serde(default)]
	pub strategy: AliasStrategy,
}

fn default_suffix() -> String {
	"/Modified".into()
}

impl ModifiedEventsSettings {
	pub fn new(base_event: EventPrototype, modifier_on: EventPrototype, modifier_off: EventPrototype) -> ModifiedEventsSettings {
		ModifiedEventsSettings {
			base_event,
			modifier_on,
			modifier_off,
			suffix: default_suffix(),
			strategy: AliasStrategy::default(),
		}
	}

	pub fn modified_name(&self) -> String {
		format!("{}{}", self.base_event.name(), self.suffix)
	}
}


/// Filter that renames a base event while a modifier is held, e.g. `Mouse/Left/Down` becomes
/// `Mouse/Left/Down/Modified` while shift is down.
pub struct ModifiedEvents {
	settings: ModifiedEventsSettings,
	modified_name: String,
	modifier_active: bool,
}

impl ModifiedEvents {
	pub fn new(settings: ModifiedEventsSettings) -> ModifiedEvents {
		ModifiedEvents {
			modified_name: settings.modified_name(),
			settings,
			modifier_active: false,
		}
	}

	pub fn is_modifier_active(&self) -> bool {
		self.modifier_active
	}

	pub fn install(self, router: &Router) -> Installed<ModifiedEvents> {
		let inner = Rc::new(RefCell::new(self));

		Installed {
			listener: None,
			filter: Some(router.add_filter(&inner, MODIFIER_FILTER_PRIORITY)),
			producer: Some(router.add_producer(&inner)),
			inner,
		}
	}
}

impl Filter for ModifiedEvents {
	fn filter(&mut self, event: &Event, _: &Router) -> anyhow::Result<Filtered> {
		if self.settings.modifier_on.matches(event) {
			self.modifier_active = true;
		} else if self.settings.modifier_off.matches(event) {
			self.modifier_active = false;
		}

		if !self.modifier_active || !self.settings.base_event.matches(event) {
			return Ok(Filtered::Pass)
		}

		Ok(self.settings.strategy.apply(event, &self.modified_name)?)
	}

	fn name(&self) -> &str {
		&self.modified_name
	}
}

impl Producer for ModifiedEvents {
	fn event_prototypes(&self) -> Vec<EventPrototype> {
		vec![self.settings.base_event.with_name(self.modified_name.as_str())]
	}
}
