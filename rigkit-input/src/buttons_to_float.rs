use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use rigkit_bus::{Listener, Producer, Router, CONVERTER_LISTENER_PRIORITY};
use rigkit_event::{Event, EventPrototype};

use crate::Installed;


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonsToFloatSettings {
	pub button_down: EventPrototype,
	pub button_up: EventPrototype,

	/// Name of the generated float event.
	pub float_event: String,

	#[serde(default = "default_down_value")]
	pub down_value: f32,

	#[serde(default)]
	pub up_value: f32,
}

fn default_down_value() -> f32 { 1.0 }

impl ButtonsToFloatSettings {
	pub fn new(button_down: EventPrototype, button_up: EventPrototype, float_event: impl Into<String>) -> ButtonsToFloatSettings {
		ButtonsToFloatSettings {
			button_down,
			button_up,
			float_event: float_event.into(),
			down_value: default_down_value(),
			up_value: 0.0,
		}
	}
}


/// Turns a pair of button events into a float event, e.g. to drive an analog technique from a keyboard.
pub struct ButtonsToFloat {
	settings: ButtonsToFloatSettings,
}

impl ButtonsToFloat {
	pub fn new(settings: ButtonsToFloatSettings) -> ButtonsToFloat {
		ButtonsToFloat { settings }
	}

	pub fn install(self, router: &Router) -> Installed<ButtonsToFloat> {
		let inner = Rc::new(RefCell::new(self));

		Installed {
			listener: Some(router.add_listener(&inner, CONVERTER_LISTENER_PRIORITY)),
			filter: None,
			producer: Some(router.add_producer(&inner)),
			inner,
		}
	}
}

impl Listener for ButtonsToFloat {
	fn on_event(&mut self, event: &Event, router: &Router) -> anyhow::Result<()> {
		let settings = &self.settings;

		let value = if settings.button_down.matches(event) {
			settings.down_value
		} else if settings.button_up.matches(event) {
			settings.up_value
		} else {
			return Ok(())
		};

		router.insert_in_queue(Event::with_data(settings.float_event.as_str(), value)?);
		Ok(())
	}

	fn name(&self) -> &str {
		&self.settings.float_event
	}
}

impl Producer for ButtonsToFloat {
	fn event_prototypes(&self) -> Vec<EventPrototype> {
		vec![EventPrototype::typed::<f32>(self.settings.float_event.as_str())]
	}
}
