use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use rigkit_bus::{Listener, Producer, Router, CONVERTER_LISTENER_PRIORITY};
use rigkit_event::{Event, EventPrototype};

use crate::Installed;


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloatToButtonsSettings {
	/// Float event to listen for, e.g. an analog trigger.
	pub float_event: String,

	pub button_down_event: String,
	pub button_up_event: String,

	/// Crossing this upwards generates a button down, crossing back down generates a button up.
	/// Should be as close to `min_value` as sensor noise allows.
	pub threshold: f32,

	/// Range mapped to `[0, 1]` for the normalized event.
	pub min_value: f32,
	pub max_value: f32,

	/// If set, every float event is followed by one with this name carrying the normalized value.
	pub normalized_event: Option<String>,
}

impl Default for FloatToButtonsSettings {
	fn default() -> FloatToButtonsSettings {
		FloatToButtonsSettings {
			float_event: "Tool/Trigger/Value".into(),
			button_down_event: "Tool/Trigger/Down".into(),
			button_up_event: "Tool/Trigger/Up".into(),
			threshold: 0.1,
			min_value: 0.0,
			max_value: 1.0,
			normalized_event: Some("Tool/Trigger/NormalizedValue".into()),
		}
	}
}


/// Turns an analog float event into button down/up events.
pub struct FloatToButtons {
	settings: FloatToButtonsSettings,

	/// `None` until the first sample arrives, which only initialises state.
	last_value: Option<f32>,
}

impl FloatToButtons {
	pub fn new(settings: FloatToButtonsSettings) -> FloatToButtons {
		if settings.max_value == settings.min_value && settings.normalized_event.is_some() {
			log::warn!("FloatToButtons for '{}' has an empty value range, normalized values will be meaningless", settings.float_event);
		}

		FloatToButtons {
			settings,
			last_value: None,
		}
	}

	pub fn settings(&self) -> &FloatToButtonsSettings {
		&self.settings
	}

	pub fn install(self, router: &Router) -> Installed<FloatToButtons> {
		let prototype = EventPrototype::typed::<f32>(self.settings.float_event.clone());
		let inner = Rc::new(RefCell::new(self));

		Installed {
			listener: Some(router.add_listener_matching(&inner, CONVERTER_LISTENER_PRIORITY, prototype)),
			filter: None,
			producer: Some(router.add_producer(&inner)),
			inner,
		}
	}

	fn normalize(&self, value: f32) -> f32 {
		let FloatToButtonsSettings { min_value, max_value, .. } = self.settings;
		((value - min_value) / (max_value - min_value)).clamp(0.0, 1.0)
	}
}

impl Listener for FloatToButtons {
	fn on_event(&mut self, event: &Event, router: &Router) -> anyhow::Result<()> {
		if event.name() != self.settings.float_event {
			return Ok(())
		}

		let value = event.data::<f32>()?;
		let threshold = self.settings.threshold;

		// Reaching the threshold counts as pressed
		if let Some(last_value) = self.last_value.replace(value) {
			let was_pressed = last_value >= threshold;
			let is_pressed = value >= threshold;

			if !was_pressed && is_pressed {
				router.insert_in_queue(Event::new(self.settings.button_down_event.as_str())?);
			} else if was_pressed && !is_pressed {
				router.insert_in_queue(Event::new(self.settings.button_up_event.as_str())?);
			}
		}

		if let Some(name) = &self.settings.normalized_event {
			router.insert_in_queue(Event::with_data(name.as_str(), self.normalize(value))?);
		}

		Ok(())
	}

	fn name(&self) -> &str {
		&self.settings.float_event
	}
}

impl Producer for FloatToButtons {
	fn event_prototypes(&self) -> Vec<EventPrototype> {
		let mut prototypes = vec![
			EventPrototype::no_data(self.settings.button_down_event.as_str()),
			EventPrototype::no_data(self.settings.button_up_event.as_str()),
		];

		if let Some(name) = &self.settings.normalized_event {
			prototypes.push(EventPrototype::typed::<f32>(name.as_str()));
		}

		prototypes
	}
}
