use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use rigkit_bus::{Listener, Router, DEFAULT_LISTENER_PRIORITY};
use rigkit_event::{Event, EventPrototype};

use crate::Installed;


/// A button known to a [`ButtonTracker`], identified by the events that press and release it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonDecl {
	pub name: String,
	pub down: EventPrototype,
	pub up: EventPrototype,
}

impl ButtonDecl {
	pub fn new(name: impl Into<String>, down: EventPrototype, up: EventPrototype) -> ButtonDecl {
		ButtonDecl { name: name.into(), down, up }
	}

	/// Button following the `<prefix>/Down`, `<prefix>/Up` naming convention.
	pub fn from_prefix(prefix: &str) -> ButtonDecl {
		ButtonDecl::new(prefix, EventPrototype::any(format!("{prefix}/Down")), EventPrototype::any(format!("{prefix}/Up")))
	}
}


/// Tracks which declared buttons are held, plus which were pressed or released since the last [`ButtonTracker::reset`].
#[derive(Default)]
pub struct ButtonTracker {
	buttons: Vec<ButtonDecl>,

	pub active_buttons: Vec<String>,
	pub down_buttons: Vec<String>,
	pub up_buttons: Vec<String>,
}

impl ButtonTracker {
	pub fn new(buttons: impl IntoIterator<Item = ButtonDecl>) -> ButtonTracker {
		ButtonTracker {
			buttons: buttons.into_iter().collect(),
			..ButtonTracker::default()
		}
	}

	pub fn add_button(&mut self, button: ButtonDecl) {
		self.buttons.push(button);
	}

	pub fn install(self, router: &Router) -> Installed<ButtonTracker> {
		let inner = Rc::new(RefCell::new(self));

		Installed {
			listener: Some(router.add_listener(&inner, DEFAULT_LISTENER_PRIORITY)),
			filter: None,
			producer: None,
			inner,
		}
	}

	/// Clear the per-tick pressed and released sets. Call once per tick, before the router pass.
	pub fn reset(&mut self) {
		self.down_buttons.clear();
		self.up_buttons.clear();
	}

	pub fn track_button(&mut self, button: &str, down: bool) {
		if down {
			if !self.is_held(button) {
				self.down_buttons.push(button.to_owned());
				self.active_buttons.push(button.to_owned());
			}
		} else {
			self.up_buttons.push(button.to_owned());
			self.active_buttons.retain(|active_button| active_button != button);
		}
	}

	/// Forget every held button, e.g. when the device providing them disconnects.
	pub fn release_all(&mut self) {
		self.active_buttons.clear();
	}

	pub fn is_held(&self, button: &str) -> bool {
		self.active_buttons.iter().any(|active| active == button)
	}

	pub fn was_pressed(&self, button: &str) -> bool {
		self.down_buttons.iter().any(|down| down == button)
	}

	pub fn was_released(&self, button: &str) -> bool {
		self.up_buttons.iter().any(|up| up == button)
	}
}

impl Listener for ButtonTracker {
	fn on_event(&mut self, event: &Event, _: &Router) -> anyhow::Result<()> {
		let mut changes = Vec::new();

		for button in self.buttons.iter() {
			if button.down.matches(event) {
				changes.push((button.name.clone(), true));
			} else if button.up.matches(event) {
				changes.push((button.name.clone(), false));
			}
		}

		for (button, down) in changes {
			self.track_button(&button, down);
		}

		Ok(())
	}
}
