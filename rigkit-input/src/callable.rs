use std::cell::RefCell;
use std::rc::Rc;

use rigkit_bus::{Producer, Router};
use rigkit_event::{Event, EventPrototype};

use crate::Installed;


/// Produces payload-less events on demand, e.g. from a UI button. Only declared names can be produced.
pub struct CallableProducer {
	event_names: Vec<String>,
}

impl CallableProducer {
	pub fn new<S: Into<String>>(event_names: impl IntoIterator<Item = S>) -> CallableProducer {
		CallableProducer {
			event_names: event_names.into_iter().map(Into::into).collect(),
		}
	}

	pub fn install(self, router: &Router) -> Installed<CallableProducer> {
		let inner = Rc::new(RefCell::new(self));

		Installed {
			listener: None,
			filter: None,
			producer: Some(router.add_producer(&inner)),
			inner,
		}
	}

	/// Queue `name` for the next pass. Returns false, with a warning, if `name` wasn't declared.
	pub fn produce(&self, name: &str, router: &Router) -> bool {
		if !self.event_names.iter().any(|declared| declared == name) {
			log::warn!("CallableProducer: tried to produce '{name}' which is not one of [{}]", self.event_names.join(", "));
			return false
		}

		match Event::new(name) {
			Ok(event) => {
				router.queue_event(event);
				true
			}

			Err(err) => {
				log::warn!("CallableProducer: {err}");
				false
			}
		}
	}
}

impl Producer for CallableProducer {
	fn event_prototypes(&self) -> Vec<EventPrototype> {
		self.event_names.iter()
			.map(|name| EventPrototype::no_data(name.as_str()))
			.collect()
	}
}
