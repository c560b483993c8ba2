//! Device-agnostic building blocks that sit between raw device events and interaction techniques.
//! Converters listen just ahead of ordinary consumers and insert what they derive into the running pass,
//! so the derived events are seen within the same tick as their cause.

use std::cell::RefCell;
use std::rc::Rc;

use rigkit_bus::{FilterId, ListenerId, ProducerId, Router};

pub mod buttons_to_float;
pub mod callable;
pub mod float_to_buttons;
pub mod modified;
pub mod tracker;

pub use buttons_to_float::*;
pub use callable::*;
pub use float_to_buttons::*;
pub use modified::*;
pub use tracker::*;

pub mod prelude {
	pub use crate::{FloatToButtons, ButtonsToFloat, ModifiedEvents, CallableProducer, ButtonTracker};
}


/// A building block registered with a [`Router`], along with everything needed to unregister it again.
pub struct Installed<T> {
	pub inner: Rc<RefCell<T>>,

	listener: Option<ListenerId>,
	filter: Option<FilterId>,
	producer: Option<ProducerId>,
}

impl<T> Installed<T> {
	pub fn uninstall(self, router: &Router) {
		if let Some(id) = self.listener {
			router.remove_listener(id);
		}

		if let Some(id) = self.filter {
			router.remove_filter(id);
		}

		if let Some(id) = self.producer {
			router.remove_producer(id);
		}
	}
}
