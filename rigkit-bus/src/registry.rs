use rigkit_event::EventPrototype;

use crate::traits::SharedListener;


macro_rules! registration_id {
	($($(#[$meta:meta])* $name:ident),* $(,)?) => {
		$(
			$(#[$meta])*
			#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
			pub struct $name(pub(crate) usize);
		)*
	};
}

registration_id! {
	/// Handle for a registered [`Listener`](crate::Listener).
	ListenerId,
	/// Handle for a registered [`Filter`](crate::Filter).
	FilterId,
	/// Handle for a registered [`Producer`](crate::Producer).
	ProducerId,
	/// Handle for a registered [`PolledDevice`](crate::PolledDevice).
	DeviceId,
}


#[derive(Clone)]
pub(crate) struct ListenerSlot {
	pub listener: SharedListener,
	pub prototype: Option<EventPrototype>,
}


struct Registered<H> {
	id: usize,
	priority: i32,

	/// Address of the registered object, for rejecting duplicate registrations.
	addr: *const (),

	handle: H,
}


/// Registration list kept sorted by priority, with ties resolved by registration order.
pub(crate) struct Registry<H> {
	entries: Vec<Registered<H>>,
}

impl<H: Clone> Registry<H> {
	pub fn new() -> Registry<H> {
		Registry { entries: Vec::new() }
	}

	pub fn insert(&mut self, id: usize, priority: i32, addr: *const (), handle: H) {
		// Insert after every entry of equal priority so registration order is preserved within a priority.
		let position = self.entries.partition_point(|entry| entry.priority <= priority);
		self.entries.insert(position, Registered { id, priority, addr, handle });
	}

	pub fn find_by_addr(&self, addr: *const ()) -> Option<usize> {
		self.entries.iter()
			.find(|entry| std::ptr::eq(entry.addr, addr))
			.map(|entry| entry.id)
	}

	pub fn remove(&mut self, id: usize) -> bool {
		let Some(position) = self.entries.iter().position(|entry| entry.id == id) else {
			return false
		};

		self.entries.remove(position);
		true
	}

	pub fn contains(&self, id: usize) -> bool {
		self.entries.iter().any(|entry| entry.id == id)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Clone out the current registrations in dispatch order. Dispatch runs against this copy so
	/// that callbacks are free to register and unregister while it is underway.
	pub fn snapshot(&self) -> Vec<H> {
		self.entries.iter()
			.map(|entry| entry.handle.clone())
			.collect()
	}

	pub fn handles(&self) -> impl Iterator<Item = &H> {
		self.entries.iter().map(|entry| &entry.handle)
	}
}


#[cfg(test)]
mod test {
	use super::*;

	fn ids(registry: &Registry<usize>) -> Vec<usize> {
		registry.snapshot()
	}

	#[test]
	fn sorted_by_priority_then_registration() {
		let mut registry = Registry::new();
		registry.insert(1, 10, std::ptr::null(), 1);
		registry.insert(2, 5, std::ptr::null(), 2);
		registry.insert(3, 10, std::ptr::null(), 3);
		registry.insert(4, -1, std::ptr::null(), 4);
		registry.insert(5, 5, std::ptr::null(), 5);

		assert_eq!(ids(&registry), vec![4, 2, 5, 1, 3]);

		assert!(registry.remove(2));
		assert!(!registry.remove(2));
		assert_eq!(ids(&registry), vec![4, 5, 1, 3]);
		assert_eq!(registry.len(), 4);
	}
}
