use std::cell::RefCell;
use std::rc::Rc;

use smallvec::SmallVec;
use rigkit_event::{Event, EventPrototype};

use crate::Router;


pub type SharedListener = Rc<RefCell<dyn Listener>>;
pub type SharedFilter = Rc<RefCell<dyn Filter>>;
pub type SharedProducer = Rc<RefCell<dyn Producer>>;
pub type SharedPolledDevice = Rc<RefCell<dyn PolledDevice>>;


/// Reacts to dispatched events.
///
/// Listeners get the router back so they can queue or insert derived events, or change registrations.
/// Returning an error doesn't affect delivery to any other listener - it is logged and the pass continues.
pub trait Listener {
	fn on_event(&mut self, event: &Event, router: &Router) -> anyhow::Result<()>;

	/// Used in diagnostics only.
	fn name(&self) -> &str {
		std::any::type_name::<Self>()
	}
}


/// Result of running a [`Filter`] on a single event.
#[derive(Debug, Clone, PartialEq)]
pub enum Filtered {
	/// The filter isn't interested - the event continues unchanged.
	Pass,

	/// The filter caught the event and decides what continues in its place.
	/// An empty set suppresses the event entirely.
	Replace(SmallVec<[Event; 2]>),
}

impl Filtered {
	pub fn suppress() -> Filtered {
		Filtered::Replace(SmallVec::new())
	}

	pub fn single(event: Event) -> Filtered {
		Filtered::Replace(smallvec::smallvec![event])
	}

	pub fn replace(events: impl IntoIterator<Item = Event>) -> Filtered {
		Filtered::Replace(events.into_iter().collect())
	}
}


/// Transforms, suppresses or expands events before any listener sees them.
/// Filters run in ascending priority order, each one seeing the output of the previous.
pub trait Filter {
	fn filter(&mut self, event: &Event, router: &Router) -> anyhow::Result<Filtered>;

	fn name(&self) -> &str {
		std::any::type_name::<Self>()
	}
}


/// Anything that originates events. Producers only need to declare what they might emit so that tooling
/// can list "what might arrive" without a live event. Push-mode producers call [`Router::queue_event`]
/// whenever their device signals.
pub trait Producer {
	fn event_prototypes(&self) -> Vec<EventPrototype>;

	fn name(&self) -> &str {
		std::any::type_name::<Self>()
	}
}


/// Pull-mode producer, polled once at the start of every pass.
pub trait PolledDevice {
	fn poll_for_events(&mut self, events: &mut Vec<Event>) -> anyhow::Result<()>;

	fn name(&self) -> &str {
		std::any::type_name::<Self>()
	}
}



/// Adapts a closure into a [`Listener`].
pub struct FnListener<F> {
	name: String,
	callback: F,
}

impl<F> FnListener<F>
	where F: FnMut(&Event, &Router) -> anyhow::Result<()>
{
	pub fn new(name: impl Into<String>, callback: F) -> FnListener<F> {
		FnListener { name: name.into(), callback }
	}
}

impl<F> Listener for FnListener<F>
	where F: FnMut(&Event, &Router) -> anyhow::Result<()>
{
	fn on_event(&mut self, event: &Event, router: &Router) -> anyhow::Result<()> {
		(self.callback)(event, router)
	}

	fn name(&self) -> &str {
		&self.name
	}
}


/// Adapts a closure into a [`Filter`].
pub struct FnFilter<F> {
	name: String,
	callback: F,
}

impl<F> FnFilter<F>
	where F: FnMut(&Event, &Router) -> anyhow::Result<Filtered>
{
	pub fn new(name: impl Into<String>, callback: F) -> FnFilter<F> {
		FnFilter { name: name.into(), callback }
	}
}

impl<F> Filter for FnFilter<F>
	where F: FnMut(&Event, &Router) -> anyhow::Result<Filtered>
{
	fn filter(&mut self, event: &Event, router: &Router) -> anyhow::Result<Filtered> {
		(self.callback)(event, router)
	}

	fn name(&self) -> &str {
		&self.name
	}
}
