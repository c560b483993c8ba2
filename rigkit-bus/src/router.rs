use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use tracing::instrument;

use rigkit_event::{Event, EventPrototype, MatchError, TypeMatch};

use crate::BusError;
use crate::registry::*;
use crate::traits::*;


/// Priority used by ordinary consumers such as interaction techniques.
pub const DEFAULT_LISTENER_PRIORITY: i32 = 10;

/// Converters that synthesize derived events register just ahead of ordinary consumers,
/// so that what they insert is handled within the same pass.
pub const CONVERTER_LISTENER_PRIORITY: i32 = DEFAULT_LISTENER_PRIORITY - 1;

pub const ALIAS_FILTER_PRIORITY: i32 = 0;


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
	/// Log every event as it is dispatched.
	pub log_events: bool,

	/// Upper bound on events inserted with [`Router::insert_in_queue`] during a single pass.
	/// Guards against listeners that end up re-triggering themselves forever.
	pub max_derived_events_per_pass: usize,
}

impl Default for RouterSettings {
	fn default() -> RouterSettings {
		RouterSettings {
			log_events: false,
			max_derived_events_per_pass: 10_000,
		}
	}
}


/// Summary of a single call to [`Router::process_queue`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
	/// Events taken from the pending queue, including those from polled devices.
	pub events: usize,

	/// Events inserted during the pass and handled within it.
	pub derived: usize,

	/// Derived events dropped because the pass exceeded its derived event budget.
	pub dropped: usize,

	/// Individual listener callbacks run.
	pub delivered: usize,

	/// Events that were filtered out completely.
	pub suppressed: usize,

	/// Callbacks that returned an error, panicked or couldn't be run.
	pub failures: usize,
}


/// Owns the event queue and the listener, filter and producer registries, and runs the per-tick
/// dispatch pass.
///
/// A `Router` is constructed explicitly and handed to whatever needs it, usually as an `Rc<Router>`.
/// Every method takes `&self` so that callbacks invoked during a pass can queue events and change
/// registrations. It is single threaded by construction - events from other threads should be
/// marshalled through a channel and queued from the thread that owns the router.
pub struct Router {
	listeners: RefCell<Registry<ListenerSlot>>,
	filters: RefCell<Registry<SharedFilter>>,
	producers: RefCell<Registry<SharedProducer>>,
	polled_devices: RefCell<Registry<SharedPolledDevice>>,

	/// Events to be handled in the next pass.
	pending: RefCell<VecDeque<Event>>,

	/// Events inserted during the current pass, handled before moving to the next pending event.
	derived: RefCell<VecDeque<Event>>,

	in_pass: Cell<bool>,
	pass_count: Cell<u64>,
	id_counter: Cell<usize>,

	log_events: Cell<bool>,
	max_derived_events_per_pass: usize,
}

impl Default for Router {
	fn default() -> Router {
		Router::new(RouterSettings::default())
	}
}

impl Router {
	pub fn new(settings: RouterSettings) -> Router {
		Router {
			listeners: RefCell::new(Registry::new()),
			filters: RefCell::new(Registry::new()),
			producers: RefCell::new(Registry::new()),
			polled_devices: RefCell::new(Registry::new()),

			pending: RefCell::new(VecDeque::new()),
			derived: RefCell::new(VecDeque::new()),

			in_pass: Cell::new(false),
			pass_count: Cell::new(0),
			id_counter: Cell::new(1),

			log_events: Cell::new(settings.log_events),
			max_derived_events_per_pass: settings.max_derived_events_per_pass,
		}
	}

	pub fn set_log_events(&self, log_events: bool) {
		self.log_events.set(log_events);
	}

	/// Whether a pass is currently underway.
	pub fn is_processing(&self) -> bool {
		self.in_pass.get()
	}

	/// Number of completed passes.
	pub fn pass_count(&self) -> u64 {
		self.pass_count.get()
	}

	fn next_id(&self) -> usize {
		let id = self.id_counter.get();
		self.id_counter.set(id + 1);
		id
	}
}


/// Queueing.
impl Router {
	/// Queue an event for the next pass.
	pub fn queue_event(&self, event: Event) {
		self.pending.borrow_mut().push_back(event);
	}

	/// Insert an event into the pass that is currently running, so that it is handled before the next
	/// queued event. Used for events derived from the one being handled, e.g. a button press synthesized
	/// from an analog trigger value.
	///
	/// Outside of a pass this is the same as [`Router::queue_event`].
	pub fn insert_in_queue(&self, event: Event) {
		if self.in_pass.get() {
			self.derived.borrow_mut().push_back(event);
		} else {
			log::debug!("insert_in_queue called outside of a pass, queueing '{}' for the next one", event.name());
			self.queue_event(event);
		}
	}

	pub fn pending_len(&self) -> usize {
		self.pending.borrow().len()
	}

	/// Remove and return everything currently pending.
	/// Together with [`Router::replace_queue`] this lets a cluster synchronizer swap in the agreed
	/// upon set of events before a pass.
	pub fn take_queue(&self) -> Vec<Event> {
		self.pending.borrow_mut().drain(..).collect()
	}

	/// Replace the pending queue, returning what was there before.
	pub fn replace_queue(&self, events: Vec<Event>) -> Vec<Event> {
		let previous = std::mem::replace(&mut *self.pending.borrow_mut(), events.into());
		previous.into()
	}
}


/// Registration.
impl Router {
	/// Register a listener for every event. Lower priorities are dispatched to first.
	pub fn add_listener<L>(&self, listener: &Rc<RefCell<L>>, priority: i32) -> ListenerId
		where L: Listener + 'static
	{
		self.add_shared_listener(listener.clone(), priority, None)
	}

	/// Register a listener that only receives events matching `prototype`.
	pub fn add_listener_matching<L>(&self, listener: &Rc<RefCell<L>>, priority: i32, prototype: EventPrototype) -> ListenerId
		where L: Listener + 'static
	{
		self.add_shared_listener(listener.clone(), priority, Some(prototype))
	}

	pub fn add_listener_fn<F>(&self, name: &str, priority: i32, prototype: impl Into<Option<EventPrototype>>, callback: F) -> ListenerId
		where F: FnMut(&Event, &Router) -> anyhow::Result<()> + 'static
	{
		let listener = Rc::new(RefCell::new(FnListener::new(name, callback)));
		self.add_shared_listener(listener, priority, prototype.into())
	}

	/// Listeners added while a pass is underway start receiving events from the next event handled.
	/// That includes listeners added by filters: whatever an event turns into while being filtered is
	/// delivered to the listeners registered when its filtering began.
	pub fn add_shared_listener(&self, listener: SharedListener, priority: i32, prototype: Option<EventPrototype>) -> ListenerId {
		let addr = Rc::as_ptr(&listener).cast::<()>();
		let mut listeners = self.listeners.borrow_mut();

		if let Some(existing) = listeners.find_by_addr(addr) {
			log::warn!("Listener is already registered, ignoring");
			return ListenerId(existing)
		}

		let id = self.next_id();
		listeners.insert(id, priority, addr, ListenerSlot { listener, prototype });
		ListenerId(id)
	}

	/// Listeners removed while a pass is underway still receive the event currently being dispatched.
	pub fn remove_listener(&self, id: ListenerId) -> bool {
		let removed = self.listeners.borrow_mut().remove(id.0);
		if !removed {
			log::warn!("Trying to remove unregistered listener {id:?}");
		}
		removed
	}

	pub fn has_listener(&self, id: ListenerId) -> bool {
		self.listeners.borrow().contains(id.0)
	}

	pub fn listener_count(&self) -> usize {
		self.listeners.borrow().len()
	}

	pub fn add_filter<F>(&self, filter: &Rc<RefCell<F>>, priority: i32) -> FilterId
		where F: Filter + 'static
	{
		self.add_shared_filter(filter.clone(), priority)
	}

	pub fn add_filter_fn<F>(&self, name: &str, priority: i32, callback: F) -> FilterId
		where F: FnMut(&Event, &Router) -> anyhow::Result<Filtered> + 'static
	{
		self.add_shared_filter(Rc::new(RefCell::new(FnFilter::new(name, callback))), priority)
	}

	pub fn add_shared_filter(&self, filter: SharedFilter, priority: i32) -> FilterId {
		let addr = Rc::as_ptr(&filter).cast::<()>();
		let mut filters = self.filters.borrow_mut();

		if let Some(existing) = filters.find_by_addr(addr) {
			log::warn!("Filter is already registered, ignoring");
			return FilterId(existing)
		}

		let id = self.next_id();
		filters.insert(id, priority, addr, filter);
		FilterId(id)
	}

	pub fn remove_filter(&self, id: FilterId) -> bool {
		let removed = self.filters.borrow_mut().remove(id.0);
		if !removed {
			log::warn!("Trying to remove unregistered filter {id:?}");
		}
		removed
	}

	pub fn has_filter(&self, id: FilterId) -> bool {
		self.filters.borrow().contains(id.0)
	}

	pub fn add_producer<P>(&self, producer: &Rc<RefCell<P>>) -> ProducerId
		where P: Producer + 'static
	{
		let producer: SharedProducer = producer.clone();
		let addr = Rc::as_ptr(&producer).cast::<()>();
		let mut producers = self.producers.borrow_mut();

		if let Some(existing) = producers.find_by_addr(addr) {
			log::warn!("Producer is already registered, ignoring");
			return ProducerId(existing)
		}

		let id = self.next_id();
		producers.insert(id, 0, addr, producer);
		ProducerId(id)
	}

	pub fn remove_producer(&self, id: ProducerId) -> bool {
		let removed = self.producers.borrow_mut().remove(id.0);
		if !removed {
			log::warn!("Trying to remove unregistered producer {id:?}");
		}
		removed
	}

	pub fn add_polled_device<D>(&self, device: &Rc<RefCell<D>>) -> DeviceId
		where D: PolledDevice + 'static
	{
		let device: SharedPolledDevice = device.clone();
		let addr = Rc::as_ptr(&device).cast::<()>();
		let mut devices = self.polled_devices.borrow_mut();

		if let Some(existing) = devices.find_by_addr(addr) {
			log::warn!("Polled device is already registered, ignoring");
			return DeviceId(existing)
		}

		let id = self.next_id();
		devices.insert(id, 0, addr, device);
		DeviceId(id)
	}

	pub fn remove_polled_device(&self, id: DeviceId) -> bool {
		let removed = self.polled_devices.borrow_mut().remove(id.0);
		if !removed {
			log::warn!("Trying to remove unregistered polled device {id:?}");
		}
		removed
	}
}


/// Introspection.
impl Router {
	/// Every prototype declared by a registered producer, deduplicated.
	pub fn event_prototypes(&self) -> Result<Vec<EventPrototype>, BusError> {
		self.event_prototypes_with(TypeMatch::Any)
	}

	/// Prototypes declared by registered producers, restricted to those declaring exactly `data_type`.
	/// [`TypeMatch::Any`] returns all of them.
	///
	/// Fails if two producers disagree about the payload type of an event with the same name.
	pub fn event_prototypes_with(&self, data_type: TypeMatch) -> Result<Vec<EventPrototype>, BusError> {
		let mut declared: Vec<EventPrototype> = Vec::new();

		for producer in self.producers.borrow().handles() {
			let Ok(producer) = producer.try_borrow() else {
				log::warn!("Skipping producer that is currently busy while collecting event prototypes");
				continue
			};

			for prototype in producer.event_prototypes() {
				let existing = declared.iter()
					.find(|existing| existing.name() == prototype.name());

				match existing {
					Some(existing) if existing.data_type() == prototype.data_type() => {}

					Some(existing) => {
						if let (TypeMatch::Exactly(_), TypeMatch::Exactly(_)) = (existing.data_type(), prototype.data_type()) {
							return Err(BusError::ConflictingPrototypes {
								name: prototype.name().to_owned(),
								first: existing.data_type(),
								second: prototype.data_type(),
							})
						}

						declared.push(prototype);
					}

					None => declared.push(prototype),
				}
			}
		}

		if let TypeMatch::Exactly(_) = data_type {
			declared.retain(|prototype| prototype.data_type() == data_type);
		}

		Ok(declared)
	}
}


/// Dispatch.
impl Router {
	/// Run one pass: poll devices, then take every pending event through the filters and on to the listeners.
	///
	/// Events queued during the pass are left for the next one, while events inserted during the pass are
	/// handled within it, immediately after the event that caused them. Failing callbacks are logged and
	/// otherwise ignored.
	#[instrument(skip_all, name="Router::process_queue")]
	pub fn process_queue(&self) -> PassStats {
		if self.in_pass.replace(true) {
			log::error!("Router::process_queue called from within a pass, ignoring");
			return PassStats::default()
		}

		let mut stats = PassStats::default();

		self.poll_devices(&mut stats);

		let batch = std::mem::take(&mut *self.pending.borrow_mut());
		for event in batch {
			stats.events += 1;

			let listeners = self.listeners.borrow().snapshot();

			for event in self.run_filters(event, &mut stats) {
				self.dispatch(&event, &listeners, &mut stats);
				self.drain_derived(&mut stats);
			}
		}

		self.in_pass.set(false);
		self.pass_count.set(self.pass_count.get() + 1);

		if stats.failures > 0 {
			log::debug!("Pass {} finished with {} failed callbacks", self.pass_count.get(), stats.failures);
		}

		stats
	}

	fn poll_devices(&self, stats: &mut PassStats) {
		let devices = self.polled_devices.borrow().snapshot();
		let mut polled = Vec::new();

		for device in devices {
			let Ok(mut device) = device.try_borrow_mut() else {
				log::warn!("Skipping polled device that is currently busy");
				stats.failures += 1;
				continue
			};

			let start = polled.len();
			let result = isolate(|| device.poll_for_events(&mut polled));

			if let Err(failure) = result {
				log::error!("Polled device '{}' failed: {failure}", device.name());
				stats.failures += 1;

				// Don't let a failing device contribute a partial set of events
				polled.truncate(start);
			}
		}

		self.pending.borrow_mut().extend(polled);
	}

	fn drain_derived(&self, stats: &mut PassStats) {
		loop {
			let Some(event) = self.derived.borrow_mut().pop_front() else {
				break
			};

			if stats.derived >= self.max_derived_events_per_pass {
				let dropped = 1 + self.derived.borrow_mut().drain(..).count();
				log::error!("Exceeded {} derived events in a single pass, dropping {dropped} events starting at '{}'",
					self.max_derived_events_per_pass, event.name());

				stats.dropped += dropped;
				break
			}

			stats.derived += 1;

			let listeners = self.listeners.borrow().snapshot();

			for event in self.run_filters(event, stats) {
				self.dispatch(&event, &listeners, stats);
			}
		}
	}

	fn run_filters(&self, event: Event, stats: &mut PassStats) -> SmallVec<[Event; 2]> {
		let filters = self.filters.borrow().snapshot();
		let mut events: SmallVec<[Event; 2]> = smallvec![event];

		for filter in filters {
			if events.is_empty() {
				break
			}

			let Ok(mut filter) = filter.try_borrow_mut() else {
				log::warn!("Skipping filter that is currently busy");
				stats.failures += 1;
				continue
			};

			let mut filtered = SmallVec::new();

			for event in events {
				match isolate(|| filter.filter(&event, self)) {
					Ok(Filtered::Replace(replacement)) => filtered.extend(replacement),
					Ok(Filtered::Pass) => filtered.push(event),

					Err(failure) => {
						log::error!("Filter '{}' failed on event '{}': {failure}", filter.name(), event.name());
						stats.failures += 1;
						filtered.push(event);
					}
				}
			}

			events = filtered;
		}

		if events.is_empty() {
			stats.suppressed += 1;
		}

		events
	}

	fn dispatch(&self, event: &Event, listeners: &[ListenerSlot], stats: &mut PassStats) {
		if self.log_events.get() {
			log::info!("Processing event {event}");
		}

		for ListenerSlot { listener, prototype } in listeners {
			if let Some(prototype) = prototype {
				match prototype.check(event) {
					Ok(()) => {}
					Err(MatchError::Name { .. }) => continue,

					Err(err @ MatchError::Type { .. }) => {
						log::debug!("Not delivering to listener: {err}");
						continue
					}
				}
			}

			let Ok(mut listener) = listener.try_borrow_mut() else {
				log::warn!("Skipping listener that is currently busy with another event, while dispatching '{}'", event.name());
				stats.failures += 1;
				continue
			};

			stats.delivered += 1;

			if let Err(failure) = isolate(|| listener.on_event(event, self)) {
				log::error!("Listener '{}' failed on event '{}': {failure}", listener.name(), event.name());
				stats.failures += 1;
			}
		}
	}
}



/// Run a callback, turning both errors and panics into a printable failure.
/// Used wherever independently authored callbacks must not take down whoever invokes them.
pub fn isolate<R>(callback: impl FnOnce() -> anyhow::Result<R>) -> Result<R, String> {
	match panic::catch_unwind(AssertUnwindSafe(callback)) {
		Ok(Ok(value)) => Ok(value),
		Ok(Err(err)) => Err(format!("{err:#}")),
		Err(payload) => Err(format!("panicked: {}", panic_message(&*payload))),
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
	if let Some(message) = payload.downcast_ref::<&str>() {
		message
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message
	} else {
		"<unknown>"
	}
}



#[cfg(test)]
mod tests;
