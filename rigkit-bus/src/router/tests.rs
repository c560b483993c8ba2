use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rigkit_event::{Event, EventPrototype, PayloadType, TypeMatch};

use crate::*;


type Log = Rc<RefCell<Vec<String>>>;

fn event(name: &str) -> Event {
	Event::new(name).unwrap()
}

/// Registers a listener that records "<tag>:<event name>" for everything it sees.
fn record(router: &Router, log: &Log, tag: &'static str, priority: i32) -> ListenerId {
	let log = log.clone();
	router.add_listener_fn(tag, priority, None, move |event, _| {
		log.borrow_mut().push(format!("{tag}:{}", event.name()));
		Ok(())
	})
}

fn take(log: &Log) -> Vec<String> {
	std::mem::take(&mut *log.borrow_mut())
}


#[test]
fn fifo_then_listener_priority() {
	let router = Router::default();
	let log = Log::default();

	record(&router, &log, "late", 20);
	record(&router, &log, "early", 1);
	record(&router, &log, "default", DEFAULT_LISTENER_PRIORITY);

	router.queue_event(event("A"));
	router.queue_event(event("B"));

	assert!(take(&log).is_empty(), "nothing is delivered before the pass");

	let stats = router.process_queue();
	assert_eq!(take(&log), [
		"early:A", "default:A", "late:A",
		"early:B", "default:B", "late:B",
	]);

	assert_eq!(stats.events, 2);
	assert_eq!(stats.delivered, 6);
	assert_eq!(stats.failures, 0);
	assert_eq!(router.pending_len(), 0);
}

#[test]
fn equal_priorities_dispatch_in_registration_order() {
	let router = Router::default();
	let log = Log::default();

	record(&router, &log, "first", 5);
	record(&router, &log, "second", 5);
	record(&router, &log, "third", 5);

	router.queue_event(event("X"));
	router.process_queue();

	assert_eq!(take(&log), ["first:X", "second:X", "third:X"]);
}

#[test]
fn dispatch_order_is_deterministic() {
	fn run() -> Vec<String> {
		let router = Router::default();
		let log = Log::default();

		record(&router, &log, "b", 3);
		record(&router, &log, "a", 3);
		router.add_filter_fn("expand", 0, |event, _| {
			if event.name() == "Src" {
				Ok(Filtered::replace([event.clone(), event.renamed("Copy")?]))
			} else {
				Ok(Filtered::Pass)
			}
		});

		for name in ["Src", "Other", "Src"] {
			router.queue_event(event(name));
		}

		router.process_queue();
		take(&log)
	}

	let first = run();
	assert_eq!(first, [
		"b:Src", "a:Src", "b:Copy", "a:Copy",
		"b:Other", "a:Other",
		"b:Src", "a:Src", "b:Copy", "a:Copy",
	]);
	assert_eq!(first, run());
}

#[test]
fn inserted_events_are_handled_in_the_same_pass() {
	let router = Router::default();
	let log = Log::default();

	router.add_listener_fn("converter", CONVERTER_LISTENER_PRIORITY, EventPrototype::any("Trigger/Value"), |_, router| {
		router.insert_in_queue(Event::new("Trigger/Down")?);
		Ok(())
	});

	record(&router, &log, "app", DEFAULT_LISTENER_PRIORITY);

	router.queue_event(event("Trigger/Value"));
	router.queue_event(event("Next"));

	let stats = router.process_queue();

	// The derived event is handled right after its cause and before the next queued event
	assert_eq!(take(&log), ["app:Trigger/Value", "app:Trigger/Down", "app:Next"]);
	assert_eq!(stats.events, 2);
	assert_eq!(stats.derived, 1);

	router.process_queue();
	assert!(take(&log).is_empty());
}

#[test]
fn derived_events_go_through_filters() {
	let router = Router::default();
	let log = Log::default();

	EventAlias::install(AliasDecl::new("Select", AliasStrategy::RenameOriginal, [EventPrototype::any("Derived")]), &router)
		.unwrap();

	router.add_listener_fn("deriver", 0, EventPrototype::any("Cause"), |_, router| {
		router.insert_in_queue(Event::new("Derived")?);
		Ok(())
	});

	record(&router, &log, "app", DEFAULT_LISTENER_PRIORITY);

	router.queue_event(event("Cause"));
	router.process_queue();

	assert_eq!(take(&log), ["app:Cause", "app:Select"]);
}

#[test]
fn queued_during_pass_waits_for_next_pass() {
	let router = Router::default();
	let log = Log::default();

	router.add_listener_fn("requeue", 0, EventPrototype::any("Ping"), |_, router| {
		router.queue_event(Event::new("Pong")?);
		Ok(())
	});
	record(&router, &log, "app", DEFAULT_LISTENER_PRIORITY);

	router.queue_event(event("Ping"));
	router.process_queue();
	assert_eq!(take(&log), ["app:Ping"]);
	assert_eq!(router.pending_len(), 1);

	router.process_queue();
	assert_eq!(take(&log), ["app:Pong"]);
}

#[test]
fn insert_outside_of_pass_is_queued() {
	let router = Router::default();
	let log = Log::default();
	record(&router, &log, "app", 0);

	router.insert_in_queue(event("Early"));
	assert_eq!(router.pending_len(), 1);

	router.process_queue();
	assert_eq!(take(&log), ["app:Early"]);
}

#[test]
fn failing_callbacks_are_isolated() {
	let router = Router::default();
	let log = Log::default();

	router.add_listener_fn("errors", 0, None, |event, _| {
		anyhow::bail!("can't handle {}", event.name())
	});

	router.add_listener_fn("panics", 1, None, |_, _| -> anyhow::Result<()> {
		panic!("listener bug")
	});

	router.add_filter_fn("broken filter", 0, |_, _| -> anyhow::Result<Filtered> {
		anyhow::bail!("filter bug")
	});

	record(&router, &log, "app", DEFAULT_LISTENER_PRIORITY);

	router.queue_event(event("A"));
	router.queue_event(event("B"));

	let stats = router.process_queue();

	assert_eq!(take(&log), ["app:A", "app:B"]);
	assert_eq!(stats.failures, 6);
	assert!(!router.is_processing());
}

#[test]
fn filters_suppress_and_pipeline() {
	let router = Router::default();
	let log = Log::default();

	// Runs second: sees the renamed event from the first filter
	router.add_filter_fn("suppress", 5, |event, _| {
		Ok(match event.name() {
			"Noise" | "Renamed" => Filtered::suppress(),
			_ => Filtered::Pass,
		})
	});

	router.add_filter_fn("rename", 1, |event, _| {
		Ok(match event.name() {
			"Original" => Filtered::single(event.renamed("Renamed")?),
			"Keep" => Filtered::single(event.renamed("Kept")?),
			_ => Filtered::Pass,
		})
	});

	record(&router, &log, "app", 0);

	for name in ["Noise", "Original", "Keep", "Plain"] {
		router.queue_event(event(name));
	}

	let stats = router.process_queue();

	assert_eq!(take(&log), ["app:Kept", "app:Plain"]);
	assert_eq!(stats.suppressed, 2);
}

#[test]
fn alias_rename_clone_and_original() {
	for (strategy, expected) in [
		(AliasStrategy::RenameClone, vec!["app:A/Down", "app:B/Down"]),
		(AliasStrategy::RenameOriginal, vec!["app:B/Down"]),
	] {
		let router = Router::default();
		let log = Log::default();

		EventAlias::install(AliasDecl::new("B/Down", strategy, [EventPrototype::any("A/Down")]), &router).unwrap();
		record(&router, &log, "app", 0);

		router.queue_event(event("A/Down"));
		router.queue_event(event("C/Down"));
		router.process_queue();

		let mut expected = expected;
		expected.push("app:C/Down");
		assert_eq!(take(&log), expected, "{strategy:?}");
	}
}

#[test]
fn uninstalled_alias_stops_renaming() {
	let router = Router::default();
	let log = Log::default();

	let handle = EventAlias::install(AliasDecl::new("B", AliasStrategy::RenameOriginal, [EventPrototype::any("A")]), &router).unwrap();
	record(&router, &log, "app", 0);

	assert_eq!(router.event_prototypes().unwrap(), vec![EventPrototype::any("B")]);

	handle.uninstall(&router);
	assert!(router.event_prototypes().unwrap().is_empty());

	router.queue_event(event("A"));
	router.process_queue();
	assert_eq!(take(&log), ["app:A"]);
}

#[test]
fn listener_prototypes_restrict_delivery() {
	let router = Router::default();
	let log = Log::default();

	let typed_log = log.clone();
	router.add_listener_fn("typed", 0, EventPrototype::typed::<f32>("Value"), move |event, _| {
		typed_log.borrow_mut().push(format!("typed:{}", event.data::<f32>()?));
		Ok(())
	});

	let any_log = log.clone();
	router.add_listener_fn("any", 1, EventPrototype::any("Value"), move |event, _| {
		any_log.borrow_mut().push(format!("any:{}", event.payload_type()));
		Ok(())
	});

	router.queue_event(Event::with_data("Value", 0.5f32).unwrap());
	router.queue_event(Event::with_data("Value", 3i32).unwrap());
	router.queue_event(event("Other"));
	router.process_queue();

	assert_eq!(take(&log), ["typed:0.5", "any:float", "any:int"]);
}

#[test]
fn registration_changes_mid_dispatch() {
	let router = Rc::new(Router::default());
	let log = Log::default();

	let victim = record(&router, &log, "victim", 10);

	let added = Rc::new(RefCell::new(None));
	{
		let log = log.clone();
		let added = added.clone();

		router.add_listener_fn("mutator", 0, EventPrototype::any("First"), move |_, router| {
			// Removal takes effect after the current event, addition from the next event on
			router.remove_listener(victim);

			let log = log.clone();
			let id = router.add_listener_fn("newcomer", 5, None, move |event, _| {
				log.borrow_mut().push(format!("newcomer:{}", event.name()));
				Ok(())
			});
			*added.borrow_mut() = Some(id);
			Ok(())
		});
	}

	router.queue_event(event("First"));
	router.queue_event(event("Second"));
	router.process_queue();

	assert_eq!(take(&log), ["victim:First", "newcomer:Second"]);
	assert!(!router.has_listener(victim));
	assert!(router.has_listener(added.borrow().unwrap()));
}

#[test]
fn duplicate_and_unknown_registrations() {
	struct Counter(usize);

	impl Listener for Counter {
		fn on_event(&mut self, _: &Event, _: &Router) -> anyhow::Result<()> {
			self.0 += 1;
			Ok(())
		}
	}

	let router = Router::default();
	let counter = Rc::new(RefCell::new(Counter(0)));

	let id = router.add_listener(&counter, 0);
	assert_eq!(router.add_listener(&counter, 5), id);
	assert_eq!(router.listener_count(), 1);

	router.queue_event(event("A"));
	router.process_queue();
	assert_eq!(counter.borrow().0, 1);

	assert!(router.remove_listener(id));
	assert!(!router.remove_listener(id));

	router.queue_event(event("B"));
	router.process_queue();
	assert_eq!(counter.borrow().0, 1);
}

#[test]
fn polled_devices_contribute_before_the_pass() {
	struct Sensor {
		samples: Vec<f32>,
		fail_next: bool,
	}

	impl PolledDevice for Sensor {
		fn poll_for_events(&mut self, events: &mut Vec<Event>) -> anyhow::Result<()> {
			for sample in self.samples.drain(..) {
				events.push(Event::with_data("Sensor/Value", sample)?);
			}

			if std::mem::take(&mut self.fail_next) {
				anyhow::bail!("sensor disconnected");
			}

			Ok(())
		}
	}

	let router = Router::default();
	let log = Log::default();
	record(&router, &log, "app", 0);

	let sensor = Rc::new(RefCell::new(Sensor { samples: vec![0.1, 0.2], fail_next: false }));
	let device = router.add_polled_device(&sensor);

	router.queue_event(event("Queued"));
	let stats = router.process_queue();
	assert_eq!(take(&log), ["app:Queued", "app:Sensor/Value", "app:Sensor/Value"]);
	assert_eq!(stats.events, 3);

	// Events from a failing poll are discarded as a whole
	sensor.borrow_mut().samples.push(0.3);
	sensor.borrow_mut().fail_next = true;
	let stats = router.process_queue();
	assert!(take(&log).is_empty());
	assert_eq!(stats.failures, 1);

	assert!(router.remove_polled_device(device));
	sensor.borrow_mut().samples.push(0.4);
	router.process_queue();
	assert!(take(&log).is_empty());
}

#[test]
fn producer_prototypes() {
	struct Device(Vec<EventPrototype>);

	impl Producer for Device {
		fn event_prototypes(&self) -> Vec<EventPrototype> {
			self.0.clone()
		}
	}

	let router = Router::default();

	let mouse = Rc::new(RefCell::new(Device(vec![
		EventPrototype::no_data("Mouse/Left/Down"),
		EventPrototype::typed::<rigkit_event::Vec2>("Mouse/Position"),
	])));
	let trigger = Rc::new(RefCell::new(Device(vec![
		EventPrototype::typed::<f32>("Trigger/Value"),
		EventPrototype::no_data("Mouse/Left/Down"),
	])));

	router.add_producer(&mouse);
	let trigger_id = router.add_producer(&trigger);

	assert_eq!(router.event_prototypes().unwrap().len(), 3);
	assert_eq!(
		router.event_prototypes_with(TypeMatch::Exactly(PayloadType::Float)).unwrap(),
		vec![EventPrototype::typed::<f32>("Trigger/Value")]
	);

	let conflicting = Rc::new(RefCell::new(Device(vec![EventPrototype::typed::<bool>("Trigger/Value")])));
	router.add_producer(&conflicting);

	assert_eq!(router.event_prototypes(), Err(BusError::ConflictingPrototypes {
		name: "Trigger/Value".into(),
		first: TypeMatch::Exactly(PayloadType::Float),
		second: TypeMatch::Exactly(PayloadType::Bool),
	}));

	router.remove_producer(trigger_id);
	assert!(router.event_prototypes().is_ok());
}

#[test]
fn runaway_derived_events_are_capped() {
	let router = Router::new(RouterSettings {
		max_derived_events_per_pass: 8,
		..RouterSettings::default()
	});

	router.add_listener_fn("echo", 0, EventPrototype::any("Echo"), |event, router| {
		router.insert_in_queue(event.clone());
		Ok(())
	});

	router.queue_event(event("Echo"));
	let stats = router.process_queue();

	assert_eq!(stats.derived, 8);
	assert_eq!(stats.dropped, 1);
	assert!(!router.is_processing());
}

#[test]
fn queue_can_be_swapped() {
	let router = Router::default();
	let log = Log::default();
	record(&router, &log, "app", 0);

	router.queue_event(event("Local"));
	let local = router.replace_queue(vec![event("Synced/A"), event("Synced/B")]);
	assert_eq!(local, vec![event("Local")]);

	router.process_queue();
	assert_eq!(take(&log), ["app:Synced/A", "app:Synced/B"]);

	router.queue_event(event("C"));
	assert_eq!(router.take_queue(), vec![event("C")]);
	assert_eq!(router.pending_len(), 0);
}

#[test]
fn listeners_added_while_filtering_wait_for_the_next_event() {
	let router = Router::default();
	let log = Log::default();

	record(&router, &log, "existing", DEFAULT_LISTENER_PRIORITY);

	let registered = Rc::new(Cell::new(false));
	router.add_filter_fn("registering clone", ALIAS_FILTER_PRIORITY, {
		let log = log.clone();
		let registered = registered.clone();

		move |event, router| {
			if event.name() != "A" {
				return Ok(Filtered::Pass)
			}

			if !registered.replace(true) {
				let log = log.clone();
				router.add_listener_fn("newcomer", 0, None, move |event, _| {
					log.borrow_mut().push(format!("newcomer:{}", event.name()));
					Ok(())
				});
			}

			Ok(Filtered::replace([event.clone(), event.renamed("B")?]))
		}
	});

	router.queue_event(event("A"));
	router.queue_event(event("C"));
	router.process_queue();

	assert_eq!(take(&log), ["existing:A", "existing:B", "newcomer:C", "existing:C"]);
}
