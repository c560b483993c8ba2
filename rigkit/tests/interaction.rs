use std::cell::Cell;

use rigkit::prelude::*;
use rigkit::Engine;
use rigkit::input::FloatToButtonsSettings;


const CONFIG: &str = r#"
[engine]
tick_rate = 1000.0

[[aliases]]
alias_name = "Select/Down"
strategy = "rename_clone"
source_prototypes = [
	{ name = "Mouse/Left/Down", data_type = "none" },
	{ name = "Wand/Trigger/Down", data_type = "none" },
]

[[aliases]]
alias_name = "Select/Up"
source_prototypes = [
	{ name = "Mouse/Left/Up", data_type = "none" },
	{ name = "Wand/Trigger/Up", data_type = "none" },
]
"#;


type Log = Rc<RefCell<Vec<String>>>;

fn engine() -> Engine {
	Engine::new(Config::from_toml_str(CONFIG).unwrap()).unwrap()
}

fn record_events(router: &Router) -> Log {
	let log = Log::default();
	let recorder = log.clone();

	router.add_listener_fn("recorder", 100, None, move |event, _| {
		recorder.borrow_mut().push(event.name().to_owned());
		Ok(())
	});

	log
}

fn take(log: &Log) -> Vec<String> {
	std::mem::take(&mut *log.borrow_mut())
}

/// Idle --Select/Down--> Active, requiring `token`. Active --Select/Up--> Idle, releasing it.
fn technique(name: &str, active_state: &str, token: &SharedToken) -> Rc<RefCell<Fsm>> {
	let mut fsm = Fsm::new(name, "Idle");
	fsm.add_state(active_state).unwrap();

	fsm.add_arc("Idle", active_state, EventPrototype::any("Select/Down")).unwrap()
		.requires_token(token);

	fsm.add_arc(active_state, "Idle", EventPrototype::any("Select/Up")).unwrap()
		.releases_token(token);

	Rc::new(RefCell::new(fsm))
}


#[test]
fn analog_trigger_drives_fsm_within_one_tick() {
	let mut engine = engine();
	let router = engine.router().clone();
	let log = record_events(&router);

	FloatToButtons::new(FloatToButtonsSettings {
		float_event: "Wand/Trigger/Value".into(),
		button_down_event: "Wand/Trigger/Down".into(),
		button_up_event: "Wand/Trigger/Up".into(),
		normalized_event: None,
		..FloatToButtonsSettings::default()
	}).install(&router);

	let focus = Token::shared("focus");
	let selector = technique("selector", "Selecting", &focus);
	let menu = technique("menu", "Open", &focus);

	Fsm::start_listening(&selector, &router, DEFAULT_LISTENER_PRIORITY);
	Fsm::start_listening(&menu, &router, DEFAULT_LISTENER_PRIORITY);

	router.queue_event(Event::with_data("Wand/Trigger/Value", 0.0f32).unwrap());
	router.queue_event(Event::with_data("Wand/Trigger/Value", 0.9f32).unwrap());
	engine.tick();

	// The derived button event, its alias and the resulting transition all happen within the tick
	assert_eq!(take(&log), [
		"Wand/Trigger/Value",
		"Wand/Trigger/Value",
		"Wand/Trigger/Down",
		"Select/Down",
	]);

	assert_eq!(selector.borrow().current_state_name(), "Selecting");
	assert!(focus.is_owned_by(selector.borrow().owner()));

	// The menu lost the arbitration
	assert_eq!(menu.borrow().current_state_name(), "Idle");

	// Releasing the trigger renames the original event, so only the alias is observed
	router.queue_event(Event::new("Mouse/Left/Up").unwrap());
	engine.tick();

	assert_eq!(take(&log), ["Select/Up"]);
	assert_eq!(selector.borrow().current_state_name(), "Idle");
	assert!(focus.is_available());

	// With the selector out of the way the menu gets the token
	selector.borrow_mut().set_enabled(false);
	router.queue_event(Event::new("Mouse/Left/Down").unwrap());
	engine.tick();

	assert_eq!(take(&log), ["Mouse/Left/Down", "Select/Down"]);
	assert_eq!(menu.borrow().current_state_name(), "Open");
	assert!(focus.is_owned_by(menu.borrow().owner()));
	assert_eq!(engine.context.tick_count(), 3);
}

#[test]
fn queued_from_listener_arrives_next_tick() {
	let mut engine = engine();
	let router = engine.router().clone();
	let log = record_events(&router);

	router.add_listener_fn("echo", 0, EventPrototype::any("Ping"), |_, router| {
		router.queue_event(Event::new("Pong")?);
		Ok(())
	});

	router.queue_event(Event::new("Ping").unwrap());
	engine.tick();
	assert_eq!(take(&log), ["Ping"]);

	engine.tick();
	assert_eq!(take(&log), ["Pong"]);
}

#[test]
fn configured_aliases_are_introspectable() {
	let cfg = Config::from_toml_str(&format!("{CONFIG}\n[[aliases]]\nalias_name = \"Empty\"\nsource_prototypes = []\n")).unwrap();

	// The empty alias is rejected without stopping startup
	let engine = Engine::new(cfg).unwrap();

	let names: Vec<_> = engine.router().event_prototypes().unwrap()
		.into_iter()
		.map(|prototype| prototype.to_string())
		.collect();

	assert_eq!(names, ["Select/Down <none>", "Select/Up <none>"]);
	engine.shutdown();
}


struct CountingApp {
	menu: rigkit::input::Installed<CallableProducer>,
	shut_down: Rc<Cell<bool>>,
}

impl App for CountingApp {
	fn update(&mut self, ctx: &mut Context) -> anyhow::Result<()> {
		self.menu.inner.borrow().produce("Menu/Toggle", ctx.router());

		if ctx.tick_count() >= 5 {
			ctx.quit();
		}

		Ok(())
	}

	fn shutdown(&mut self, _: &mut Context) {
		self.shut_down.set(true);
	}
}

#[test]
fn runner_ticks_until_quit() {
	let seen = Rc::new(Cell::new(0));
	let shut_down = Rc::new(Cell::new(false));

	rigkit::run_with_config(Config::from_toml_str(CONFIG).unwrap(), |ctx| {
		let router = ctx.router();
		let menu = CallableProducer::new(["Menu/Toggle"]).install(router);

		router.add_listener_fn("counter", DEFAULT_LISTENER_PRIORITY, EventPrototype::no_data("Menu/Toggle"), {
			let seen = seen.clone();
			move |_, _| {
				seen.set(seen.get() + 1);
				Ok(())
			}
		});

		Ok(CountingApp {
			menu,
			shut_down: shut_down.clone(),
		})
	}).unwrap();

	// Produced during ticks 1 to 5, handled during ticks 2 to 5
	assert_eq!(seen.get(), 4);
	assert!(shut_down.get());
}

#[test]
fn failing_app_stops_runner() {
	struct Failing;

	impl App for Failing {
		fn update(&mut self, _: &mut Context) -> anyhow::Result<()> {
			anyhow::bail!("app broke")
		}
	}

	let result = rigkit::run_with_config(Config::default(), |_| Ok(Failing));
	assert!(result.is_err());
}
