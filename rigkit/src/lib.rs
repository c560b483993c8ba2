//! Device-agnostic interaction toolkit. Input devices, interaction techniques and application logic talk
//! through a single named-event [`Router`](bus::Router), with interaction techniques expressed as
//! state machines arbitrated by shared tokens.

pub mod prelude;
pub use crate::prelude::*;

pub mod context;
pub use context::{Context, Engine};

pub mod logging;

pub mod settings;
pub use settings::Settings;

use std::time::Instant;


pub trait App {
	/// Called once per tick, after the router pass.
	fn update(&mut self, ctx: &mut Context) -> anyhow::Result<()>;

	fn shutdown(&mut self, _: &mut Context) {}
}


/// Load config for `app_name` and tick `start_app`'s app until it asks to quit.
pub fn run<F, A>(app_name: &str, start_app: F) -> anyhow::Result<()>
	where A: App + 'static
		, F: FnOnce(&mut Context) -> anyhow::Result<A>
{
	logging::init();

	let cfg = cfg::Config::for_app_name(app_name)?;
	run_with_config(cfg, start_app)
}


#[instrument(skip_all, name="rigkit::run_with_config")]
pub fn run_with_config<F, A>(cfg: cfg::Config, start_app: F) -> anyhow::Result<()>
	where A: App + 'static
		, F: FnOnce(&mut Context) -> anyhow::Result<A>
{
	logging::init();

	let mut engine = Engine::new(cfg)?;
	logging::set_level(engine.context.settings.log_level);

	let mut app = start_app(&mut engine.context)?;
	let tick_duration = engine.context.settings.tick_duration();

	let result = loop {
		let tick_start = Instant::now();

		engine.tick();

		if let Err(err) = app.update(&mut engine.context) {
			break Err(err)
		}

		if engine.context.wants_quit() {
			break Ok(())
		}

		if let Some(remaining) = tick_duration.checked_sub(tick_start.elapsed()) {
			std::thread::sleep(remaining);
		}
	};

	app.shutdown(&mut engine.context);
	engine.shutdown();

	result
}
