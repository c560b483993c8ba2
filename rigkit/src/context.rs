use std::rc::Rc;

use tracing::instrument;

use rigkit_bus::{AliasHandle, EventAlias, PassStats, Router};
use rigkit_cfg::Config;

use crate::Settings;


/// Everything an [`App`](crate::App) gets to interact with.
pub struct Context {
	pub router: Rc<Router>,
	pub cfg: Config,
	pub settings: Settings,

	tick_count: u64,
	wants_quit: bool,
}

impl Context {
	pub fn router(&self) -> &Router {
		&self.router
	}

	/// Number of completed ticks.
	pub fn tick_count(&self) -> u64 {
		self.tick_count
	}

	/// Stop the runner after the current tick.
	pub fn quit(&mut self) {
		self.wants_quit = true;
	}

	pub fn wants_quit(&self) -> bool {
		self.wants_quit
	}
}


/// Owns the router and configuration for one application run, and drives router passes.
///
/// [`run`](crate::run) uses an `Engine` internally, but one can also be ticked by hand, e.g. when embedding
/// in an existing frame loop.
pub struct Engine {
	pub context: Context,
	aliases: Vec<AliasHandle>,
}

impl Engine {
	/// Resolve [`Settings`] from `cfg`, construct the router and install configured aliases.
	/// Aliases that fail to install are logged and skipped.
	pub fn new(cfg: Config) -> anyhow::Result<Engine> {
		let settings = Settings::from_config(&cfg)?;
		let router = Rc::new(Router::new(settings.router.clone()));

		let mut aliases = Vec::new();
		for decl in settings.aliases.iter().cloned() {
			let alias_name = decl.alias_name.clone();

			match EventAlias::install(decl, &router) {
				Ok(handle) => aliases.push(handle),
				Err(err) => log::error!("Failed to install alias '{alias_name}': {err}"),
			}
		}

		log::info!("Engine started with {} aliases, ticking at {}Hz", aliases.len(), settings.tick_rate);

		Ok(Engine {
			context: Context {
				router,
				cfg,
				settings,

				tick_count: 0,
				wants_quit: false,
			},

			aliases,
		})
	}

	pub fn router(&self) -> &Rc<Router> {
		&self.context.router
	}

	/// Run a single router pass.
	#[instrument(skip_all, name="Engine::tick")]
	pub fn tick(&mut self) -> PassStats {
		let stats = self.context.router.process_queue();
		self.context.tick_count += 1;
		stats
	}

	pub fn shutdown(self) {
		let router = &self.context.router;

		for alias in self.aliases {
			alias.uninstall(router);
		}

		log::info!("Engine shut down after {} ticks", self.context.tick_count);
	}
}
