use std::time::Duration;

use anyhow::Context as _;
use log::LevelFilter;

use rigkit_bus::{AliasDecl, RouterSettings};
use rigkit_cfg::Config;


/// Engine settings resolved from a [`Config`].
#[derive(Debug, Clone)]
pub struct Settings {
	/// Ticks per second driven by the runner.
	pub tick_rate: f64,

	pub router: RouterSettings,

	pub log_level: LevelFilter,

	/// Aliases installed at startup.
	pub aliases: Vec<AliasDecl>,
}

impl Default for Settings {
	fn default() -> Settings {
		Settings {
			tick_rate: 60.0,
			router: RouterSettings::default(),
			log_level: LevelFilter::Info,
			aliases: Vec::new(),
		}
	}
}

impl Settings {
	/// Missing or malformed scalar values fall back to their defaults with a warning.
	/// Malformed alias declarations are an error.
	pub fn from_config(cfg: &Config) -> anyhow::Result<Settings> {
		let defaults = Settings::default();

		let mut tick_rate = cfg.get_or("engine.tick_rate", defaults.tick_rate);
		if !tick_rate.is_finite() || tick_rate <= 0.0 || Duration::try_from_secs_f64(1.0 / tick_rate).is_err() {
			log::warn!("Invalid engine.tick_rate {tick_rate}, using {}", defaults.tick_rate);
			tick_rate = defaults.tick_rate;
		}

		// Read key by key so that arguments overriding one value don't hide the others
		let router = RouterSettings {
			log_events: cfg.get_or("router.log_events", defaults.router.log_events),
			max_derived_events_per_pass: cfg.get_or("router.max_derived_events_per_pass", defaults.router.max_derived_events_per_pass),
		};

		let log_level = match cfg.get::<String>("log.level") {
			Ok(Some(level)) => level.parse().unwrap_or_else(|_| {
				log::warn!("Unknown log.level '{level}', using {}", defaults.log_level);
				defaults.log_level
			}),

			Ok(None) => defaults.log_level,

			Err(err) => {
				log::warn!("{err:#}, using {}", defaults.log_level);
				defaults.log_level
			}
		};

		let aliases = cfg.get::<Vec<AliasDecl>>("aliases")
			.context("Invalid alias declarations")?
			.unwrap_or_default();

		Ok(Settings {
			tick_rate,
			router,
			log_level,
			aliases,
		})
	}

	/// Falls back to the default rate if `tick_rate` doesn't describe a representable duration.
	pub fn tick_duration(&self) -> Duration {
		Duration::try_from_secs_f64(1.0 / self.tick_rate)
			.unwrap_or_else(|_| {
				let default_rate = Settings::default().tick_rate;
				log::warn!("Invalid tick rate {}, using {default_rate}", self.tick_rate);
				Duration::from_secs_f64(1.0 / default_rate)
			})
	}
}
