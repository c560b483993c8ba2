use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};


/// Install the terminal logger and route panics through it.
///
/// The logger itself accepts everything, the level is controlled with [`set_level`] so that it can
/// be changed once config has been loaded. Safe to call more than once.
pub fn init() {
	let config = ConfigBuilder::new()
		.set_time_level(LevelFilter::Off)
		.set_thread_level(LevelFilter::Off)
		.build();

	if TermLogger::init(LevelFilter::Trace, config, TerminalMode::Mixed, ColorChoice::Auto).is_err() {
		log::debug!("Logger already installed");
	}

	log_panics::init();
	set_level(LevelFilter::Info);
}

pub fn set_level(level: LevelFilter) {
	log::set_max_level(level);
}
