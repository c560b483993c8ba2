pub use rigkit_event as event;
pub use rigkit_bus as bus;
pub use rigkit_fsm as fsm;
pub use rigkit_input as input;
pub use rigkit_cfg as cfg;

pub use event::prelude::*;
pub use bus::prelude::*;
pub use fsm::prelude::*;
pub use input::prelude::*;
pub use cfg::prelude::*;

pub use crate::{App, Context};

pub use anyhow;
pub use log;

pub use tracing;
#[doc(hidden)]
pub use tracing::instrument;

pub use std::rc::Rc;
pub use std::cell::RefCell;
