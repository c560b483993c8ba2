//! The event bus: a single queue of named [`Event`]s flowing from producers, through ordered filters, to
//! ordered listeners, processed once per tick by a [`Router`].
//!
//! [`Event`]: rigkit_event::Event

pub mod alias;
pub mod error;
pub mod registry;
pub mod router;
pub mod traits;

pub use alias::{AliasDecl, AliasHandle, AliasStrategy, EventAlias};
pub use error::BusError;
pub use registry::{ListenerId, FilterId, ProducerId, DeviceId};
pub use router::*;
pub use traits::*;

pub mod prelude {
	pub use crate::{Router, Listener, Filter, Filtered, Producer, PolledDevice};
	pub use crate::{DEFAULT_LISTENER_PRIORITY, CONVERTER_LISTENER_PRIORITY};
}
