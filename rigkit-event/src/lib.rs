//! Events are the only currency between input devices, interaction techniques and everything in between.
//! An [`Event`] is a hierarchical name plus an optional typed [`Payload`], and an [`EventPrototype`] describes
//! the shape of an event without needing a live one, both for documenting what a producer emits and as
//! a match pattern for listeners.

pub mod error;
pub mod event;
pub mod payload;
pub mod prototype;

pub use error::{EventError, MatchError};
pub use event::Event;
pub use payload::{Payload, PayloadType, PayloadData, ObjectRef, Vec2, Vec3, Vec4, Quat};
pub use prototype::{EventPrototype, TypeMatch};

pub mod prelude {
	pub use crate::{Event, EventPrototype, Payload, PayloadType, PayloadData, TypeMatch};
}
