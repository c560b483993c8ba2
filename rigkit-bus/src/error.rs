use rigkit_event::{EventError, TypeMatch};


#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
	#[error("two producers declare event '{name}' with different payload types: {first} and {second}")]
	ConflictingPrototypes {
		name: String,
		first: TypeMatch,
		second: TypeMatch,
	},

	#[error("alias has no source events to rename to '{0}'")]
	EmptyAlias(String),

	#[error(transparent)]
	Event(#[from] EventError),
}
