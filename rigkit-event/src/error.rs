use crate::{PayloadType, TypeMatch};


#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
	#[error("event names must not be empty")]
	EmptyName,

	#[error("event '{name}' carries {found} data but {expected} was requested")]
	PayloadMismatch {
		name: String,
		expected: PayloadType,
		found: PayloadType,
	},

	#[error("unknown payload type '{0}'")]
	UnknownPayloadType(String),
}


/// Why an event failed to match a prototype.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
	#[error("expected an event named '{expected}'")]
	Name {
		expected: String,
	},

	/// Same name, incompatible payload. Usually means a listener or arc was configured with the wrong type.
	#[error("event '{name}' carries {found} data, prototype expects {expected}")]
	Type {
		name: String,
		expected: TypeMatch,
		found: PayloadType,
	},
}
