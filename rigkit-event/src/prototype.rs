use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Event, EventError, MatchError, PayloadData, PayloadType};


/// Which payload types a prototype accepts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeMatch {
	#[default]
	Any,
	Exactly(PayloadType),
}

impl TypeMatch {
	pub fn accepts(&self, ty: PayloadType) -> bool {
		match self {
			TypeMatch::Any => true,
			TypeMatch::Exactly(expected) => *expected == ty,
		}
	}
}

impl fmt::Display for TypeMatch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TypeMatch::Any => f.write_str("any"),
			TypeMatch::Exactly(ty) => ty.fmt(f),
		}
	}
}

impl From<PayloadType> for TypeMatch {
	fn from(ty: PayloadType) -> TypeMatch {
		TypeMatch::Exactly(ty)
	}
}

impl TryFrom<String> for TypeMatch {
	type Error = EventError;

	fn try_from(value: String) -> Result<TypeMatch, EventError> {
		if value.eq_ignore_ascii_case("any") || value == "*" {
			Ok(TypeMatch::Any)
		} else {
			value.parse().map(TypeMatch::Exactly)
		}
	}
}

impl From<TypeMatch> for String {
	fn from(value: TypeMatch) -> String {
		value.to_string()
	}
}



/// The declared shape of an event: a name and the payload type(s) it may carry.
///
/// Producers list prototypes to advertise what they might emit, and listeners and FSM arcs use them as
/// match patterns. Matching is always name-exact - there is no wildcarding within hierarchical names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventPrototype {
	name: String,

	#[serde(default)]
	data_type: TypeMatch,
}

impl EventPrototype {
	pub fn new(name: impl Into<String>, data_type: impl Into<TypeMatch>) -> EventPrototype {
		EventPrototype {
			name: name.into(),
			data_type: data_type.into(),
		}
	}

	/// Matches any event with this name regardless of payload.
	pub fn any(name: impl Into<String>) -> EventPrototype {
		EventPrototype::new(name, TypeMatch::Any)
	}

	pub fn of(name: impl Into<String>, ty: PayloadType) -> EventPrototype {
		EventPrototype::new(name, TypeMatch::Exactly(ty))
	}

	pub fn typed<T: PayloadData>(name: impl Into<String>) -> EventPrototype {
		EventPrototype::of(name, T::TYPE)
	}

	/// Matches only payload-less events with this name.
	pub fn no_data(name: impl Into<String>) -> EventPrototype {
		EventPrototype::of(name, PayloadType::None)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn data_type(&self) -> TypeMatch {
		self.data_type
	}

	pub fn with_name(&self, name: impl Into<String>) -> EventPrototype {
		EventPrototype::new(name, self.data_type)
	}

	pub fn check(&self, event: &Event) -> Result<(), MatchError> {
		if event.name() != self.name {
			return Err(MatchError::Name { expected: self.name.clone() })
		}

		if !self.data_type.accepts(event.payload_type()) {
			return Err(MatchError::Type {
				name: self.name.clone(),
				expected: self.data_type,
				found: event.payload_type(),
			})
		}

		Ok(())
	}

	pub fn matches(&self, event: &Event) -> bool {
		self.check(event).is_ok()
	}
}

impl fmt::Display for EventPrototype {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} <{}>", self.name, self.data_type)
	}
}
