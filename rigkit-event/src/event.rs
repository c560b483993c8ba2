use std::fmt;

use crate::{EventError, EventPrototype, Payload, PayloadData, PayloadType};


/// A named, optionally typed message describing something that happened.
/// Names are hierarchical by convention, e.g. `"Hand/Right/Button1/Down"`, but are only ever compared whole.
///
/// Events are immutable once constructed. Use [`Event::renamed`] to derive an aliased copy.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
	name: String,
	payload: Payload,
}

impl Event {
	/// Create an event without payload data.
	pub fn new(name: impl Into<String>) -> Result<Event, EventError> {
		Event::with_payload(name, Payload::None)
	}

	pub fn with_data<T: PayloadData>(name: impl Into<String>, data: T) -> Result<Event, EventError> {
		Event::with_payload(name, data.into_payload())
	}

	pub fn with_payload(name: impl Into<String>, payload: impl Into<Payload>) -> Result<Event, EventError> {
		let name = name.into();
		if name.is_empty() {
			return Err(EventError::EmptyName)
		}

		Ok(Event {
			name,
			payload: payload.into(),
		})
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn payload(&self) -> &Payload {
		&self.payload
	}

	pub fn payload_type(&self) -> PayloadType {
		self.payload.payload_type()
	}

	/// Read the payload as `T`. Asking for the wrong type is an error, values are never coerced.
	pub fn data<T: PayloadData>(&self) -> Result<T, EventError> {
		T::from_payload(&self.payload)
			.ok_or_else(|| EventError::PayloadMismatch {
				name: self.name.clone(),
				expected: T::TYPE,
				found: self.payload_type(),
			})
	}

	/// A copy of this event with the same payload and a different name. `self` is left untouched.
	pub fn renamed(&self, name: impl Into<String>) -> Result<Event, EventError> {
		Event::with_payload(name, self.payload.clone())
	}

	pub fn matches(&self, prototype: &EventPrototype) -> bool {
		prototype.matches(self)
	}

	/// Whether this event can be replicated to other cluster nodes as-is.
	/// Events carrying object references must instead be regenerated locally on each node.
	pub fn is_cluster_safe(&self) -> bool {
		self.payload_type().is_cluster_safe()
	}

	pub fn into_parts(self) -> (String, Payload) {
		(self.name, self.payload)
	}
}

impl fmt::Display for Event {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.payload {
			Payload::None => write!(f, "{}", self.name),
			payload => write!(f, "{} ({payload:?})", self.name),
		}
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::{ObjectRef, Vec2};

	#[test]
	fn empty_names_are_rejected() {
		assert_eq!(Event::new(""), Err(EventError::EmptyName));
		assert_eq!(Event::with_data("", 1.0f32), Err(EventError::EmptyName));

		let event = Event::new("Head/Position").unwrap();
		assert_eq!(event.renamed(""), Err(EventError::EmptyName));
	}

	#[test]
	fn wrong_payload_type_is_an_error() {
		let event = Event::with_data("Trigger/Value", 0.75f32).unwrap();
		assert_eq!(event.data::<f32>(), Ok(0.75));

		let err = event.data::<i32>().unwrap_err();
		assert_eq!(err, EventError::PayloadMismatch {
			name: "Trigger/Value".into(),
			expected: PayloadType::Int,
			found: PayloadType::Float,
		});

		let event = Event::new("Button/Down").unwrap();
		assert!(event.data::<bool>().is_err());
	}

	#[test]
	fn renaming_leaves_original_intact() {
		let original = Event::with_data("Mouse/Position", Vec2 { x: 0.5, y: -0.5 }).unwrap();
		let alias = original.renamed("Pointer/Position").unwrap();

		assert_eq!(original.name(), "Mouse/Position");
		assert_eq!(alias.name(), "Pointer/Position");
		assert_eq!(alias.payload(), original.payload());
	}

	#[test]
	fn object_payloads_are_not_cluster_safe() {
		let event = Event::with_data("Selection/Changed", ObjectRef::new(42u32)).unwrap();
		assert!(!event.is_cluster_safe());
		assert_eq!(event.data::<ObjectRef>().unwrap().downcast_ref::<u32>(), Some(&42));

		assert!(Event::with_data("Name", String::from("x")).unwrap().is_cluster_safe());
	}
}
