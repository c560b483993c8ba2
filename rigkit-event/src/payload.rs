use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::EventError;


pub type Vec2 = mint::Vector2<f32>;
pub type Vec3 = mint::Vector3<f32>;
pub type Vec4 = mint::Vector4<f32>;
pub type Quat = mint::Quaternion<f32>;


/// The closed set of data types an [`Event`](crate::Event) can carry.
/// Adding a new payload type means extending this enum, [`Payload`] and the [`PayloadData`] impls below.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PayloadType {
	None,
	Bool,
	Int,
	Float,
	Vec2,
	Vec3,
	Vec4,
	Quat,
	String,
	Object,
}

impl PayloadType {
	pub const ALL: [PayloadType; 10] = [
		PayloadType::None,
		PayloadType::Bool,
		PayloadType::Int,
		PayloadType::Float,
		PayloadType::Vec2,
		PayloadType::Vec3,
		PayloadType::Vec4,
		PayloadType::Quat,
		PayloadType::String,
		PayloadType::Object,
	];

	/// Stable name used in config files and log output.
	pub fn name(&self) -> &'static str {
		match self {
			PayloadType::None => "none",
			PayloadType::Bool => "bool",
			PayloadType::Int => "int",
			PayloadType::Float => "float",
			PayloadType::Vec2 => "vec2",
			PayloadType::Vec3 => "vec3",
			PayloadType::Vec4 => "vec4",
			PayloadType::Quat => "quat",
			PayloadType::String => "string",
			PayloadType::Object => "object",
		}
	}

	/// Object payloads refer to process-local values and can't be sent to other cluster nodes.
	pub fn is_cluster_safe(&self) -> bool {
		*self != PayloadType::Object
	}
}

impl fmt::Display for PayloadType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for PayloadType {
	type Err = EventError;

	fn from_str(s: &str) -> Result<PayloadType, EventError> {
		PayloadType::ALL.iter()
			.copied()
			.find(|ty| ty.name().eq_ignore_ascii_case(s))
			.ok_or_else(|| EventError::UnknownPayloadType(s.to_owned()))
	}
}



/// Opaque reference to an application object, e.g. the scene node a selection technique picked.
/// Compared by identity, never by value.
#[derive(Clone)]
pub struct ObjectRef(Rc<dyn Any>);

impl ObjectRef {
	pub fn new<T: Any>(value: T) -> ObjectRef {
		ObjectRef(Rc::new(value))
	}

	pub fn from_rc(value: Rc<dyn Any>) -> ObjectRef {
		ObjectRef(value)
	}

	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.0.downcast_ref()
	}

	pub fn is<T: Any>(&self) -> bool {
		self.0.is::<T>()
	}

	pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
		std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
	}
}

impl PartialEq for ObjectRef {
	fn eq(&self, other: &ObjectRef) -> bool {
		self.ptr_eq(other)
	}
}

impl fmt::Debug for ObjectRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ObjectRef({:p})", Rc::as_ptr(&self.0))
	}
}



#[derive(Clone, Debug, PartialEq, Default)]
pub enum Payload {
	#[default]
	None,
	Bool(bool),
	Int(i32),
	Float(f32),
	Vec2(Vec2),
	Vec3(Vec3),
	Vec4(Vec4),
	Quat(Quat),
	String(String),
	Object(ObjectRef),
}

impl Payload {
	pub fn payload_type(&self) -> PayloadType {
		match self {
			Payload::None => PayloadType::None,
			Payload::Bool(_) => PayloadType::Bool,
			Payload::Int(_) => PayloadType::Int,
			Payload::Float(_) => PayloadType::Float,
			Payload::Vec2(_) => PayloadType::Vec2,
			Payload::Vec3(_) => PayloadType::Vec3,
			Payload::Vec4(_) => PayloadType::Vec4,
			Payload::Quat(_) => PayloadType::Quat,
			Payload::String(_) => PayloadType::String,
			Payload::Object(_) => PayloadType::Object,
		}
	}

	pub fn is_none(&self) -> bool {
		matches!(self, Payload::None)
	}
}



/// Rust types that can be carried by an event payload.
pub trait PayloadData: Sized {
	const TYPE: PayloadType;

	fn from_payload(payload: &Payload) -> Option<Self>;
	fn into_payload(self) -> Payload;
}

macro_rules! impl_payload_data {
	($($ty:ty => $variant:ident),* $(,)?) => {
		$(
			impl PayloadData for $ty {
				const TYPE: PayloadType = PayloadType::$variant;

				fn from_payload(payload: &Payload) -> Option<Self> {
					match payload {
						Payload::$variant(value) => Some(value.clone()),
						_ => None,
					}
				}

				fn into_payload(self) -> Payload {
					Payload::$variant(self)
				}
			}

			impl From<$ty> for Payload {
				fn from(value: $ty) -> Payload {
					Payload::$variant(value)
				}
			}
		)*
	};
}

impl_payload_data! {
	bool => Bool,
	i32 => Int,
	f32 => Float,
	Vec2 => Vec2,
	Vec3 => Vec3,
	Vec4 => Vec4,
	Quat => Quat,
	String => String,
	ObjectRef => Object,
}

impl From<&str> for Payload {
	fn from(value: &str) -> Payload {
		Payload::String(value.to_owned())
	}
}
