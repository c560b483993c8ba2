use std::cell::Cell;
use std::rc::Rc;


pub type SharedCondition = Rc<Condition>;


/// Named flag that can additionally guard an FSM arc. The arc is only traversed while the condition holds.
///
/// For arbitration between competing FSMs prefer a [`Token`](crate::Token).
#[derive(Debug)]
pub struct Condition {
	name: String,
	value: Cell<bool>,
}

impl Condition {
	pub fn new(name: impl Into<String>, value: bool) -> Condition {
		Condition {
			name: name.into(),
			value: Cell::new(value),
		}
	}

	pub fn shared(name: impl Into<String>, value: bool) -> SharedCondition {
		Rc::new(Condition::new(name, value))
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn is_true(&self) -> bool {
		self.value.get()
	}

	pub fn set(&self, value: bool) {
		self.value.set(value);
	}
}
