use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};


/// Identity of something that can own a [`Token`]. Every [`Fsm`](crate::Fsm) has one.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct OwnerId(usize);

impl OwnerId {
	/// Allocate a new process-unique owner identity.
	pub fn new() -> OwnerId {
		static NEXT_OWNER_ID: AtomicUsize = AtomicUsize::new(1);
		OwnerId(NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed))
	}
}

impl Default for OwnerId {
	fn default() -> OwnerId {
		OwnerId::new()
	}
}


pub type SharedToken = Rc<Token>;

type AvailabilityObserver = Box<dyn FnMut(bool)>;


/// Binary lock for arbitrating exclusive access to an interaction resource, typically input focus.
///
/// Requests never block. A request succeeds if the token is free or already held by the requester,
/// so re-acquiring is idempotent.
pub struct Token {
	name: String,
	owner: Cell<Option<OwnerId>>,
	observers: RefCell<Vec<AvailabilityObserver>>,

	notifying: Cell<bool>,
	changed_while_notifying: Cell<bool>,
}

impl Token {
	pub fn new(name: impl Into<String>) -> Token {
		Token {
			name: name.into(),
			owner: Cell::new(None),
			observers: RefCell::new(Vec::new()),

			notifying: Cell::new(false),
			changed_while_notifying: Cell::new(false),
		}
	}

	pub fn shared(name: impl Into<String>) -> SharedToken {
		Rc::new(Token::new(name))
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn request(&self, requester: OwnerId) -> bool {
		match self.owner.get() {
			None => {
				self.owner.set(Some(requester));
				self.notify_availability();
				true
			}

			Some(owner) => owner == requester,
		}
	}

	/// Only the current owner can release a token. Anyone else gets a warning and `false`.
	pub fn release(&self, owner: OwnerId) -> bool {
		if self.owner.get() != Some(owner) {
			log::warn!("{owner:?} is trying to release token '{}' which it doesn't own", self.name);
			return false
		}

		self.owner.set(None);
		self.notify_availability();
		true
	}

	pub fn owner(&self) -> Option<OwnerId> {
		self.owner.get()
	}

	pub fn is_available(&self) -> bool {
		self.owner.get().is_none()
	}

	pub fn is_owned_by(&self, owner: OwnerId) -> bool {
		self.owner.get() == Some(owner)
	}

	/// Register a callback invoked with the new availability whenever the token is acquired or released.
	///
	/// Observers may request or release the token themselves. Changes made while observers are being notified
	/// are delivered in another round once the current one finishes, so the last value every observer sees is
	/// the final availability. Observers registered during a notification join from the next round.
	pub fn add_availability_listener(&self, observer: impl FnMut(bool) + 'static) {
		self.observers.borrow_mut().push(Box::new(observer));
	}

	fn notify_availability(&self) {
		if self.notifying.replace(true) {
			self.changed_while_notifying.set(true);
			return
		}

		let mut observers = self.observers.take();
		let mut is_available = self.is_available();

		loop {
			for observer in observers.iter_mut() {
				observer(is_available);
			}

			observers.append(&mut self.observers.borrow_mut());

			// Changes that cancelled out within the round don't need another one
			if !self.changed_while_notifying.replace(false) || self.is_available() == is_available {
				break
			}

			is_available = self.is_available();
		}

		*self.observers.borrow_mut() = observers;
		self.notifying.set(false);
	}
}

impl fmt::Debug for Token {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Token")
			.field("name", &self.name)
			.field("owner", &self.owner.get())
			.finish_non_exhaustive()
	}
}
