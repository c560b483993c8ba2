//! Finite state machines driven by router events, with arcs that can be guarded by shared [`Token`]s
//! to arbitrate input focus between competing interaction techniques.

pub mod condition;
pub mod error;
pub mod fsm;
pub mod token;

pub use condition::{Condition, SharedCondition};
pub use error::FsmError;
pub use fsm::{Fsm, StateId, ArcId, StateKey, StateBuilder, ArcBuilder};
pub use token::{OwnerId, Token, SharedToken};

pub mod prelude {
	pub use crate::{Fsm, Token, SharedToken, Condition, SharedCondition};
}
