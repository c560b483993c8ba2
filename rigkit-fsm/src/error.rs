use crate::{ArcId, StateId};


/// Structural errors from building or editing an [`Fsm`](crate::Fsm). The offending call leaves the FSM unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FsmError {
	#[error("state names can't be empty")]
	EmptyStateName,

	#[error("state '{0}' already exists")]
	DuplicateState(String),

	#[error("no state named '{0}'")]
	UnknownState(String),

	#[error("no state with id {0:?}")]
	UnknownStateId(StateId),

	#[error("can't remove the start state '{0}'")]
	RemoveStartState(String),

	#[error("can't remove the current state '{0}'")]
	RemoveCurrentState(String),

	#[error("no arc with id {0:?}")]
	UnknownArc(ArcId),
}
