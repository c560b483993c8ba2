use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::instrument;

use rigkit_bus::{isolate, Listener, ListenerId, Router};
use rigkit_event::{Event, EventPrototype};

use crate::{FsmError, OwnerId, SharedCondition, SharedToken};


#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct StateId(usize);

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArcId(usize);


type StateCallback = Box<dyn FnMut(&Router) -> anyhow::Result<()>>;
type TriggerCallback = Box<dyn FnMut(&Event, &Router) -> anyhow::Result<()>>;
type StateChangeObserver = Box<dyn FnMut(StateId, StateId)>;


struct State {
	id: StateId,
	name: String,

	on_enter: Vec<StateCallback>,
	on_update: Vec<StateCallback>,
	on_exit: Vec<StateCallback>,
}

struct StateArc {
	id: ArcId,
	from: StateId,
	to: StateId,
	trigger: EventPrototype,

	require_token: Option<SharedToken>,
	release_token: Option<SharedToken>,
	guard: Option<SharedCondition>,

	on_trigger: Vec<TriggerCallback>,
}

#[derive(Copy, Clone)]
enum Stage {
	Enter,
	Update,
	Exit,
}

impl Stage {
	fn label(self) -> &'static str {
		match self {
			Stage::Enter => "enter",
			Stage::Update => "update",
			Stage::Exit => "exit",
		}
	}
}


/// Anything that identifies a state of an [`Fsm`]: its [`StateId`] or its name.
pub trait StateKey {
	fn resolve(&self, fsm: &Fsm) -> Result<StateId, FsmError>;
}

impl StateKey for StateId {
	fn resolve(&self, fsm: &Fsm) -> Result<StateId, FsmError> {
		match fsm.state(*self) {
			Some(_) => Ok(*self),
			None => Err(FsmError::UnknownStateId(*self)),
		}
	}
}

impl StateKey for &str {
	fn resolve(&self, fsm: &Fsm) -> Result<StateId, FsmError> {
		fsm.state_id(self)
			.ok_or_else(|| FsmError::UnknownState((*self).to_owned()))
	}
}

impl StateKey for &String {
	fn resolve(&self, fsm: &Fsm) -> Result<StateId, FsmError> {
		self.as_str().resolve(fsm)
	}
}


/// A graph of named states connected by arcs that are triggered by events.
///
/// Arcs can additionally be guarded by a [`Token`](crate::Token), which is requested on behalf of the FSM when
/// the arc is triggered, and by a [`Condition`](crate::Condition). This is how competing interaction techniques
/// avoid consuming the same input at the same time.
///
/// An `Fsm` is a [`Listener`]: share it as an `Rc<RefCell<Fsm>>` and register it with [`Fsm::start_listening`].
pub struct Fsm {
	name: String,
	owner: OwnerId,

	states: Vec<State>,
	arcs: Vec<StateArc>,

	start: StateId,
	current: StateId,
	enabled: bool,

	id_counter: usize,
	state_change_observers: Vec<StateChangeObserver>,
}

impl Fsm {
	/// Create an FSM containing only its start state, which is also the current state.
	pub fn new(name: impl Into<String>, start_state_name: impl Into<String>) -> Fsm {
		let start = StateId(0);

		Fsm {
			name: name.into(),
			owner: OwnerId::new(),

			states: vec![State::new(start, start_state_name.into())],
			arcs: Vec::new(),

			start,
			current: start,
			enabled: true,

			id_counter: 1,
			state_change_observers: Vec::new(),
		}
	}

	/// Register `fsm` with `router` so that it receives every event.
	pub fn start_listening(fsm: &Rc<RefCell<Fsm>>, router: &Router, priority: i32) -> ListenerId {
		router.add_listener(fsm, priority)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// The identity this FSM requests and releases tokens with.
	pub fn owner(&self) -> OwnerId {
		self.owner
	}

	fn next_id(&mut self) -> usize {
		let id = self.id_counter;
		self.id_counter += 1;
		id
	}
}


/// States.
impl Fsm {
	pub fn add_state(&mut self, name: impl Into<String>) -> Result<StateBuilder<'_>, FsmError> {
		let name = name.into();

		if name.is_empty() {
			return Err(FsmError::EmptyStateName)
		}

		if self.state_id(&name).is_some() {
			return Err(FsmError::DuplicateState(name))
		}

		let id = StateId(self.next_id());
		self.states.push(State::new(id, name));

		let state = self.states.last_mut().ok_or(FsmError::UnknownStateId(id))?;
		Ok(StateBuilder { state })
	}

	/// Attach more callbacks to an existing state.
	pub fn edit_state(&mut self, state: impl StateKey) -> Result<StateBuilder<'_>, FsmError> {
		let id = state.resolve(self)?;
		let state = self.state_mut(id).ok_or(FsmError::UnknownStateId(id))?;
		Ok(StateBuilder { state })
	}

	/// Remove a state along with every arc leading to or from it.
	/// The start state and the current state can't be removed.
	pub fn remove_state(&mut self, state: impl StateKey) -> Result<(), FsmError> {
		let id = state.resolve(self)?;

		if id == self.start {
			return Err(FsmError::RemoveStartState(self.state_name(id).unwrap_or_default().to_owned()))
		}

		if id == self.current {
			return Err(FsmError::RemoveCurrentState(self.state_name(id).unwrap_or_default().to_owned()))
		}

		self.states.retain(|state| state.id != id);

		let arc_count = self.arcs.len();
		self.arcs.retain(|arc| arc.from != id && arc.to != id);

		let removed_arcs = arc_count - self.arcs.len();
		if removed_arcs > 0 {
			log::debug!("{}: removed {removed_arcs} arcs along with state {id:?}", self.name);
		}

		Ok(())
	}

	pub fn state_id(&self, name: &str) -> Option<StateId> {
		self.states.iter()
			.find(|state| state.name == name)
			.map(|state| state.id)
	}

	pub fn state_name(&self, id: StateId) -> Option<&str> {
		self.state(id).map(|state| state.name.as_str())
	}

	pub fn has_state(&self, name: &str) -> bool {
		self.state_id(name).is_some()
	}

	/// State names in the order they were added.
	pub fn state_names(&self) -> Vec<&str> {
		self.states.iter()
			.map(|state| state.name.as_str())
			.collect()
	}

	pub fn state_count(&self) -> usize {
		self.states.len()
	}

	pub fn current_state(&self) -> StateId {
		self.current
	}

	pub fn current_state_name(&self) -> &str {
		self.state_name(self.current).unwrap_or_default()
	}

	pub fn start_state(&self) -> StateId {
		self.start
	}

	pub fn set_start_state(&mut self, state: impl StateKey) -> Result<(), FsmError> {
		self.start = state.resolve(self)?;
		Ok(())
	}

	/// Jump straight back to the start state without running any callbacks.
	pub fn reset(&mut self) {
		self.current = self.start;
	}

	fn state(&self, id: StateId) -> Option<&State> {
		self.states.iter().find(|state| state.id == id)
	}

	fn state_mut(&mut self, id: StateId) -> Option<&mut State> {
		self.states.iter_mut().find(|state| state.id == id)
	}
}


/// Arcs.
impl Fsm {
	/// Add an arc from `from` to `to`, triggered by events matching `trigger`.
	/// An arc that leads back to its own state is an in-state action and never runs exit or enter callbacks.
	pub fn add_arc(&mut self, from: impl StateKey, to: impl StateKey, trigger: EventPrototype) -> Result<ArcBuilder<'_>, FsmError> {
		let from = from.resolve(self)?;
		let to = to.resolve(self)?;

		let id = ArcId(self.next_id());
		self.arcs.push(StateArc {
			id,
			from,
			to,
			trigger,

			require_token: None,
			release_token: None,
			guard: None,

			on_trigger: Vec::new(),
		});

		let arc = self.arcs.last_mut().ok_or(FsmError::UnknownArc(id))?;
		Ok(ArcBuilder { arc })
	}

	pub fn edit_arc(&mut self, id: ArcId) -> Result<ArcBuilder<'_>, FsmError> {
		let arc = self.arcs.iter_mut()
			.find(|arc| arc.id == id)
			.ok_or(FsmError::UnknownArc(id))?;

		Ok(ArcBuilder { arc })
	}

	pub fn remove_arc(&mut self, id: ArcId) -> Result<(), FsmError> {
		let position = self.arcs.iter()
			.position(|arc| arc.id == id)
			.ok_or(FsmError::UnknownArc(id))?;

		self.arcs.remove(position);
		Ok(())
	}

	pub fn arc_count(&self) -> usize {
		self.arcs.len()
	}

	/// Arcs in the order they were added, which is also the order they are tested in.
	pub fn arc_ids(&self) -> impl Iterator<Item = ArcId> + '_ {
		self.arcs.iter().map(|arc| arc.id)
	}

	/// Human readable `from-->to` form of an arc.
	pub fn describe_arc(&self, id: ArcId) -> Option<String> {
		let arc = self.arcs.iter().find(|arc| arc.id == id)?;
		Some(self.arc_to_string(arc))
	}

	fn arc_to_string(&self, arc: &StateArc) -> String {
		let from = self.state_name(arc.from).unwrap_or("?");
		let to = self.state_name(arc.to).unwrap_or("?");
		format!("{from}-->{to} on {}", arc.trigger)
	}
}


/// Running.
impl Fsm {
	/// A disabled FSM ignores events and updates, but keeps its current state.
	pub fn set_enabled(&mut self, enabled: bool) {
		self.enabled = enabled;
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	/// Called with `(from, to)` after every change of state, once the new state has been entered.
	pub fn add_state_change_listener(&mut self, observer: impl FnMut(StateId, StateId) + 'static) {
		self.state_change_observers.push(Box::new(observer));
	}

	/// Run the update callbacks of the current state. Intended to be called once per tick.
	#[instrument(skip_all, name="Fsm::update")]
	pub fn update(&mut self, router: &Router) {
		if self.enabled {
			self.run_state_callbacks(self.current, Stage::Update, router);
		}
	}

	/// Test every arc leaving the current state against `event`, traversing those that match and whose guards pass.
	///
	/// Every matching arc is considered, in the order arcs were added. Each test uses the live current state,
	/// so traversing one arc may make a later arc eligible for the same event.
	pub fn handle_event(&mut self, event: &Event, router: &Router) {
		if !self.enabled {
			return
		}

		// Arcs can't be added or removed from within callbacks, so indices stay valid for the whole loop.
		for index in 0..self.arcs.len() {
			let arc = &self.arcs[index];

			if arc.from != self.current || !arc.trigger.matches(event) {
				continue
			}

			log::debug!("{}: in state '{}' received '{}', which matches arc {}",
				self.name, self.current_state_name(), event.name(), self.arc_to_string(arc));

			if let Some(guard) = &arc.guard && !guard.is_true() {
				log::debug!("{}: guard condition '{}' not met", self.name, guard.name());
				continue
			}

			if let Some(token) = &arc.require_token && !token.request(self.owner) {
				log::debug!("{}: required token '{}' could not be acquired", self.name, token.name());
				continue
			}

			if let Some(token) = &arc.release_token {
				log::debug!("{}: releasing token '{}'", self.name, token.name());
				token.release(self.owner);
			}

			let (from, to) = (arc.from, arc.to);

			if from == to {
				self.run_trigger_callbacks(index, event, router);
				continue
			}

			self.run_state_callbacks(from, Stage::Exit, router);
			self.run_trigger_callbacks(index, event, router);

			self.current = to;
			log::debug!("{}: entering state '{}'", self.name, self.current_state_name());

			self.run_state_callbacks(to, Stage::Enter, router);

			for observer in self.state_change_observers.iter_mut() {
				let result = isolate(|| {
					observer(from, to);
					Ok(())
				});

				if let Err(failure) = result {
					log::error!("{}: state change observer failed: {failure}", self.name);
				}
			}
		}
	}

	fn run_trigger_callbacks(&mut self, index: usize, event: &Event, router: &Router) {
		let Some(arc) = self.arcs.get_mut(index) else {
			return
		};

		for callback in arc.on_trigger.iter_mut() {
			if let Err(failure) = isolate(|| callback(event, router)) {
				log::error!("{}: trigger callback failed on event '{}': {failure}", self.name, event.name());
			}
		}
	}

	fn run_state_callbacks(&mut self, id: StateId, stage: Stage, router: &Router) {
		let Some(state) = self.states.iter_mut().find(|state| state.id == id) else {
			return
		};

		let callbacks = match stage {
			Stage::Enter => &mut state.on_enter,
			Stage::Update => &mut state.on_update,
			Stage::Exit => &mut state.on_exit,
		};

		for callback in callbacks.iter_mut() {
			if let Err(failure) = isolate(|| callback(router)) {
				log::error!("{}: {} callback of state '{}' failed: {failure}", self.name, stage.label(), state.name);
			}
		}
	}
}

impl Listener for Fsm {
	fn on_event(&mut self, event: &Event, router: &Router) -> anyhow::Result<()> {
		self.handle_event(event, router);
		Ok(())
	}

	fn name(&self) -> &str {
		&self.name
	}
}

impl fmt::Debug for Fsm {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Fsm")
			.field("name", &self.name)
			.field("states", &self.state_names())
			.field("arcs", &self.arcs.len())
			.field("current", &self.current_state_name())
			.field("enabled", &self.enabled)
			.finish()
	}
}


impl State {
	fn new(id: StateId, name: String) -> State {
		State {
			id,
			name,
			on_enter: Vec::new(),
			on_update: Vec::new(),
			on_exit: Vec::new(),
		}
	}
}



/// Returned by [`Fsm::add_state`] to attach callbacks to the new state.
/// Callbacks of the same kind run in the order they were added.
pub struct StateBuilder<'f> {
	state: &'f mut State,
}

impl StateBuilder<'_> {
	pub fn id(&self) -> StateId {
		self.state.id
	}

	pub fn on_enter(self, callback: impl FnMut(&Router) -> anyhow::Result<()> + 'static) -> Self {
		self.state.on_enter.push(Box::new(callback));
		self
	}

	pub fn on_update(self, callback: impl FnMut(&Router) -> anyhow::Result<()> + 'static) -> Self {
		self.state.on_update.push(Box::new(callback));
		self
	}

	pub fn on_exit(self, callback: impl FnMut(&Router) -> anyhow::Result<()> + 'static) -> Self {
		self.state.on_exit.push(Box::new(callback));
		self
	}
}


/// Returned by [`Fsm::add_arc`] to attach guards and callbacks to the new arc.
pub struct ArcBuilder<'f> {
	arc: &'f mut StateArc,
}

impl ArcBuilder<'_> {
	pub fn id(&self) -> ArcId {
		self.arc.id
	}

	/// Only traverse the arc if `token` can be acquired. The FSM keeps it until an arc releases it.
	pub fn requires_token(self, token: &SharedToken) -> Self {
		self.arc.require_token = Some(token.clone());
		self
	}

	/// Release `token` whenever the arc is traversed.
	pub fn releases_token(self, token: &SharedToken) -> Self {
		self.arc.release_token = Some(token.clone());
		self
	}

	/// Only traverse the arc while `condition` is true. Checked before any token is requested.
	pub fn guarded_by(self, condition: &SharedCondition) -> Self {
		self.arc.guard = Some(condition.clone());
		self
	}

	pub fn on_trigger(self, callback: impl FnMut(&Event, &Router) -> anyhow::Result<()> + 'static) -> Self {
		self.arc.on_trigger.push(Box::new(callback));
		self
	}
}
