/// Static definition of a state chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartDef {
	/// Unique identifier, used in logs.
	pub id: &'static str,
	/// State a fresh runner starts in.
	pub initial: &'static str,
	/// Every state of the chart with its own transitions.
	pub states: &'static [StateDef],
	/// Transitions consulted after the current state's own.
	pub on: &'static [TransitionDef],
}

/// One state and the events it handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateDef {
	pub name: &'static str,
	pub on: &'static [TransitionDef],
}

impl StateDef {
	pub const fn new(name: &'static str, on: &'static [TransitionDef]) -> Self {
		Self { name, on }
	}

	/// A state without outgoing transitions of its own.
	pub const fn leaf(name: &'static str) -> Self {
		Self { name, on: &[] }
	}
}

/// Candidates for one event, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionDef {
	pub event: &'static str,
	pub candidates: &'static [CandidateDef],
}

impl TransitionDef {
	pub const fn new(event: &'static str, candidates: &'static [CandidateDef]) -> Self {
		Self { event, candidates }
	}
}

/// A possible target for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateDef {
	pub target: &'static str,
	/// Named predicate that must hold for this candidate to be taken.
	pub guard: Option<&'static str>,
	/// Named actions run when this candidate is taken.
	pub actions: &'static [&'static str],
}

impl CandidateDef {
	pub const fn to(target: &'static str) -> Self {
		Self {
			target,
			guard: None,
			actions: &[],
		}
	}

	pub const fn when(self, guard: &'static str) -> Self {
		Self { guard: Some(guard), ..self }
	}

	pub const fn then(self, actions: &'static [&'static str]) -> Self {
		Self { actions, ..self }
	}
}
