//! Stateful interpreter for one chart and one widget.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::chart::Chart;
use crate::error::{ChartError, Result};

type Guard<P> = Box<dyn Fn(&P) -> bool + Send + Sync>;
type Action<P> = Box<dyn Fn(&P) + Send + Sync>;
type Observer = Box<dyn FnMut(&Transition<'_>) + Send>;

/// A state change reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<'e> {
	pub from: &'static str,
	pub to: &'static str,
	pub event: &'e str,
}

/// Guards and actions a widget supplies for the names its chart uses.
pub struct Registrations<P = ()> {
	guards: HashMap<&'static str, Guard<P>>,
	actions: HashMap<&'static str, Action<P>>,
}

impl<P> Default for Registrations<P> {
	fn default() -> Self {
		Self {
			guards: HashMap::new(),
			actions: HashMap::new(),
		}
	}
}

impl<P> Registrations<P> {
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn guard(mut self, name: &'static str, guard: impl Fn(&P) -> bool + Send + Sync + 'static) -> Self {
		self.guards.insert(name, Box::new(guard));
		self
	}

	#[must_use]
	pub fn action(mut self, name: &'static str, action: impl Fn(&P) + Send + Sync + 'static) -> Self {
		self.actions.insert(name, Box::new(action));
		self
	}
}

impl<P> fmt::Debug for Registrations<P> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut guards: Vec<_> = self.guards.keys().collect();
		let mut actions: Vec<_> = self.actions.keys().collect();
		guards.sort();
		actions.sort();
		f.debug_struct("Registrations").field("guards", &guards).field("actions", &actions).finish()
	}
}

/// One or more state names, for [`Runner::matches`].
pub trait StateSet {
	fn contains_state(&self, state: &str) -> bool;
}

impl StateSet for str {
	fn contains_state(&self, state: &str) -> bool {
		self == state
	}
}

impl<T: StateSet + ?Sized> StateSet for &T {
	fn contains_state(&self, state: &str) -> bool {
		(**self).contains_state(state)
	}
}

impl StateSet for [&str] {
	fn contains_state(&self, state: &str) -> bool {
		self.iter().any(|s| *s == state)
	}
}

impl<const N: usize> StateSet for [&str; N] {
	fn contains_state(&self, state: &str) -> bool {
		self.as_slice().contains_state(state)
	}
}

/// Runs a [`Chart`] for one widget.
///
/// Events a state does not handle are ignored. Dispatch is synchronous:
/// actions and observers have run by the time [`Runner::dispatch`] returns.
pub struct Runner<P = ()> {
	chart: Arc<Chart>,
	state: &'static str,
	registrations: Registrations<P>,
	observers: Vec<Observer>,
}

impl<P> fmt::Debug for Runner<P> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Runner")
			.field("chart", &self.chart.id())
			.field("state", &self.state)
			.field("registrations", &self.registrations)
			.field("observers", &self.observers.len())
			.finish()
	}
}

impl<P> Runner<P> {
	/// Creates a runner in the chart's initial state.
	///
	/// Fails if the chart names a guard or action missing from
	/// `registrations`.
	pub fn new(chart: Arc<Chart>, registrations: Registrations<P>) -> Result<Self> {
		if let Some(guard) = chart.guards().into_iter().find(|g| !registrations.guards.contains_key(g)) {
			return Err(ChartError::MissingGuard { chart: chart.id(), guard });
		}
		if let Some(action) = chart.actions().into_iter().find(|a| !registrations.actions.contains_key(a)) {
			return Err(ChartError::MissingAction { chart: chart.id(), action });
		}
		Ok(Self {
			state: chart.initial(),
			chart,
			registrations,
			observers: Vec::new(),
		})
	}

	pub fn chart(&self) -> &Arc<Chart> {
		&self.chart
	}

	pub fn state(&self) -> &'static str {
		self.state
	}

	/// Whether the current state is `states` or one of them.
	pub fn matches(&self, states: impl StateSet) -> bool {
		states.contains_state(self.state)
	}

	/// Registers an observer called after every transition.
	pub fn on_transition(&mut self, observer: impl FnMut(&Transition<'_>) + Send + 'static) {
		self.observers.push(Box::new(observer));
	}

	/// Returns to the initial state without notifying observers.
	pub fn reset(&mut self) {
		self.state = self.chart.initial();
	}

	/// Applies `event` to the current state.
	///
	/// The first candidate whose guard passes, or that has none, is taken:
	/// its actions run with `payload`, then observers are told. Returns
	/// `None` when no candidate applies.
	pub fn dispatch<'e>(&mut self, event: &'e str, payload: &P) -> Option<Transition<'e>> {
		let guards = &self.registrations.guards;
		let Some(candidate) = self
			.chart
			.candidates(self.state, event)
			.find(|c| c.guard.is_none_or(|name| guards.get(name).is_some_and(|guard| guard(payload))))
		else {
			tracing::trace!(chart = self.chart.id(), state = self.state, event, "chart.ignored");
			return None;
		};

		let transition = Transition {
			from: self.state,
			to: candidate.target,
			event,
		};
		self.state = candidate.target;
		for name in candidate.actions {
			if let Some(action) = self.registrations.actions.get(name) {
				action(payload);
			}
		}
		tracing::trace!(chart = self.chart.id(), from = transition.from, to = transition.to, event, "chart.transition");
		for observer in &mut self.observers {
			observer(&transition);
		}
		Some(transition)
	}
}
