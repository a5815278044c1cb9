use std::collections::{BTreeSet, HashMap};

use crate::def::{CandidateDef, ChartDef, TransitionDef};
use crate::error::{ChartError, Result};

type Table = HashMap<&'static str, &'static [CandidateDef]>;

/// A [`ChartDef`] compiled into per-state lookup tables.
///
/// Compilation checks that the initial state and every transition target
/// exist. The compiled chart is immutable and meant to be shared behind an
/// `Arc`.
#[derive(Debug)]
pub struct Chart {
	def: &'static ChartDef,
	states: HashMap<&'static str, Table>,
	global: Table,
}

fn table(on: &'static [TransitionDef]) -> Table {
	on.iter().map(|t| (t.event, t.candidates)).collect()
}

impl Chart {
	pub fn compile(def: &'static ChartDef) -> Result<Self> {
		let mut states = HashMap::with_capacity(def.states.len());
		for state in def.states {
			if states.insert(state.name, table(state.on)).is_some() {
				return Err(ChartError::DuplicateState {
					chart: def.id,
					state: state.name,
				});
			}
		}
		if !states.contains_key(def.initial) {
			return Err(ChartError::UnknownInitial {
				chart: def.id,
				state: def.initial,
			});
		}

		let global_from = std::iter::repeat("*").zip(def.on);
		let local = def.states.iter().flat_map(|s| std::iter::repeat(s.name).zip(s.on));
		for (from, transition) in local.chain(global_from) {
			if let Some(missing) = transition.candidates.iter().find(|c| !states.contains_key(c.target)) {
				return Err(ChartError::UnknownState {
					chart: def.id,
					from,
					event: transition.event,
					target: missing.target,
				});
			}
		}

		Ok(Self {
			def,
			states,
			global: table(def.on),
		})
	}

	pub fn id(&self) -> &'static str {
		self.def.id
	}

	pub fn initial(&self) -> &'static str {
		self.def.initial
	}

	pub fn def(&self) -> &'static ChartDef {
		self.def
	}

	pub fn has_state(&self, state: &str) -> bool {
		self.states.contains_key(state)
	}

	/// Candidates for `event` in `state`: the state's own first, then the
	/// chart-level ones.
	pub fn candidates<'a>(&'a self, state: &str, event: &str) -> impl Iterator<Item = &'static CandidateDef> + 'a {
		let local = self.states.get(state).and_then(|t| t.get(event)).copied().unwrap_or_default();
		let global = self.global.get(event).copied().unwrap_or_default();
		local.iter().chain(global)
	}

	/// Every guard name the chart references, deduplicated and sorted.
	pub fn guards(&self) -> BTreeSet<&'static str> {
		self.all_candidates().filter_map(|c| c.guard).collect()
	}

	/// Every action name the chart references, deduplicated and sorted.
	pub fn actions(&self) -> BTreeSet<&'static str> {
		self.all_candidates().flat_map(|c| c.actions.iter().copied()).collect()
	}

	fn all_candidates(&self) -> impl Iterator<Item = &'static CandidateDef> {
		let def = self.def;
		def.states
			.iter()
			.flat_map(|s| s.on)
			.chain(def.on)
			.flat_map(|t| t.candidates)
	}
}
