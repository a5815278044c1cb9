//! Charts shipped with the UI widgets.

use std::sync::{Arc, LazyLock};

use crate::chart::Chart;
use crate::def::{CandidateDef, ChartDef, StateDef, TransitionDef};

/// Unguarded transition with a single target.
macro_rules! go {
	($event:literal => $target:literal) => {
		TransitionDef {
			event: $event,
			candidates: &[CandidateDef::to($target)],
		}
	};
}

/// A flag: `TOGGLE` flips it, `TRUE` and `FALSE` set it.
pub static BOOLEAN: ChartDef = ChartDef {
	id: "boolean",
	initial: "false",
	states: &[StateDef::new("false", &[go!("TOGGLE" => "true")]), StateDef::new("true", &[go!("TOGGLE" => "false")])],
	on: &[go!("TRUE" => "true"), go!("FALSE" => "false")],
};

const OUTCOME_STATES: &[StateDef] = &[
	StateDef::new("idle", &[go!("SUCCESS" => "success"), go!("ERROR" => "error")]),
	StateDef::leaf("success"),
	StateDef::leaf("error"),
];

const OUTCOME_ON: &[TransitionDef] = &[go!("RESET" => "idle")];

/// Outcome of a one-shot check, e.g. a form field validation.
pub static VALIDATE: ChartDef = ChartDef {
	id: "validate",
	initial: "idle",
	states: OUTCOME_STATES,
	on: OUTCOME_ON,
};

/// Copy-to-clipboard button feedback. Same table as [`VALIDATE`].
pub static COPY_BUTTON: ChartDef = ChartDef {
	id: "copy-button",
	initial: "idle",
	states: OUTCOME_STATES,
	on: OUTCOME_ON,
};

/// A widget showing data from a source.
///
/// `LOAD` goes straight to `idle` when the `loaded` guard reports data is
/// already present. `ERROR` outside of `loading` is a failed change.
pub static DATA_LOADER: ChartDef = ChartDef {
	id: "data-loader",
	initial: "load",
	states: &[
		StateDef::leaf("load"),
		StateDef::new("loading", &[go!("SUCCESS" => "idle"), go!("ERROR" => "error")]),
		StateDef::leaf("idle"),
		StateDef::new("error", &[go!("RETRY" => "load")]),
		StateDef::new("changeError", &[go!("RETRY" => "load")]),
	],
	on: &[
		TransitionDef {
			event: "LOAD",
			candidates: &[CandidateDef::to("idle").when("loaded"), CandidateDef::to("loading")],
		},
		go!("ERROR" => "changeError"),
	],
};

/// Saving or deleting a form.
pub static FORM_PERSISTENCE: ChartDef = ChartDef {
	id: "form-persistence",
	initial: "idle",
	states: &[
		StateDef::new("idle", &[go!("PERSIST" => "persisting"), go!("REMOVE" => "removing")]),
		StateDef::new("persisting", &[go!("SUCCESS" => "persisted"), go!("ERROR" => "error")]),
		StateDef::new("removing", &[go!("SUCCESS" => "removed"), go!("ERROR" => "error")]),
		StateDef::leaf("persisted"),
		StateDef::leaf("removed"),
		StateDef::new("error", &[go!("RESET" => "idle")]),
		StateDef::leaf("loading"),
	],
	on: &[],
};

/// Deleting an item from a list.
pub static LIST_DELETION: ChartDef = ChartDef {
	id: "list-deletion",
	initial: "idle",
	states: &[
		StateDef::leaf("loading"),
		StateDef::new("idle", &[go!("SUCCESS" => "removed"), go!("ERROR" => "error")]),
		StateDef::new("removed", &[go!("RESET" => "idle")]),
		StateDef::new("error", &[go!("RESET" => "idle")]),
	],
	on: &[],
};

/// Every built-in chart definition.
pub static ALL: &[&ChartDef] = &[&BOOLEAN, &VALIDATE, &COPY_BUTTON, &DATA_LOADER, &FORM_PERSISTENCE, &LIST_DELETION];

static COMPILED: LazyLock<Vec<Arc<Chart>>> = LazyLock::new(|| {
	ALL.iter()
		.map(|def| Arc::new(Chart::compile(def).unwrap_or_else(|err| panic!("built-in {err}"))))
		.collect()
});

/// Compiled built-in chart by id.
pub fn find(id: &str) -> Option<Arc<Chart>> {
	COMPILED.iter().find(|chart| chart.id() == id).cloned()
}

fn builtin(def: &'static ChartDef) -> Arc<Chart> {
	COMPILED
		.iter()
		.find(|chart| std::ptr::eq(chart.def(), def))
		.cloned()
		.expect("every built-in chart is listed in ALL")
}

pub fn boolean() -> Arc<Chart> {
	builtin(&BOOLEAN)
}

pub fn validate() -> Arc<Chart> {
	builtin(&VALIDATE)
}

pub fn copy_button() -> Arc<Chart> {
	builtin(&COPY_BUTTON)
}

pub fn data_loader() -> Arc<Chart> {
	builtin(&DATA_LOADER)
}

pub fn form_persistence() -> Arc<Chart> {
	builtin(&FORM_PERSISTENCE)
}

pub fn list_deletion() -> Arc<Chart> {
	builtin(&LIST_DELETION)
}
