//! Chart compilation and runner errors.

use thiserror::Error;

/// Errors raised while compiling a chart or creating a runner.
///
/// Dispatching an event a state does not handle is never an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChartError {
	#[error("chart '{chart}': initial state '{state}' is not defined")]
	UnknownInitial { chart: &'static str, state: &'static str },

	#[error("chart '{chart}': transition from '{from}' on {event} targets undefined state '{target}'")]
	UnknownState {
		chart: &'static str,
		from: &'static str,
		event: &'static str,
		target: &'static str,
	},

	#[error("chart '{chart}': state '{state}' is defined twice")]
	DuplicateState { chart: &'static str, state: &'static str },

	#[error("chart '{chart}': guard '{guard}' is not registered")]
	MissingGuard { chart: &'static str, guard: &'static str },

	#[error("chart '{chart}': action '{action}' is not registered")]
	MissingAction { chart: &'static str, action: &'static str },
}

pub type Result<T> = std::result::Result<T, ChartError>;
