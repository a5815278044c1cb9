//! Finite state charts for UI widgets.
//!
//! A chart is authored as `'static` data ([`ChartDef`]), compiled once into
//! a lookup table ([`Chart`]) and shared by any number of [`Runner`]s, one
//! per widget. Guards and actions are referenced by name in the chart and
//! supplied by the widget through [`Registrations`].

pub mod charts;
mod chart;
mod def;
mod error;
mod runner;

pub use chart::Chart;
pub use def::{CandidateDef, ChartDef, StateDef, TransitionDef};
pub use error::{ChartError, Result};
pub use runner::{Registrations, Runner, StateSet, Transition};
