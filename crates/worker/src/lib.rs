//! Scoped-resource primitives shared by meshview crates: epoch-scoped
//! cancellation, listener fan-out, and task spawning.

mod epoch;
mod event;
mod spawn;

pub use epoch::{EpochClock, EpochToken};
pub use event::{EventReceiver, EventTarget, ListenerId};
pub use spawn::spawn;
pub use tokio_util::sync::CancellationToken;
