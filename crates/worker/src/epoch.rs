use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Monotonic epoch clock; one epoch per open period of a resource.
#[derive(Debug, Default, Clone)]
pub struct EpochClock {
	next: Arc<AtomicU64>,
}

impl EpochClock {
	/// Creates a new clock whose first epoch is 1.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next epoch ID.
	pub fn next(&self) -> u64 {
		self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}

	/// Returns the most recently issued epoch, or 0 if none was issued yet.
	pub fn current(&self) -> u64 {
		self.next.load(Ordering::Acquire)
	}
}

/// Epoch-scoped cancellation token.
///
/// Work started under one epoch carries a clone of its token. The owner
/// compares [`EpochToken::epoch`] against its own current epoch before
/// applying any result, so results from a cancelled period are dropped
/// even if the work finished before it observed the cancellation.
#[derive(Debug, Clone)]
pub struct EpochToken {
	epoch: u64,
	cancel: CancellationToken,
}

impl EpochToken {
	/// Creates a new epoch token.
	pub fn new(epoch: u64, cancel: CancellationToken) -> Self {
		Self { epoch, cancel }
	}

	/// Issues the next epoch from `clock` as a child of `parent`.
	pub fn issue(clock: &EpochClock, parent: &CancellationToken) -> Self {
		Self::new(clock.next(), parent.child_token())
	}

	/// Returns the epoch ID.
	pub const fn epoch(&self) -> u64 {
		self.epoch
	}

	/// Returns true when cancellation is requested.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Requests cancellation.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Future resolving when cancellation is requested.
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}

	/// Returns a child cancellation token for handing to collaborators.
	///
	/// The child observes cancellation of this epoch but cannot cancel it.
	pub fn signal(&self) -> CancellationToken {
		self.cancel.child_token()
	}

	/// Returns true if this token belongs to `epoch` and has not been cancelled.
	pub fn is_live(&self, epoch: u64) -> bool {
		self.epoch == epoch && !self.is_cancelled()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn clock_is_monotonic_across_clones() {
		let clock = EpochClock::new();
		let other = clock.clone();
		assert_eq!(clock.current(), 0);
		assert_eq!(clock.next(), 1);
		assert_eq!(other.next(), 2);
		assert_eq!(clock.current(), 2);
	}

	#[test]
	fn parent_cancellation_reaches_issued_token_and_signal() {
		let clock = EpochClock::new();
		let root = CancellationToken::new();
		let token = EpochToken::issue(&clock, &root);
		let signal = token.signal();
		assert!(token.is_live(1));

		root.cancel();
		assert!(token.is_cancelled());
		assert!(signal.is_cancelled());
		assert!(!token.is_live(1));
	}

	#[test]
	fn signal_cannot_cancel_epoch() {
		let token = EpochToken::new(7, CancellationToken::new());
		token.signal().cancel();
		assert!(!token.is_cancelled());
		assert!(!token.is_live(8));
	}
}
