use std::time::Duration;

use rand::Rng;

/// Backoff applied between failed reads of one source.
///
/// The first `free_attempts` consecutive failures wait `base`. Later
/// failures double the wait per failure up to `max`. A random stagger
/// in `[0, wait * jitter)` is added on top.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
	pub base: Duration,
	pub max: Duration,
	pub free_attempts: u32,
	pub jitter: f64,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			base: Duration::from_secs(1),
			max: Duration::from_secs(60),
			free_attempts: 3,
			jitter: 0.5,
		}
	}
}

impl RetryPolicy {
	/// A fixed delay with no growth and no jitter.
	pub fn fixed(delay: Duration) -> Self {
		Self {
			base: delay,
			max: delay,
			free_attempts: u32::MAX,
			jitter: 0.0,
		}
	}

	/// Delay before the retry following `failures` consecutive failures,
	/// without jitter.
	pub fn nominal_delay(&self, failures: u32) -> Duration {
		if failures <= self.free_attempts {
			return self.base.min(self.max);
		}
		let shift = failures - self.free_attempts;
		let factor = 1u32.checked_shl(shift).unwrap_or(u32::MAX);
		self.base.saturating_mul(factor).min(self.max)
	}

	/// Delay before the retry following `failures` consecutive failures.
	pub fn delay(&self, failures: u32) -> Duration {
		let nominal = self.nominal_delay(failures);
		if self.jitter <= 0.0 || nominal.is_zero() {
			return nominal;
		}
		let stagger = nominal.mul_f64(self.jitter.min(1.0) * rand::rng().random::<f64>());
		nominal + stagger
	}
}
