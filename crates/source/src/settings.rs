//! Manager configuration loaded from TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::backoff::RetryPolicy;

/// Errors that can occur when loading [`SourceSettings`].
#[derive(Debug, Error)]
pub enum SettingsError {
	/// Error reading a settings file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// A value parsed but is out of range.
	#[error("invalid value for '{field}': {reason}")]
	Invalid {
		/// Dotted settings key.
		field: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
}

/// Data source manager settings.
///
/// ```toml
/// default_protocol = "consul"
/// wait_ms = 600000
/// event_buffer = 64
///
/// [retry]
/// base_ms = 1000
/// max_ms = 60000
/// free_attempts = 3
/// jitter = 0.5
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSettings {
	/// Protocol used by descriptors without a `protocol://` prefix.
	pub default_protocol: String,
	/// Longest time a transport should let the server hold one read.
	/// 0 leaves it to the server.
	pub wait_ms: u64,
	/// Buffered events per async subscriber.
	pub event_buffer: usize,
	pub retry: RetrySettings,
}

impl Default for SourceSettings {
	fn default() -> Self {
		Self {
			default_protocol: "consul".to_owned(),
			wait_ms: 10 * 60 * 1000,
			event_buffer: 64,
			retry: RetrySettings::default(),
		}
	}
}

/// `[retry]` table of [`SourceSettings`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
	pub base_ms: u64,
	pub max_ms: u64,
	pub free_attempts: u32,
	pub jitter: f64,
}

impl Default for RetrySettings {
	fn default() -> Self {
		let policy = RetryPolicy::default();
		Self {
			base_ms: policy.base.as_millis() as u64,
			max_ms: policy.max.as_millis() as u64,
			free_attempts: policy.free_attempts,
			jitter: policy.jitter,
		}
	}
}

impl RetrySettings {
	pub fn policy(&self) -> RetryPolicy {
		RetryPolicy {
			base: Duration::from_millis(self.base_ms),
			max: Duration::from_millis(self.max_ms),
			free_attempts: self.free_attempts,
			jitter: self.jitter,
		}
	}
}

impl SourceSettings {
	/// Parses and validates settings from a TOML document.
	pub fn from_toml_str(source: &str) -> Result<Self, SettingsError> {
		let settings: Self = toml::from_str(source)?;
		settings.validate()?;
		Ok(settings)
	}

	/// Reads settings from `path`.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
		let path = path.as_ref();
		let source = std::fs::read_to_string(path).map_err(|error| SettingsError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&source)
	}

	/// Wait passed with every blocking read; `None` when `wait_ms` is 0.
	pub fn wait(&self) -> Option<Duration> {
		(self.wait_ms > 0).then(|| Duration::from_millis(self.wait_ms))
	}

	fn validate(&self) -> Result<(), SettingsError> {
		if self.default_protocol.is_empty() || self.default_protocol.contains("://") {
			return Err(SettingsError::Invalid {
				field: "default_protocol",
				reason: format!("'{}' is not a protocol name", self.default_protocol),
			});
		}
		if self.retry.max_ms < self.retry.base_ms {
			return Err(SettingsError::Invalid {
				field: "retry.max_ms",
				reason: format!("{} is below retry.base_ms {}", self.retry.max_ms, self.retry.base_ms),
			});
		}
		if !(0.0..=1.0).contains(&self.retry.jitter) {
			return Err(SettingsError::Invalid {
				field: "retry.jitter",
				reason: format!("{} is outside 0.0..=1.0", self.retry.jitter),
			});
		}
		Ok(())
	}
}
