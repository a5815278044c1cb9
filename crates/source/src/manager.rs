use std::collections::HashMap;
use std::sync::Arc;

use crate::backoff::RetryPolicy;
use crate::descriptor::Descriptor;
use crate::error::{ConfigError, Result};
use crate::registry::{SourceRecord, SourceRegistry};
use crate::settings::SourceSettings;
use crate::source::Source;
use crate::transport::Transport;

/// Opens and tracks [`Source`]s.
///
/// Transports are registered per protocol when the manager is built; the
/// manager never looks collaborators up on its own.
pub struct DataSourceManager {
	settings: SourceSettings,
	policy: RetryPolicy,
	transports: HashMap<String, Arc<dyn Transport>>,
	registry: SourceRegistry,
}

impl std::fmt::Debug for DataSourceManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut protocols: Vec<_> = self.transports.keys().collect();
		protocols.sort();
		f.debug_struct("DataSourceManager")
			.field("settings", &self.settings)
			.field("protocols", &protocols)
			.finish_non_exhaustive()
	}
}

/// Builder for [`DataSourceManager`].
#[derive(Default)]
pub struct DataSourceManagerBuilder {
	settings: SourceSettings,
	policy: Option<RetryPolicy>,
	transports: HashMap<String, Arc<dyn Transport>>,
}

impl DataSourceManagerBuilder {
	/// Replaces the default settings.
	#[must_use]
	pub fn settings(mut self, settings: SourceSettings) -> Self {
		self.settings = settings;
		self
	}

	/// Overrides the retry policy derived from the settings.
	#[must_use]
	pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.policy = Some(policy);
		self
	}

	/// Registers the transport serving `protocol`.
	#[must_use]
	pub fn protocol(mut self, protocol: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
		self.transports.insert(protocol.into(), transport);
		self
	}

	/// Finishes the manager. The retry policy defaults to the one in the
	/// settings.
	pub fn build(self) -> DataSourceManager {
		let policy = self.policy.unwrap_or_else(|| self.settings.retry.policy());
		DataSourceManager {
			settings: self.settings,
			policy,
			transports: self.transports,
			registry: SourceRegistry::default(),
		}
	}
}

impl DataSourceManager {
	/// Starts a manager with default settings and no transports.
	pub fn builder() -> DataSourceManagerBuilder {
		DataSourceManagerBuilder::default()
	}

	/// Settings the manager was built with.
	pub fn settings(&self) -> &SourceSettings {
		&self.settings
	}

	/// Opens a source for `descriptor`, or joins the open one for the same URI.
	///
	/// Descriptor and protocol errors are returned here, before any read.
	pub fn open(&self, descriptor: &Descriptor) -> Result<Source> {
		let uri = descriptor.resolve(&self.settings.default_protocol)?;
		let transport = self
			.transports
			.get(uri.protocol())
			.cloned()
			.ok_or_else(|| ConfigError::UnknownProtocol(uri.protocol().to_owned()))?;

		let (source, created) = self.registry.get_or_insert_with(&uri, || {
			Source::new(uri.clone(), transport, self.policy, self.settings.wait(), self.settings.event_buffer)
		});
		if created {
			source.open()?;
		} else {
			tracing::trace!(%uri, "source.shared");
		}
		Ok(source)
	}

	/// Snapshots of every live source, sorted by URI.
	pub fn snapshots(&self) -> Vec<SourceRecord> {
		self.registry.snapshots()
	}

	/// Closes every live source, including closed ones a consumer reopened
	/// after a newer source took over their URI. Returns how many were open.
	pub fn close_all(&self) -> usize {
		let closed = self.registry.sources().iter().filter(|source| source.close()).count();
		tracing::debug!(closed, "source.close_all");
		closed
	}
}
