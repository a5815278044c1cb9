use std::collections::HashMap;
use std::sync::Weak;

use parking_lot::Mutex;

use crate::cursor::Cursor;
use crate::descriptor::ResourceUri;
use crate::source::{Handle, Source, SourceState};

/// Snapshot of one source for status views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
	pub uri: ResourceUri,
	pub state: SourceState,
	pub cursor: Option<Cursor>,
	pub epoch: u64,
	pub reads: u64,
	pub retries: u64,
	pub listeners: usize,
	pub last_error: Option<String>,
}

/// Sources keyed by resolved URI.
///
/// Holds weak references only: a source lives as long as some consumer
/// holds it. A URI may map to several live sources when a closed one was
/// superseded while a consumer kept its handle; all of them stay reachable
/// for [`SourceRegistry::sources`].
#[derive(Default)]
pub(crate) struct SourceRegistry {
	inner: Mutex<HashMap<ResourceUri, Vec<Weak<Handle>>>>,
}

impl SourceRegistry {
	/// Returns the open source for `uri`, or registers the one built by
	/// `create`. The flag is true when `create` was used.
	///
	/// Dropped entries are pruned on every call.
	pub fn get_or_insert_with(&self, uri: &ResourceUri, create: impl FnOnce() -> Source) -> (Source, bool) {
		let mut guard = self.inner.lock();
		Self::prune(&mut guard);
		let entries = guard.entry(uri.clone()).or_default();
		if let Some(existing) = entries
			.iter()
			.filter_map(Source::upgrade)
			.find(|source| source.state() == SourceState::Open)
		{
			return (existing, false);
		}
		let source = create();
		entries.push(source.downgrade());
		(source, true)
	}

	/// Live sources sorted by URI. Dropped entries are pruned.
	pub fn sources(&self) -> Vec<Source> {
		let mut guard = self.inner.lock();
		Self::prune(&mut guard);
		let mut sources: Vec<_> = guard.values().flatten().filter_map(Source::upgrade).collect();
		drop(guard);
		sources.sort_by(|a, b| a.uri().cmp(b.uri()));
		sources
	}

	/// Returns snapshots sorted by URI.
	pub fn snapshots(&self) -> Vec<SourceRecord> {
		self.sources().iter().map(Source::snapshot).collect()
	}

	fn prune(map: &mut HashMap<ResourceUri, Vec<Weak<Handle>>>) {
		map.retain(|_, handles| {
			handles.retain(|handle| handle.strong_count() > 0);
			!handles.is_empty()
		});
	}

	#[cfg(test)]
	fn entries(&self) -> usize {
		self.inner.lock().values().map(Vec::len).sum()
	}
}
