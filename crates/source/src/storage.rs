//! Key-value storage exposed as the `settings` protocol.

use std::collections::HashMap;

use async_trait::async_trait;
use meshview_worker::CancellationToken;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::blocking::BlockingQuery;
use crate::cursor::Cursor;
use crate::descriptor::ResourceUri;
use crate::error::TransportError;
use crate::transport::{Page, Transport};

/// Backing key-value store, e.g. browser local storage.
pub trait Storage: Send + Sync + 'static {
	fn get(&self, key: &str) -> Option<Value>;
	fn set(&self, key: &str, value: Value);
	fn remove(&self, key: &str);
}

/// In-process [`Storage`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
	values: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a storage pre-seeded with `entries`.
	pub fn seeded<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
		Self {
			values: Mutex::new(entries.into_iter().map(|(k, v)| (k.into(), v)).collect()),
		}
	}
}

impl Storage for MemoryStorage {
	fn get(&self, key: &str) -> Option<Value> {
		self.values.lock().get(key).cloned()
	}

	fn set(&self, key: &str, value: Value) {
		self.values.lock().insert(key.to_owned(), value);
	}

	fn remove(&self, key: &str) {
		self.values.lock().remove(key);
	}
}

/// Revision every key starts at before its first write through the store.
const INITIAL_REVISION: u64 = 1;

/// Write path and [`Transport`] for a [`Storage`].
///
/// Each write through the store bumps a global revision and records it
/// for the written key. The key's revision is the cursor: a read with an
/// older cursor answers immediately, a read with the current cursor waits
/// for the next write to that key.
pub struct SettingsStore<S> {
	storage: S,
	revisions: Mutex<Revisions>,
	changes: watch::Sender<u64>,
}

#[derive(Debug)]
struct Revisions {
	latest: u64,
	by_key: HashMap<String, u64>,
}

impl<S: Storage> SettingsStore<S> {
	pub fn new(storage: S) -> Self {
		let (changes, _) = watch::channel(INITIAL_REVISION);
		Self {
			storage,
			revisions: Mutex::new(Revisions {
				latest: INITIAL_REVISION,
				by_key: HashMap::new(),
			}),
			changes,
		}
	}

	pub fn get(&self, key: &str) -> Option<Value> {
		self.storage.get(key)
	}

	pub fn set(&self, key: &str, value: Value) {
		self.storage.set(key, value);
		self.bump(key);
	}

	pub fn remove(&self, key: &str) {
		self.storage.remove(key);
		self.bump(key);
	}

	/// Current revision of `key`.
	pub fn revision(&self, key: &str) -> u64 {
		self.revisions.lock().by_key.get(key).copied().unwrap_or(INITIAL_REVISION)
	}

	fn bump(&self, key: &str) {
		let latest = {
			let mut revisions = self.revisions.lock();
			revisions.latest += 1;
			let latest = revisions.latest;
			revisions.by_key.insert(key.to_owned(), latest);
			latest
		};
		tracing::trace!(key, revision = latest, "settings.write");
		self.changes.send_replace(latest);
	}

	fn page(&self, key: &str, revision: u64) -> Page {
		Page::new(self.storage.get(key).unwrap_or(Value::Null), revision)
	}

	fn page_if_newer(&self, key: &str, cursor: Option<Cursor>) -> Option<Page> {
		let revision = self.revision(key);
		cursor.is_none_or(|cursor| revision > cursor.get()).then(|| self.page(key, revision))
	}
}

#[async_trait]
impl<S: Storage> Transport for SettingsStore<S> {
	/// Resolves on the next write to the key. Once `query.wait` elapses the
	/// current value is returned again with an unchanged revision.
	async fn read(&self, uri: &ResourceUri, query: BlockingQuery, cancel: CancellationToken) -> Result<Page, TransportError> {
		let key = uri.path();
		let deadline = query.wait.map(|wait| Instant::now() + wait);
		let mut changes = self.changes.subscribe();
		loop {
			if let Some(page) = self.page_if_newer(key, query.index) {
				return Ok(page);
			}
			tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(TransportError::Cancelled),
				_ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
					return Ok(self.page(key, self.revision(key)));
				}
				changed = changes.changed() => {
					if changed.is_err() {
						return Err(TransportError::Network("settings store dropped".into()));
					}
				}
			}
		}
	}

	fn read_now(&self, uri: &ResourceUri, cursor: Option<Cursor>) -> Option<Result<Page, TransportError>> {
		self.page_if_newer(uri.path(), cursor).map(Ok)
	}
}
