//! Restartable blocking-read streams over one resource.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use meshview_worker::{CancellationToken, EpochClock, EpochToken, EventReceiver, EventTarget, ListenerId};
use parking_lot::{Mutex, ReentrantMutex};
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::backoff::RetryPolicy;
use crate::blocking::BlockingQuery;
use crate::cursor::Cursor;
use crate::descriptor::ResourceUri;
use crate::error::{Result, SourceError, TransportError};
use crate::registry::SourceRecord;
use crate::transport::{Page, Transport};

/// Lifecycle of a [`Source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceState {
	/// Created, no read issued yet.
	Idle,
	/// Reading; the next read is issued as soon as the previous resolves.
	Open,
	/// Not reading. The cursor is kept for [`Source::reopen`].
	Closed,
}

impl SourceState {
	/// Lowercase name used in logs and snapshots.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Open => "open",
			Self::Closed => "closed",
		}
	}
}

impl fmt::Display for SourceState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Event delivered to a source's listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
	/// A read succeeded.
	Message { payload: Arc<Value>, index: Cursor },
	/// A read failed. With `retrying` the same read is reissued after a
	/// backoff; without it the source has closed.
	Error { error: TransportError, retrying: bool },
}

impl SourceEvent {
	/// Builds a [`SourceEvent::Message`].
	pub fn message(payload: Value, index: Cursor) -> Self {
		Self::Message {
			payload: Arc::new(payload),
			index,
		}
	}

	/// Payload of a message; `None` for errors.
	pub fn payload(&self) -> Option<&Value> {
		match self {
			Self::Message { payload, .. } => Some(payload),
			Self::Error { .. } => None,
		}
	}

	/// Error carried by an error event.
	pub fn error(&self) -> Option<&TransportError> {
		match self {
			Self::Error { error, .. } => Some(error),
			Self::Message { .. } => None,
		}
	}
}

/// What the reader does after one read was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
	/// Issue the next read right away.
	Read,
	/// Count a failure and wait before reading again.
	Backoff,
	/// The open period ended (terminal error).
	Stop,
	/// The read belonged to a cancelled or superseded epoch.
	Moot,
}

#[derive(Debug)]
struct Inner {
	state: SourceState,
	cursor: Option<Cursor>,
	token: Option<EpochToken>,
	current: Option<SourceEvent>,
	last_error: Option<TransportError>,
	reads: u64,
	retries: u64,
}

impl Inner {
	fn is_live(&self, epoch: u64) -> bool {
		self.state == SourceState::Open && self.token.as_ref().is_some_and(|token| token.is_live(epoch))
	}

	fn epoch(&self) -> u64 {
		self.token.as_ref().map_or(0, EpochToken::epoch)
	}
}

struct Shared {
	uri: ResourceUri,
	transport: Arc<dyn Transport>,
	policy: RetryPolicy,
	wait: Option<Duration>,
	events: EventTarget<SourceEvent>,
	/// Serializes dispatch against `close`. Always taken before `inner`.
	emit: ReentrantMutex<()>,
	inner: Mutex<Inner>,
	clock: EpochClock,
	root: CancellationToken,
	read_permit: Arc<Semaphore>,
}

impl Shared {
	fn begin(self: &Arc<Self>, op: &'static str, from: SourceState) -> Result<()> {
		let (token, cursor) = {
			let mut inner = self.inner.lock();
			if inner.state != from {
				return Err(SourceError::InvalidTransition { from: inner.state, op });
			}
			let token = EpochToken::issue(&self.clock, &self.root);
			inner.state = SourceState::Open;
			inner.token = Some(token.clone());
			(token, inner.cursor)
		};
		tracing::debug!(uri = %self.uri, epoch = token.epoch(), cursor = ?cursor, op, "source.open");

		let mut failures = 0u32;
		if let Some(result) = self.transport.read_now(&self.uri, cursor) {
			let step = self.apply(token.epoch(), result);
			tracing::trace!(uri = %self.uri, epoch = token.epoch(), ?step, "source.read_now");
			match step {
				Step::Read => {}
				Step::Backoff => failures = 1,
				Step::Stop | Step::Moot => return Ok(()),
			}
		}

		meshview_worker::spawn("meshview.source.reader", Arc::clone(self).run(token, failures));
		Ok(())
	}

	/// Reads until the epoch ends. `failures` counts consecutive failed
	/// reads; while it is non-zero each read waits out the backoff first.
	async fn run(self: Arc<Self>, token: EpochToken, mut failures: u32) {
		let epoch = token.epoch();
		loop {
			if failures > 0 {
				let delay = self.policy.delay(failures);
				tracing::trace!(uri = %self.uri, epoch, failures, delay_ms = delay.as_millis() as u64, "source.backoff");
				tokio::select! {
					biased;
					_ = token.cancelled() => break,
					_ = tokio::time::sleep(delay) => {}
				}
			}
			let permit = tokio::select! {
				biased;
				_ = token.cancelled() => break,
				permit = Arc::clone(&self.read_permit).acquire_owned() => match permit {
					Ok(permit) => permit,
					Err(_) => break,
				},
			};
			let cursor = {
				let inner = self.inner.lock();
				if !inner.is_live(epoch) {
					break;
				}
				inner.cursor
			};

			let query = BlockingQuery::new(cursor, self.wait);
			tracing::trace!(uri = %self.uri, epoch, cursor = ?cursor, "source.read");
			let result = tokio::select! {
				biased;
				_ = token.cancelled() => break,
				res = self.transport.read(&self.uri, query, token.signal()) => res,
			};
			drop(permit);

			match self.apply(epoch, result) {
				Step::Read => failures = 0,
				Step::Backoff => failures = failures.saturating_add(1),
				Step::Stop | Step::Moot => break,
			}
		}
		tracing::trace!(uri = %self.uri, epoch, "source.reader.exit");
	}

	/// Applies one read result and dispatches its event.
	///
	/// The emit lock is held until listeners return, so a concurrent
	/// `close` never returns while an event of the closed epoch is still
	/// being delivered.
	fn apply(&self, epoch: u64, result: std::result::Result<Page, TransportError>) -> Step {
		let _emit = self.emit.lock();
		let (step, event) = {
			let mut inner = self.inner.lock();
			if !inner.is_live(epoch) {
				tracing::trace!(uri = %self.uri, epoch, current = inner.epoch(), "source.read.moot");
				return Step::Moot;
			}
			match result {
				Ok(page) => Self::apply_page(&self.uri, &mut inner, page),
				Err(error) => Self::apply_error(&self.uri, &mut inner, error),
			}
		};
		if let Some(event) = event {
			self.events.dispatch(event);
		}
		step
	}

	fn apply_page(uri: &ResourceUri, inner: &mut Inner, page: Page) -> (Step, Option<SourceEvent>) {
		inner.reads += 1;
		let (index, raised) = Cursor::from_index(page.index);
		if !index.admits_over(inner.cursor) {
			tracing::trace!(%uri, %index, cursor = ?inner.cursor, "source.read.stale");
			return (Step::Backoff, None);
		}
		inner.cursor = Some(index);
		inner.last_error = None;
		let event = SourceEvent::message(page.payload, index);
		inner.current = Some(event.clone());
		tracing::trace!(%uri, %index, raised, "source.read.ok");
		let step = if raised { Step::Backoff } else { Step::Read };
		(step, Some(event))
	}

	fn apply_error(uri: &ResourceUri, inner: &mut Inner, error: TransportError) -> (Step, Option<SourceEvent>) {
		// A transport reporting cancellation while its epoch is live gave up
		// on its own; retry like any transient failure.
		if error.is_transient() || error == TransportError::Cancelled {
			inner.retries += 1;
			tracing::debug!(%uri, %error, retries = inner.retries, "source.retry");
			return (Step::Backoff, Some(SourceEvent::Error { error, retrying: true }));
		}

		tracing::warn!(%uri, %error, cursor = ?inner.cursor, "source.error");
		inner.state = SourceState::Closed;
		if let Some(token) = inner.token.take() {
			token.cancel();
		}
		inner.last_error = Some(error.clone());
		let event = SourceEvent::Error { error, retrying: false };
		inner.current = Some(event.clone());
		(Step::Stop, Some(event))
	}

	fn close(&self) -> bool {
		let _emit = self.emit.lock();
		let mut inner = self.inner.lock();
		if inner.state == SourceState::Closed {
			return false;
		}
		inner.state = SourceState::Closed;
		if let Some(token) = inner.token.take() {
			token.cancel();
			tracing::debug!(uri = %self.uri, epoch = token.epoch(), cursor = ?inner.cursor, "source.close");
		}
		true
	}
}

/// Keeps the source alive; dropping the last one tears it down.
pub(crate) struct Handle {
	shared: Arc<Shared>,
}

impl Drop for Handle {
	fn drop(&mut self) {
		self.shared.close();
		self.shared.root.cancel();
	}
}

/// A restartable, cancelable stream of blocking reads over one resource.
///
/// Clones share one stream. Every successful read stores its index as the
/// cursor and immediately issues the next read with it, so the stream is
/// paced by the server holding reads open. At most one read is in flight
/// at any time. When the last clone is dropped the stream is closed.
#[derive(Clone)]
pub struct Source {
	handle: Arc<Handle>,
}

impl fmt::Debug for Source {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let inner = self.shared().inner.lock();
		f.debug_struct("Source")
			.field("uri", &self.shared().uri)
			.field("state", &inner.state)
			.field("cursor", &inner.cursor)
			.finish_non_exhaustive()
	}
}

impl Source {
	/// Creates an idle source. Nothing is read until [`Source::open`].
	///
	/// `wait` is passed to the transport with every read that carries a
	/// cursor, bounding how long the server may hold it.
	pub fn new(uri: ResourceUri, transport: Arc<dyn Transport>, policy: RetryPolicy, wait: Option<Duration>, event_buffer: usize) -> Self {
		let shared = Shared {
			uri,
			transport,
			policy,
			wait,
			events: EventTarget::new(event_buffer),
			emit: ReentrantMutex::new(()),
			inner: Mutex::new(Inner {
				state: SourceState::Idle,
				cursor: None,
				token: None,
				current: None,
				last_error: None,
				reads: 0,
				retries: 0,
			}),
			clock: EpochClock::new(),
			root: CancellationToken::new(),
			read_permit: Arc::new(Semaphore::new(1)),
		};
		Self {
			handle: Arc::new(Handle { shared: Arc::new(shared) }),
		}
	}

	fn shared(&self) -> &Arc<Shared> {
		&self.handle.shared
	}

	pub(crate) fn downgrade(&self) -> Weak<Handle> {
		Arc::downgrade(&self.handle)
	}

	pub(crate) fn upgrade(handle: &Weak<Handle>) -> Option<Self> {
		handle.upgrade().map(|handle| Self { handle })
	}

	/// Starts reading with no cursor.
	///
	/// Transports that can answer synchronously deliver the first message
	/// before this returns.
	pub fn open(&self) -> Result<()> {
		self.shared().begin("open", SourceState::Idle)
	}

	/// Resumes a closed source from its stored cursor.
	pub fn reopen(&self) -> Result<()> {
		self.shared().begin("reopen", SourceState::Closed)
	}

	/// Stops reading and cancels the in-flight read. The cursor is kept.
	///
	/// Returns false if the source was already closed.
	pub fn close(&self) -> bool {
		self.shared().close()
	}

	/// Resource this source reads.
	pub fn uri(&self) -> &ResourceUri {
		&self.shared().uri
	}

	/// Current lifecycle state.
	pub fn state(&self) -> SourceState {
		self.shared().inner.lock().state
	}

	/// Index of the last accepted read, if any.
	pub fn cursor(&self) -> Option<Cursor> {
		self.shared().inner.lock().cursor
	}

	/// Current open period; 0 before the first open.
	pub fn epoch(&self) -> u64 {
		self.shared().clock.current()
	}

	/// Most recent message or closing error, for consumers attaching after
	/// it was dispatched. Retried errors are not retained.
	pub fn current(&self) -> Option<SourceEvent> {
		self.shared().inner.lock().current.clone()
	}

	/// Error that closed the source, until it is reopened successfully.
	pub fn last_error(&self) -> Option<TransportError> {
		self.shared().inner.lock().last_error.clone()
	}

	/// Registers a callback run synchronously for every event.
	pub fn add_listener(&self, listener: impl Fn(&SourceEvent) + Send + Sync + 'static) -> ListenerId {
		self.shared().events.add_listener(listener)
	}

	/// Unregisters a callback. Returns false if `id` was not registered.
	pub fn remove_listener(&self, id: ListenerId) -> bool {
		self.shared().events.remove_listener(id)
	}

	/// Returns a receiver for events dispatched from now on.
	pub fn subscribe(&self) -> EventReceiver<SourceEvent> {
		self.shared().events.subscribe()
	}

	/// Publishes an event produced outside the read loop, e.g. an optimistic
	/// local update. The cursor is not touched.
	pub fn dispatch_event(&self, event: SourceEvent) {
		let shared = self.shared();
		let _emit = shared.emit.lock();
		shared.inner.lock().current = Some(event.clone());
		shared.events.dispatch(event);
	}

	/// Point-in-time view for diagnostics.
	pub fn snapshot(&self) -> SourceRecord {
		let shared = self.shared();
		let listeners = shared.events.listener_count();
		let inner = shared.inner.lock();
		SourceRecord {
			uri: shared.uri.clone(),
			state: inner.state,
			cursor: inner.cursor,
			epoch: shared.clock.current(),
			reads: inner.reads,
			retries: inner.retries,
			listeners,
			last_error: inner.last_error.as_ref().map(ToString::to_string),
		}
	}
}
