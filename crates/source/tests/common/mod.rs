#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use meshview_source::blocking::parse_index_header;
use meshview_source::{BlockingQuery, CancellationToken, Cursor, Page, ResourceUri, Transport, TransportError};
use tokio::sync::{Mutex, mpsc, oneshot};

/// One read waiting for the test to answer it.
pub struct PendingRead {
	pub uri: ResourceUri,
	pub query: BlockingQuery,
	reply: oneshot::Sender<Result<Page, TransportError>>,
}

impl PendingRead {
	pub fn index(&self) -> Option<u64> {
		self.query.index.map(Cursor::get)
	}

	/// Request target an HTTP transport would send for this read.
	pub fn target(&self) -> String {
		self.query.apply(self.uri.path())
	}

	/// Answers the read. Returns false if the reader already gave up.
	pub fn respond(self, result: Result<Page, TransportError>) -> bool {
		self.reply.send(result).is_ok()
	}

	pub fn ok(self, payload: serde_json::Value, index: u64) -> bool {
		self.respond(Ok(Page::new(payload, index)))
	}

	/// Answers with the index taken from a raw response header value.
	pub fn ok_with_header(self, payload: serde_json::Value, header: &str) -> bool {
		self.respond(parse_index_header(header).map(|index| Page::new(payload, index)))
	}
}

/// Transport whose reads are answered by the test.
///
/// Tracks how many reads are pending at once. With `ignore_cancel` set, a
/// read keeps waiting for its answer after cancellation, like a transport
/// that cannot abort a request already on the wire.
pub struct ManualTransport {
	reads: mpsc::UnboundedSender<PendingRead>,
	in_flight: Arc<AtomicUsize>,
	max_in_flight: Arc<AtomicUsize>,
	total: AtomicUsize,
	ignore_cancel: bool,
}

pub struct ManualHandle {
	reads: Mutex<mpsc::UnboundedReceiver<PendingRead>>,
	in_flight: Arc<AtomicUsize>,
	max_in_flight: Arc<AtomicUsize>,
}

impl ManualTransport {
	pub fn new() -> (Arc<Self>, ManualHandle) {
		Self::build(false)
	}

	pub fn ignoring_cancel() -> (Arc<Self>, ManualHandle) {
		Self::build(true)
	}

	fn build(ignore_cancel: bool) -> (Arc<Self>, ManualHandle) {
		let (tx, rx) = mpsc::unbounded_channel();
		let in_flight = Arc::new(AtomicUsize::new(0));
		let max_in_flight = Arc::new(AtomicUsize::new(0));
		let transport = Arc::new(Self {
			reads: tx,
			in_flight: Arc::clone(&in_flight),
			max_in_flight: Arc::clone(&max_in_flight),
			total: AtomicUsize::new(0),
			ignore_cancel,
		});
		let handle = ManualHandle {
			reads: Mutex::new(rx),
			in_flight,
			max_in_flight,
		};
		(transport, handle)
	}

	pub fn total_reads(&self) -> usize {
		self.total.load(Ordering::SeqCst)
	}
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::SeqCst);
	}
}

#[async_trait]
impl Transport for ManualTransport {
	async fn read(&self, uri: &ResourceUri, query: BlockingQuery, cancel: CancellationToken) -> Result<Page, TransportError> {
		let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
		let _guard = InFlight(Arc::clone(&self.in_flight));
		self.max_in_flight.fetch_max(now, Ordering::SeqCst);
		self.total.fetch_add(1, Ordering::SeqCst);

		let (reply, answer) = oneshot::channel();
		let pending = PendingRead {
			uri: uri.clone(),
			query,
			reply,
		};
		if self.reads.send(pending).is_err() {
			return Err(TransportError::Network("test harness dropped".into()));
		}

		if self.ignore_cancel {
			return answer.await.unwrap_or(Err(TransportError::Cancelled));
		}
		tokio::select! {
			_ = cancel.cancelled() => Err(TransportError::Cancelled),
			res = answer => res.unwrap_or(Err(TransportError::Cancelled)),
		}
	}
}

impl ManualHandle {
	/// Waits for the next read issued by the source.
	pub async fn next_read(&self) -> PendingRead {
		tokio::time::timeout(Duration::from_secs(5), self.reads.lock().await.recv())
			.await
			.expect("timed out waiting for a read")
			.expect("transport dropped")
	}

	/// Asserts that no read is issued within `window`.
	pub async fn assert_no_read(&self, window: Duration) {
		let got = tokio::time::timeout(window, self.reads.lock().await.recv()).await;
		assert!(got.is_err(), "unexpected read");
	}

	pub fn in_flight(&self) -> usize {
		self.in_flight.load(Ordering::SeqCst)
	}

	pub fn max_in_flight(&self) -> usize {
		self.max_in_flight.load(Ordering::SeqCst)
	}
}

/// Waits until `cond` holds, yielding to the runtime in between.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
	for _ in 0..500 {
		if cond() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(2)).await;
	}
	panic!("condition not reached");
}

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
