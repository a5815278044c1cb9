use async_trait::async_trait;
use meshview_worker::CancellationToken;
use serde_json::Value;

use crate::blocking::BlockingQuery;
use crate::cursor::Cursor;
use crate::descriptor::ResourceUri;
use crate::error::TransportError;

/// One successful blocking read.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
	pub payload: Value,
	/// Raw index reported by the server. May be 0.
	pub index: u64,
}

impl Page {
	pub fn new(payload: Value, index: u64) -> Self {
		Self { payload, index }
	}
}

/// Performs blocking reads for one protocol.
///
/// `read` must resolve once data newer than `query.index` exists or the
/// server side wait elapses; in the latter case it returns the same
/// payload and index again. `query.wait` bounds how long the server may
/// hold the read. Implementations should stop early and return
/// [`TransportError::Cancelled`] once `cancel` fires, but the source does
/// not rely on it: a read still pending at cancellation is dropped.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
	async fn read(&self, uri: &ResourceUri, query: BlockingQuery, cancel: CancellationToken) -> Result<Page, TransportError>;

	/// Answers a read without suspending, if this transport can.
	///
	/// Sources call this once when an open period starts so that local
	/// transports deliver their first message before `open` returns.
	fn read_now(&self, _uri: &ResourceUri, _cursor: Option<Cursor>) -> Option<Result<Page, TransportError>> {
		None
	}
}
