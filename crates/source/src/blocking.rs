//! Helpers for HTTP transports speaking the blocking-query protocol.
//!
//! A blocking read passes the last seen index as `?index=` and an upper
//! bound on how long the server may hold the request as `?wait=`. The
//! server answers with the new index in the [`INDEX_HEADER`] header.

use std::time::Duration;

use crate::cursor::Cursor;
use crate::error::TransportError;

/// Response header carrying the resource index.
pub const INDEX_HEADER: &str = "X-Consul-Index";

/// Query parameters for one blocking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockingQuery {
	pub index: Option<Cursor>,
	pub wait: Option<Duration>,
}

impl BlockingQuery {
	pub fn new(index: Option<Cursor>, wait: Option<Duration>) -> Self {
		Self { index, wait }
	}

	/// Appends the query parameters to `uri`, keeping any existing query.
	///
	/// Without an index the read is a plain GET and `wait` is omitted.
	pub fn apply(&self, uri: &str) -> String {
		let Some(index) = self.index else {
			return uri.to_owned();
		};
		let mut query = url::form_urlencoded::Serializer::new(String::new());
		query.append_pair("index", &index.get().to_string());
		if let Some(wait) = self.wait {
			query.append_pair("wait", &format_wait(wait));
		}
		let sep = if uri.contains('?') { '&' } else { '?' };
		format!("{uri}{sep}{}", query.finish())
	}
}

/// Formats a wait duration the way the server parses it: `10m`, `30s`, `250ms`.
pub fn format_wait(wait: Duration) -> String {
	let millis = wait.as_millis();
	if millis % 60_000 == 0 && millis > 0 {
		format!("{}m", millis / 60_000)
	} else if millis % 1_000 == 0 {
		format!("{}s", millis / 1_000)
	} else {
		format!("{millis}ms")
	}
}

/// Parses the [`INDEX_HEADER`] value of a response.
pub fn parse_index_header(value: &str) -> Result<u64, TransportError> {
	value
		.trim()
		.parse::<u64>()
		.map_err(|err| TransportError::Malformed(format!("invalid {INDEX_HEADER} '{value}': {err}")))
}
