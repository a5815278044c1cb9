//! Error types for data sources.

use thiserror::Error;

use crate::source::SourceState;

/// Errors detected before anything goes over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
	/// A `{placeholder}` in the URI template has no parameter.
	#[error("unresolved placeholder '{{{name}}}' in '{template}'")]
	UnresolvedPlaceholder {
		/// The placeholder name.
		name: String,
		/// The template being resolved.
		template: String,
	},

	/// A parameter resolved to an empty string.
	#[error("parameter '{name}' is empty in '{template}'")]
	EmptyParameter {
		/// The parameter name.
		name: String,
		/// The template being resolved.
		template: String,
	},

	/// A `{` was never closed, or a `}` was never opened.
	#[error("malformed placeholder at byte {offset} in '{template}'")]
	MalformedTemplate {
		/// Byte offset of the offending brace.
		offset: usize,
		/// The template being resolved.
		template: String,
	},

	/// No transport is registered for the URI's protocol.
	#[error("no transport registered for protocol '{0}'")]
	UnknownProtocol(String),
}

/// Failure reported by a [`Transport`](crate::Transport) read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
	/// Connection-level failure.
	#[error("network failure: {0}")]
	Network(String),

	/// The request exceeded the client-side deadline.
	#[error("request timed out")]
	Timeout,

	/// The server answered with a non-success status.
	#[error("status {code}: {message}")]
	Status {
		/// HTTP status code.
		code: u16,
		/// Response body or reason phrase.
		message: String,
	},

	/// The response could not be decoded.
	#[error("malformed response: {0}")]
	Malformed(String),

	/// The read observed its cancellation signal.
	#[error("read cancelled")]
	Cancelled,
}

impl TransportError {
	/// Whether the read should be retried with the same cursor.
	///
	/// Network failures, timeouts, 5xx and 429 are transient. Other 4xx and
	/// malformed payloads are application errors and end the open period.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Network(_) | Self::Timeout => true,
			Self::Status { code, .. } => *code >= 500 || *code == 429,
			Self::Malformed(_) | Self::Cancelled => false,
		}
	}
}

/// Errors returned by the data source API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
	/// The descriptor or manager setup is invalid.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The operation is not legal in the source's current state.
	#[error("cannot {op} a source that is {from}")]
	InvalidTransition {
		/// State the source was in.
		from: SourceState,
		/// Attempted operation.
		op: &'static str,
	},
}

/// Result type for data source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
