//! Restartable, cancelable streams of blocking reads with cursor tracking.
//!
//! A [`DataSourceManager`] resolves a [`Descriptor`] to a [`ResourceUri`],
//! picks the [`Transport`] registered for its protocol and returns a
//! [`Source`]. The source keeps exactly one read in flight, advances its
//! [`Cursor`] on every successful read and immediately asks for anything
//! newer. Transient failures are retried with the same cursor under a
//! [`RetryPolicy`]; application failures close the source until
//! [`Source::reopen`].

mod backoff;
pub mod blocking;
mod cursor;
mod descriptor;
mod error;
mod manager;
mod registry;
pub mod settings;
mod source;
pub mod storage;
mod transport;

pub use backoff::RetryPolicy;
pub use blocking::BlockingQuery;
pub use cursor::Cursor;
pub use descriptor::{Descriptor, ResourceUri};
pub use error::{ConfigError, Result, SourceError, TransportError};
pub use manager::{DataSourceManager, DataSourceManagerBuilder};
pub use meshview_worker::{CancellationToken, EventReceiver, ListenerId};
pub use registry::SourceRecord;
pub use settings::{SettingsError, SourceSettings};
pub use source::{Source, SourceEvent, SourceState};
pub use storage::{MemoryStorage, SettingsStore, Storage};
pub use transport::{Page, Transport};
