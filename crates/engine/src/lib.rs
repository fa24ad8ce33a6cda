//! tantivy glue for Quarry
//!
//! This crate owns everything that touches the embedded engine directly but is
//! shared by the write and read paths:
//! - config: `quarry.toml` and the typed settings derived from it
//! - document: `Document` ↔ `TantivyDocument` conversion against a schema
//! - reader: reader manager and scoped searcher leases
//! - refresh: background thread adopting the latest commit
//! - snapshot: retained commit snapshots and their directory factories
//! - writer: writer construction from settings

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod document;
pub mod reader;
pub mod refresh;
pub mod snapshot;
pub mod writer;

pub use config::{ConfigError, HighlightSettings, QuarryConfig, QuerySettings, CONFIG_FILE_NAME};
pub use document::{from_tantivy_document, to_tantivy_document};
pub use reader::{ReaderManager, SearcherLease};
pub use refresh::ReaderRefresher;
pub use snapshot::{
    MmapSnapshotDirectoryFactory, RamSnapshotDirectoryFactory, RetainedSnapshot,
    SnapshotDirectoryFactory,
};
pub use writer::WriterSettings;

use quarry_core::error::BoxError;
use quarry_core::EngineIoError;

/// Result type alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineIoError>;

/// Adapter for `map_err` that wraps an engine failure with its operation
pub fn engine_err<E>(context: &'static str) -> impl FnOnce(E) -> EngineIoError
where
    E: Into<BoxError>,
{
    move |e| EngineIoError::new(context, e)
}
