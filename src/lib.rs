//! Quarry - transactional indexing and paginated search over tantivy
//!
//! Quarry wraps an embedded tantivy index with two services:
//! - a write side ([`TantivyIndexer`], [`TantivyTransactionalIndexer`]) that
//!   indexes caller entities and can roll back to the state a transaction
//!   started from
//! - a read side ([`TantivyQueryService`], [`TantivyRetrievalService`]) with
//!   offset or cursor pagination, facet counts and highlighting
//!
//! # Quick Start
//!
//! ```ignore
//! use quarry::{Query, QueryService, Sort, TantivyQueryService};
//!
//! let service = TantivyQueryService::new(index, readers, to_record, sort_types, settings);
//! let page = service.search(&Query::builder("solr").sort(Sort::desc("create_date")).build()?)?;
//! for record in page.values() {
//!     println!("{record:?}");
//! }
//! ```
//!
//! Callers own the mapping between their types and documents through
//! [`IndexTransformer`], [`DocumentTransformer`] and [`SortTypeResolver`].

pub use quarry_core::*;
pub use quarry_engine::{
    ConfigError, HighlightSettings, MmapSnapshotDirectoryFactory, QuarryConfig, QuerySettings,
    RamSnapshotDirectoryFactory, ReaderManager, ReaderRefresher, SearcherLease,
    SnapshotDirectoryFactory, WriterSettings, CONFIG_FILE_NAME,
};
pub use quarry_index::{
    Indexer, TantivyIndexer, TantivyTransactionalIndexer, TransactionState, TransactionalIndexer,
};
pub use quarry_query::{
    CursorError, CursorMark, FacetsConfig, QueryService, QueryTransformer, RetrievalService,
    StandardQueryTransformer, TantivyQueryService, TantivyRetrievalService,
};
