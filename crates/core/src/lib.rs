//! Core types and traits for Quarry
//!
//! This crate defines the engine-neutral model shared by the write and read paths:
//! - Field / Entity: named index fields and the things that get indexed
//! - Document / FieldValue: the stored-field multimap transformers produce and consume
//! - Query: a validated, normalized query description
//! - QueryResultPage / FacetResult / Highlight: the normalized result page
//! - Traits: the capabilities callers inject (transformers, sort-type lookup)
//! - Error: the error taxonomy shared by every layer

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod error;
pub mod field;
pub mod query;
pub mod result;
pub mod traits;

pub use document::{Document, FieldValue};
pub use error::{
    EngineIoError, IndexError, IndexResult, QueryError, QueryResult, StateError, TransformError,
    ValidationError,
};
pub use field::{Entity, Field};
pub use query::{FilterQuery, Operator, Pagination, Query, RequestMethod, Sort, SortOrder};
pub use result::{FacetCount, FacetResult, Highlight, QueryResultPage, ResultEntry};
pub use traits::{DocumentTransformer, IndexTransformer, SortType, SortTypeResolver};
