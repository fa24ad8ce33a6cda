//! Read side of Quarry
//!
//! Queries run through a `QueryService`: the query string is translated to a
//! tantivy query, hits are ranked by relevance or by typed sort keys, and each
//! page comes back with facet counts, highlights and, in cursor mode, an opaque
//! token for the next page.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collector;
pub mod cursor;
pub mod highlight;
pub mod retrieval;
pub mod service;
pub mod sort;
pub mod transformer;

pub use collector::{FacetCollector, RankedCollector, RankedHits, FACET_LIMIT};
pub use cursor::{CursorError, CursorMark, SortPosition, SortValue};
pub use highlight::Highlighter;
pub use retrieval::{RetrievalService, TantivyRetrievalService};
pub use service::{QueryService, TantivyQueryService};
pub use sort::{RankOrder, RankedHit, SortKey};
pub use transformer::{FacetsConfig, QueryTransformer, StandardQueryTransformer};
