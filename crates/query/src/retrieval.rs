//! Single-result lookup

use crate::service::{QueryService, TantivyQueryService};
use quarry_core::{Query, QueryError, QueryResult};

/// Finds at most one entity for a query
pub trait RetrievalService<E>: Send + Sync {
    /// The single match, `None` when nothing matches
    ///
    /// More than one match is `QueryError::MultipleResults`.
    fn find(&self, query: &Query) -> QueryResult<Option<E>>;
}

/// `RetrievalService` backed by a `TantivyQueryService`
pub struct TantivyRetrievalService<E> {
    service: TantivyQueryService<E>,
}

impl<E> TantivyRetrievalService<E> {
    /// Lookup through `service`
    pub fn new(service: TantivyQueryService<E>) -> Self {
        TantivyRetrievalService { service }
    }
}

impl<E> RetrievalService<E> for TantivyRetrievalService<E> {
    fn find(&self, query: &Query) -> QueryResult<Option<E>> {
        let page = self.service.search(query)?;
        if page.total_hits > 1 {
            return Err(QueryError::MultipleResults {
                count: page.total_hits,
            });
        }
        Ok(page.results.into_iter().next().map(|entry| entry.value))
    }
}
