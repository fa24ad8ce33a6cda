//! Query execution
//!
//! One search runs against a single leased searcher: the query is translated,
//! the sort resolved, and a ranked collector and a facet collector run in the
//! same pass. Hits are then loaded, highlighted, projected and transformed.

use crate::collector::{FacetCollector, RankedCollector, RankedHits};
use crate::cursor::CursorMark;
use crate::highlight::Highlighter;
use crate::sort::{RankOrder, RankedHit};
use crate::transformer::{QueryTransformer, StandardQueryTransformer};
use quarry_core::{
    DocumentTransformer, Field, Pagination, Query, QueryError, QueryResult, QueryResultPage,
    ResultEntry, SortTypeResolver,
};
use quarry_engine::{
    engine_err, from_tantivy_document, HighlightSettings, QuerySettings, ReaderManager,
};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;
use tantivy::schema::{FieldType, Schema};
use tantivy::{DocAddress, Index, Searcher, TantivyDocument};
use tracing::debug;

/// Runs queries and returns pages of transformed results
pub trait QueryService<R>: Send + Sync {
    /// Execute `query` and return one page
    fn search(&self, query: &Query) -> QueryResult<QueryResultPage<R>>;
}

/// `QueryService` over a tantivy index
pub struct TantivyQueryService<R> {
    index: Index,
    readers: Arc<ReaderManager>,
    documents: Box<dyn DocumentTransformer<R>>,
    sort_types: Box<dyn SortTypeResolver>,
    queries: Box<dyn QueryTransformer>,
    settings: QuerySettings,
}

/// Hits of one page
struct Page {
    hits: Vec<RankedHit>,
    total: usize,
    offset: usize,
}

impl<R> TantivyQueryService<R> {
    /// Service reading through `readers`
    ///
    /// Queries are parsed with a `StandardQueryTransformer` over every indexed
    /// text field until `with_query_transformer` replaces it.
    pub fn new(
        index: Index,
        readers: Arc<ReaderManager>,
        documents: impl DocumentTransformer<R> + 'static,
        sort_types: impl SortTypeResolver + 'static,
        settings: QuerySettings,
    ) -> Self {
        TantivyQueryService {
            index,
            readers,
            documents: Box::new(documents),
            sort_types: Box::new(sort_types),
            queries: Box::new(StandardQueryTransformer::default()),
            settings,
        }
    }

    /// Replace the query transformer
    pub fn with_query_transformer(mut self, queries: impl QueryTransformer + 'static) -> Self {
        self.queries = Box::new(queries);
        self
    }

    /// Settings this service runs with
    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    fn collect(
        &self,
        searcher: &Searcher,
        query: &Query,
        parsed: &dyn tantivy::query::Query,
        order: RankOrder,
    ) -> QueryResult<(Page, Vec<quarry_core::FacetResult>)> {
        let facets = FacetCollector::new(query.facet_fields().to_vec());

        let (ranked, offset) = match query.pagination() {
            Pagination::Offset(offset) => {
                let limit = offset
                    .saturating_add(query.rows())
                    .min(self.settings.max_search_results);
                debug!(target: "quarry::query", offset, limit, "Offset pagination");
                (RankedCollector::new(order, limit), *offset)
            }
            Pagination::Cursor(token) => {
                let key_count = order.key_count();
                let mut collector = RankedCollector::new(order, query.rows());
                if let Some(position) = CursorMark::decode(token)
                    .map_err(|e| QueryError::InvalidCursor(e.to_string()))?
                {
                    if position.sort_values.len() != key_count {
                        return Err(QueryError::InvalidCursor(format!(
                            "cursor carries {} sort values, query sorts on {}",
                            position.sort_values.len(),
                            key_count
                        )));
                    }
                    collector = collector.after(RankedHit::from(position));
                }
                debug!(target: "quarry::query", rows = query.rows(), "Cursor pagination");
                (collector, 0)
            }
        };

        let collectors = (ranked, facets);
        let (RankedHits { hits, total }, counts) = searcher
            .search(parsed, &collectors)
            .map_err(engine_err("execute search"))?;

        let hits = match query.pagination() {
            Pagination::Offset(_) => hits.into_iter().skip(offset).take(query.rows()).collect(),
            Pagination::Cursor(_) => hits,
        };
        Ok((
            Page {
                hits,
                total,
                offset,
            },
            collectors.1.top_counts(counts),
        ))
    }
}

impl<R> QueryService<R> for TantivyQueryService<R> {
    fn search(&self, query: &Query) -> QueryResult<QueryResultPage<R>> {
        let started = Instant::now();
        let searcher = self.readers.acquire();
        let schema = searcher.schema();

        let parsed = self.queries.transform(&self.index, query)?;
        let order = RankOrder::resolve(
            query,
            schema,
            self.sort_types.as_ref(),
            &self.settings.unique_key,
        )?;
        check_facet_fields(schema, query.facet_fields())?;

        let (page, facets) = self.collect(&searcher, query, parsed.as_ref(), order)?;

        let highlight = match query.highlight_tags() {
            Some((pre, post)) => Cow::Owned(HighlightSettings {
                pre_tag: pre.to_string(),
                post_tag: post.to_string(),
                ..self.settings.highlight.clone()
            }),
            None => Cow::Borrowed(&self.settings.highlight),
        };
        let mut highlighter = if query.highlight_fields().is_empty() {
            None
        } else {
            Some(Highlighter::new(&searcher, parsed.as_ref(), &highlight))
        };

        let mut results = Vec::with_capacity(page.hits.len());
        for hit in &page.hits {
            let native: TantivyDocument = searcher
                .doc(DocAddress::new(hit.shard, hit.doc))
                .map_err(engine_err("load stored document"))?;
            let mut doc = from_tantivy_document(schema, &native);

            let highlights = match highlighter.as_mut() {
                Some(h) => h.highlight(query.highlight_fields(), &doc)?,
                None => Vec::new(),
            };
            if !query.returns_all_fields() {
                let fields = query.fields();
                doc.retain_fields(|name| fields.iter().any(|f| f.name() == name));
            }
            results.push(ResultEntry {
                value: self.documents.transform(&doc)?,
                highlights,
            });
        }

        let next_cursor_mark = match query.pagination() {
            Pagination::Offset(_) => None,
            Pagination::Cursor(token) => Some(match page.hits.last() {
                Some(last) => CursorMark::encode(&last.position()),
                None => token.clone(),
            }),
        };

        debug!(
            target: "quarry::query",
            query = query.query(),
            total_hits = page.total,
            returned = results.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Search executed"
        );

        Ok(QueryResultPage {
            offset: page.offset,
            rows: query.rows(),
            total_hits: page.total,
            next_cursor_mark,
            results,
            facets,
        })
    }
}

fn check_facet_fields(schema: &Schema, fields: &[Field]) -> QueryResult<()> {
    for field in fields {
        let handle = schema
            .get_field(field.name())
            .map_err(|_| QueryError::invalid_field(field.name(), "not in the index schema"))?;
        let entry = schema.get_field_entry(handle);
        if !matches!(entry.field_type(), FieldType::Str(_)) || !entry.is_fast() {
            return Err(QueryError::invalid_field(
                field.name(),
                "facet fields must be fast string fields",
            ));
        }
    }
    Ok(())
}
