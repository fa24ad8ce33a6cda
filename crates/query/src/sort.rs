//! Sort resolution and hit ordering

use crate::cursor::{SortPosition, SortValue};
use quarry_core::{Field, Pagination, Query, QueryError, QueryResult, Sort, SortOrder, SortType};
use quarry_core::{SortTypeResolver, ValidationError};
use std::cmp::Ordering;
use tantivy::schema::{FieldType, Schema};
use tantivy::{DocId, Score, SegmentOrdinal};

/// A sort clause with its resolved value type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Field to read from the fast-field store
    pub field: Field,
    /// Direction
    pub order: SortOrder,
    /// How values compare
    pub sort_type: SortType,
}

/// How hits are ranked
///
/// Ties always break on `(shard, doc)` ascending, so the order is total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RankOrder {
    /// Score descending
    Relevance,
    /// Sort keys, most significant first
    Fields(Vec<SortKey>),
}

impl RankOrder {
    /// Resolve the sort clauses of `query` against `schema`.
    ///
    /// In cursor mode a non-empty sort must end on `unique_key`.
    pub fn resolve(
        query: &Query,
        schema: &Schema,
        resolver: &dyn SortTypeResolver,
        unique_key: &Field,
    ) -> QueryResult<RankOrder> {
        let sorts = query.sorts();
        if sorts.is_empty() {
            return Ok(RankOrder::Relevance);
        }
        if let Pagination::Cursor(_) = query.pagination() {
            check_total_order(sorts, unique_key)?;
        }
        let keys = sorts
            .iter()
            .map(|sort| {
                let sort_type = resolver.sort_type(&sort.field);
                check_sortable(schema, &sort.field, sort_type)?;
                Ok(SortKey {
                    field: sort.field.clone(),
                    order: sort.order,
                    sort_type,
                })
            })
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(RankOrder::Fields(keys))
    }

    /// Number of sort values a hit carries
    pub fn key_count(&self) -> usize {
        match self {
            RankOrder::Relevance => 0,
            RankOrder::Fields(keys) => keys.len(),
        }
    }

    /// `Less` when `a` ranks before `b`
    pub fn compare(&self, a: &RankedHit, b: &RankedHit) -> Ordering {
        let primary = match self {
            RankOrder::Relevance => b.score.total_cmp(&a.score),
            RankOrder::Fields(keys) => keys
                .iter()
                .zip(a.values.iter().zip(b.values.iter()))
                .map(|(key, (va, vb))| match key.order {
                    SortOrder::Asc => va.cmp(vb),
                    SortOrder::Desc => vb.cmp(va),
                })
                .find(|ord| ord.is_ne())
                .unwrap_or(Ordering::Equal),
        };
        primary
            .then(a.shard.cmp(&b.shard))
            .then(a.doc.cmp(&b.doc))
    }
}

fn check_total_order(sorts: &[Sort], unique_key: &Field) -> Result<(), ValidationError> {
    match sorts.last() {
        Some(last) if &last.field == unique_key => Ok(()),
        Some(last) => Err(ValidationError::CursorRequiresUniqueSort {
            expected: unique_key.to_string(),
            found: last.field.to_string(),
        }),
        None => Ok(()),
    }
}

fn check_sortable(schema: &Schema, field: &Field, sort_type: SortType) -> QueryResult<()> {
    let handle = schema
        .get_field(field.name())
        .map_err(|_| QueryError::invalid_field(field.name(), "not in the index schema"))?;
    let entry = schema.get_field_entry(handle);
    if !entry.is_fast() {
        return Err(QueryError::invalid_field(
            field.name(),
            "sort fields must be fast fields",
        ));
    }
    let compatible = matches!(
        (entry.field_type(), sort_type),
        (FieldType::Str(_), SortType::Str)
            | (FieldType::I64(_), SortType::I64)
            | (FieldType::Date(_), SortType::I64)
            | (FieldType::U64(_), SortType::U64)
            | (FieldType::F64(_), SortType::F64)
    );
    if !compatible {
        return Err(QueryError::invalid_field(
            field.name(),
            format!("field type does not support {:?} sorting", sort_type),
        ));
    }
    Ok(())
}

/// A collected hit
#[derive(Debug, Clone, PartialEq)]
pub struct RankedHit {
    /// Relevance score
    pub score: Score,
    /// Segment ordinal
    pub shard: SegmentOrdinal,
    /// Segment-local doc id
    pub doc: DocId,
    /// One value per sort key
    pub values: Vec<SortValue>,
}

impl RankedHit {
    /// Resumption point for this hit
    pub fn position(&self) -> SortPosition {
        SortPosition {
            score: self.score,
            doc: self.doc,
            shard: self.shard,
            sort_values: self.values.clone(),
        }
    }
}

impl From<SortPosition> for RankedHit {
    fn from(position: SortPosition) -> Self {
        RankedHit {
            score: position.score,
            shard: position.shard,
            doc: position.doc,
            values: position.sort_values,
        }
    }
}
