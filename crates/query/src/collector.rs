//! Collectors for ranked pages and facet counts
//!
//! `RankedCollector` keeps the best `limit` hits in `RankOrder`, optionally
//! only those strictly after a resumption point, while counting every match.
//! `FacetCollector` counts string fast-field values over the same matches.
//! Both read fast fields through closures built per segment.

use crate::cursor::SortValue;
use crate::sort::{RankOrder, RankedHit, SortKey};
use quarry_core::{FacetCount, FacetResult, Field, SortType};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tantivy::collector::{Collector, SegmentCollector};
use tantivy::{DocId, Score, SegmentOrdinal, SegmentReader};

/// Values kept per facet field
pub const FACET_LIMIT: usize = 10;

type ValueReader = Box<dyn Fn(DocId) -> SortValue + Send + Sync>;

// ============================================================================
// RankedCollector
// ============================================================================

/// Best hits plus the total number of matches
#[derive(Debug, Default)]
pub struct RankedHits {
    /// Hits in rank order, at most `limit`
    pub hits: Vec<RankedHit>,
    /// Every matching document, including those before the resumption point
    pub total: usize,
}

/// Collects the top `limit` hits in a `RankOrder`
pub struct RankedCollector {
    order: Arc<RankOrder>,
    limit: usize,
    after: Option<Arc<RankedHit>>,
}

impl RankedCollector {
    /// Collect the first `limit` hits
    pub fn new(order: RankOrder, limit: usize) -> Self {
        RankedCollector {
            order: Arc::new(order),
            limit,
            after: None,
        }
    }

    /// Only keep hits ranked strictly after `after`
    pub fn after(mut self, after: RankedHit) -> Self {
        self.after = Some(Arc::new(after));
        self
    }
}

impl Collector for RankedCollector {
    type Fruit = RankedHits;
    type Child = RankedSegmentCollector;

    fn for_segment(
        &self,
        segment_local_id: SegmentOrdinal,
        segment: &SegmentReader,
    ) -> tantivy::Result<RankedSegmentCollector> {
        let readers = match self.order.as_ref() {
            RankOrder::Relevance => Vec::new(),
            RankOrder::Fields(keys) => keys
                .iter()
                .map(|key| value_reader(segment, key))
                .collect::<tantivy::Result<Vec<_>>>()?,
        };
        Ok(RankedSegmentCollector {
            order: Arc::clone(&self.order),
            limit: self.limit,
            after: self.after.clone(),
            shard: segment_local_id,
            readers,
            hits: Vec::new(),
            total: 0,
        })
    }

    fn requires_scoring(&self) -> bool {
        true
    }

    fn merge_fruits(&self, segment_fruits: Vec<RankedHits>) -> tantivy::Result<RankedHits> {
        let mut merged = RankedHits::default();
        for fruit in segment_fruits {
            merged.total += fruit.total;
            merged.hits.extend(fruit.hits);
        }
        merged.hits.sort_by(|a, b| self.order.compare(a, b));
        merged.hits.truncate(self.limit);
        Ok(merged)
    }
}

/// Per-segment half of [`RankedCollector`]
pub struct RankedSegmentCollector {
    order: Arc<RankOrder>,
    limit: usize,
    after: Option<Arc<RankedHit>>,
    shard: SegmentOrdinal,
    readers: Vec<ValueReader>,
    hits: Vec<RankedHit>,
    total: usize,
}

impl RankedSegmentCollector {
    fn prune(&mut self) {
        let order = &self.order;
        self.hits.sort_by(|a, b| order.compare(a, b));
        self.hits.truncate(self.limit);
    }
}

impl SegmentCollector for RankedSegmentCollector {
    type Fruit = RankedHits;

    fn collect(&mut self, doc: DocId, score: Score) {
        self.total += 1;
        if self.limit == 0 {
            return;
        }
        let hit = RankedHit {
            score,
            shard: self.shard,
            doc,
            values: self.readers.iter().map(|read| read(doc)).collect(),
        };
        if let Some(after) = &self.after {
            if self.order.compare(&hit, after) != Ordering::Greater {
                return;
            }
        }
        self.hits.push(hit);
        if self.hits.len() >= self.limit.saturating_mul(2) {
            self.prune();
        }
    }

    fn harvest(mut self) -> RankedHits {
        self.prune();
        RankedHits {
            hits: self.hits,
            total: self.total,
        }
    }
}

fn value_reader(segment: &SegmentReader, key: &SortKey) -> tantivy::Result<ValueReader> {
    let fast_fields = segment.fast_fields();
    let name = key.field.name();
    let reader: ValueReader = match key.sort_type {
        SortType::I64 => match fast_fields.i64(name) {
            Ok(column) => Box::new(move |doc: DocId| {
                column.first(doc).map_or(SortValue::Null, SortValue::I64)
            }),
            Err(_) => {
                let column = fast_fields.date(name)?;
                Box::new(move |doc: DocId| {
                    column
                        .first(doc)
                        .map_or(SortValue::Null, |dt| SortValue::I64(dt.into_timestamp_secs()))
                })
            }
        },
        SortType::U64 => {
            let column = fast_fields.u64(name)?;
            Box::new(move |doc: DocId| column.first(doc).map_or(SortValue::Null, SortValue::U64))
        }
        SortType::F64 => {
            let column = fast_fields.f64(name)?;
            Box::new(move |doc: DocId| column.first(doc).map_or(SortValue::Null, SortValue::F64))
        }
        SortType::Str => match fast_fields.str(name)? {
            Some(column) => Box::new(move |doc: DocId| {
                let mut value = String::new();
                match column.term_ords(doc).next() {
                    Some(ord) if column.ord_to_str(ord, &mut value).unwrap_or(false) => {
                        SortValue::Str(value)
                    }
                    _ => SortValue::Null,
                }
            }),
            None => Box::new(|_: DocId| SortValue::Null),
        },
    };
    Ok(reader)
}

// ============================================================================
// FacetCollector
// ============================================================================

type OrdReader = Box<dyn Fn(DocId, &mut Vec<u64>) + Send + Sync>;
type OrdResolver = Box<dyn Fn(u64) -> Option<String> + Send + Sync>;

/// Counts string fast-field values per requested field
pub struct FacetCollector {
    fields: Vec<Field>,
}

impl FacetCollector {
    /// Count values of each of `fields`
    pub fn new(fields: Vec<Field>) -> Self {
        FacetCollector { fields }
    }

    /// Top `FACET_LIMIT` values per field, by count then value
    pub fn top_counts(&self, counts: Vec<HashMap<String, u64>>) -> Vec<FacetResult> {
        self.fields
            .iter()
            .zip(counts)
            .map(|(field, counts)| {
                let mut counts: Vec<FacetCount> = counts
                    .into_iter()
                    .map(|(value, count)| FacetCount { value, count })
                    .collect();
                counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
                counts.truncate(FACET_LIMIT);
                FacetResult {
                    field: field.clone(),
                    counts,
                }
            })
            .collect()
    }
}

impl Collector for FacetCollector {
    type Fruit = Vec<HashMap<String, u64>>;
    type Child = FacetSegmentCollector;

    fn for_segment(
        &self,
        _segment_local_id: SegmentOrdinal,
        segment: &SegmentReader,
    ) -> tantivy::Result<FacetSegmentCollector> {
        let mut columns = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let column = match segment.fast_fields().str(field.name())? {
                Some(column) => {
                    let num_terms = column.num_terms();
                    let column = Arc::new(column);
                    let resolver = Arc::clone(&column);
                    let ords: OrdReader = Box::new(move |doc: DocId, out: &mut Vec<u64>| {
                        out.extend(column.term_ords(doc))
                    });
                    let resolve: OrdResolver = Box::new(move |ord: u64| {
                        let mut value = String::new();
                        match resolver.ord_to_str(ord, &mut value) {
                            Ok(true) => Some(value),
                            _ => None,
                        }
                    });
                    Some(FacetColumn {
                        ords,
                        resolve,
                        counts: vec![0; num_terms as usize],
                    })
                }
                None => None,
            };
            columns.push(column);
        }
        Ok(FacetSegmentCollector {
            columns,
            scratch: Vec::new(),
        })
    }

    fn requires_scoring(&self) -> bool {
        false
    }

    fn merge_fruits(
        &self,
        segment_fruits: Vec<Vec<HashMap<String, u64>>>,
    ) -> tantivy::Result<Vec<HashMap<String, u64>>> {
        let mut merged: Vec<HashMap<String, u64>> = vec![HashMap::new(); self.fields.len()];
        for fruit in segment_fruits {
            for (total, counts) in merged.iter_mut().zip(fruit) {
                for (value, count) in counts {
                    *total.entry(value).or_insert(0) += count;
                }
            }
        }
        Ok(merged)
    }
}

struct FacetColumn {
    ords: OrdReader,
    resolve: OrdResolver,
    counts: Vec<u64>,
}

/// Per-segment half of [`FacetCollector`]
pub struct FacetSegmentCollector {
    columns: Vec<Option<FacetColumn>>,
    scratch: Vec<u64>,
}

impl SegmentCollector for FacetSegmentCollector {
    type Fruit = Vec<HashMap<String, u64>>;

    fn collect(&mut self, doc: DocId, _score: Score) {
        for column in self.columns.iter_mut().flatten() {
            self.scratch.clear();
            (column.ords)(doc, &mut self.scratch);
            self.scratch.dedup();
            for &ord in &self.scratch {
                if let Some(count) = column.counts.get_mut(ord as usize) {
                    *count += 1;
                }
            }
        }
    }

    fn harvest(self) -> Vec<HashMap<String, u64>> {
        self.columns
            .into_iter()
            .map(|column| {
                let mut counts = HashMap::new();
                if let Some(column) = column {
                    for (ord, &count) in column.counts.iter().enumerate() {
                        if count == 0 {
                            continue;
                        }
                        if let Some(value) = (column.resolve)(ord as u64) {
                            counts.insert(value, count);
                        }
                    }
                }
                counts
            })
            .collect()
    }
}
