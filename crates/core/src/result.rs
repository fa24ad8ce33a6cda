//! Normalized result pages

use crate::field::Field;
use serde::{Deserialize, Serialize};

/// Highlighted snippets for one field of one hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    field: Field,
    snippets: Vec<String>,
}

impl Highlight {
    /// Create a highlight; `None` when there are no snippets
    pub fn new(field: Field, snippets: Vec<String>) -> Option<Self> {
        if snippets.is_empty() {
            None
        } else {
            Some(Highlight { field, snippets })
        }
    }

    /// Highlighted field
    pub fn field(&self) -> &Field {
        &self.field
    }

    /// Snippets, best first; never empty
    pub fn snippets(&self) -> &[String] {
        &self.snippets
    }
}

/// One hit on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry<R> {
    /// Transformed document
    pub value: R,
    /// Highlights, one per field that produced snippets
    pub highlights: Vec<Highlight>,
}

impl<R> ResultEntry<R> {
    /// Highlight for `field`, if any
    pub fn highlight(&self, field: &str) -> Option<&Highlight> {
        self.highlights.iter().find(|h| h.field.name() == field)
    }
}

/// A value and how many matching documents carry it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    /// Facet value
    pub value: String,
    /// Number of matching documents
    pub count: u64,
}

/// Top facet counts for one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetResult {
    /// Faceted field
    pub field: Field,
    /// Counts ordered by count descending, then value ascending
    pub counts: Vec<FacetCount>,
}

impl FacetResult {
    /// Count for `value`, if it made the top list
    pub fn count_of(&self, value: &str) -> Option<u64> {
        self.counts
            .iter()
            .find(|c| c.value == value)
            .map(|c| c.count)
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResultPage<R> {
    /// Requested offset (0 in cursor mode)
    pub offset: usize,
    /// Requested page size
    pub rows: usize,
    /// Matches over the whole result set, independent of the page
    pub total_hits: usize,
    /// Token for the next page in cursor mode
    pub next_cursor_mark: Option<String>,
    /// Hits on this page, in rank order
    pub results: Vec<ResultEntry<R>>,
    /// Facets over the whole result set
    pub facets: Vec<FacetResult>,
}

impl<R> QueryResultPage<R> {
    /// Facet result for `field`, if it was requested
    pub fn facet(&self, field: &str) -> Option<&FacetResult> {
        self.facets.iter().find(|f| f.field.name() == field)
    }

    /// Iterate the transformed values
    pub fn values(&self) -> impl Iterator<Item = &R> {
        self.results.iter().map(|e| &e.value)
    }

    /// Number of hits on this page
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether this page has no hits
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_requires_snippets() {
        assert!(Highlight::new(Field::from("body"), vec![]).is_none());
        let h = Highlight::new(Field::from("body"), vec!["<strong>x</strong>".into()]).unwrap();
        assert_eq!(h.snippets().len(), 1);
    }

    #[test]
    fn test_facet_lookup() {
        let page: QueryResultPage<String> = QueryResultPage {
            offset: 0,
            rows: 10,
            total_hits: 3,
            next_cursor_mark: None,
            results: vec![],
            facets: vec![FacetResult {
                field: Field::from("color"),
                counts: vec![FacetCount {
                    value: "BLUE".into(),
                    count: 2,
                }],
            }],
        };
        assert_eq!(page.facet("color").and_then(|f| f.count_of("BLUE")), Some(2));
        assert!(page.facet("size").is_none());
        assert!(page.is_empty());
    }
}
