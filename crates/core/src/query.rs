//! Query description
//!
//! A `Query` is validated when it is built: an empty query string, a zero page
//! size or an empty cursor mark never reach a service. Offsets are `usize`, so a
//! negative offset cannot be expressed at all.
//!
//! # Example
//!
//! ```
//! use quarry_core::{Field, Query, Sort};
//!
//! let query = Query::builder("body:solr")
//!     .rows(5)
//!     .facet_field(Field::from("color"))
//!     .sort(Sort::desc("create_date"))
//!     .build()
//!     .unwrap();
//! assert_eq!(query.rows(), 5);
//! assert_eq!(query.offset(), 0);
//! ```

use crate::error::ValidationError;
use crate::field::Field;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Query parts
// ============================================================================

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Smallest first
    #[default]
    Asc,
    /// Largest first
    Desc,
}

/// One sort clause
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    /// Field to sort on
    pub field: Field,
    /// Direction
    pub order: SortOrder,
}

impl Sort {
    /// Ascending clause
    pub fn asc(field: impl Into<Field>) -> Self {
        Sort {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    /// Descending clause
    pub fn desc(field: impl Into<Field>) -> Self {
        Sort {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Exact-value filter used for drill-down
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterQuery {
    /// Field to filter on
    pub field: Field,
    /// Required value
    pub value: String,
}

impl FilterQuery {
    /// Create a filter
    pub fn new(field: impl Into<Field>, value: impl Into<String>) -> Self {
        FilterQuery {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Default boolean operator between query terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Operator {
    /// Every term must match
    #[default]
    And,
    /// Any term may match
    Or,
}

/// Transport hint for remote backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RequestMethod {
    /// Parameters in the URL
    #[default]
    Get,
    /// Parameters in the body
    Post,
}

/// How the requested page is located
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pagination {
    /// Skip this many ranked results
    Offset(usize),
    /// Resume after the position encoded in this token (`*` for the first page)
    Cursor(String),
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination::Offset(Query::DEFAULT_OFFSET)
    }
}

// ============================================================================
// Query
// ============================================================================

/// A validated query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    query: String,
    pagination: Pagination,
    rows: usize,
    fields: Vec<Field>,
    highlight_fields: Vec<Field>,
    highlight_tags: Option<(String, String)>,
    facet_fields: Vec<Field>,
    filter_queries: Vec<FilterQuery>,
    sorts: Vec<Sort>,
    default_operator: Operator,
    params: BTreeMap<String, String>,
    request_method: RequestMethod,
}

impl Query {
    /// Query string matching every document
    pub const ALL: &'static str = "*:*";

    /// Default page size
    pub const DEFAULT_ROWS: usize = 10;

    /// Default offset
    pub const DEFAULT_OFFSET: usize = 0;

    /// Start building a query
    pub fn builder(query: impl Into<String>) -> QueryBuilder {
        QueryBuilder::new(query)
    }

    /// Query string
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Pagination strategy
    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    /// Requested offset; 0 in cursor mode
    pub fn offset(&self) -> usize {
        match self.pagination {
            Pagination::Offset(offset) => offset,
            Pagination::Cursor(_) => 0,
        }
    }

    /// Cursor token, if paginating by cursor
    pub fn cursor_mark(&self) -> Option<&str> {
        match &self.pagination {
            Pagination::Cursor(token) => Some(token),
            Pagination::Offset(_) => None,
        }
    }

    /// Page size
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Fields to return (empty means all stored fields)
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Fields to highlight
    pub fn highlight_fields(&self) -> &[Field] {
        &self.highlight_fields
    }

    /// Pre and post tags overriding the service's highlight tags
    pub fn highlight_tags(&self) -> Option<(&str, &str)> {
        self.highlight_tags
            .as_ref()
            .map(|(pre, post)| (pre.as_str(), post.as_str()))
    }

    /// Fields to facet on
    pub fn facet_fields(&self) -> &[Field] {
        &self.facet_fields
    }

    /// Drill-down filters, ANDed
    pub fn filter_queries(&self) -> &[FilterQuery] {
        &self.filter_queries
    }

    /// Sort clauses, most significant first
    pub fn sorts(&self) -> &[Sort] {
        &self.sorts
    }

    /// Default operator between terms
    pub fn default_operator(&self) -> Operator {
        self.default_operator
    }

    /// Free-form backend parameters
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Transport hint
    pub fn request_method(&self) -> RequestMethod {
        self.request_method
    }

    /// Whether every stored field should be returned
    pub fn returns_all_fields(&self) -> bool {
        self.fields.is_empty() || self.fields.iter().any(Field::is_all)
    }

    /// Copy of this query resuming from another cursor token
    pub fn with_cursor_mark(&self, token: impl Into<String>) -> Result<Query, ValidationError> {
        let token = token.into();
        if token.is_empty() {
            return Err(ValidationError::EmptyCursorMark);
        }
        let mut next = self.clone();
        next.pagination = Pagination::Cursor(token);
        Ok(next)
    }
}

// ============================================================================
// QueryBuilder
// ============================================================================

/// Builder for [`Query`]; `build` enforces the invariants
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    inner: Query,
}

impl QueryBuilder {
    fn new(query: impl Into<String>) -> Self {
        QueryBuilder {
            inner: Query {
                query: query.into(),
                pagination: Pagination::default(),
                rows: Query::DEFAULT_ROWS,
                fields: Vec::new(),
                highlight_fields: Vec::new(),
                highlight_tags: None,
                facet_fields: Vec::new(),
                filter_queries: Vec::new(),
                sorts: Vec::new(),
                default_operator: Operator::default(),
                params: BTreeMap::new(),
                request_method: RequestMethod::default(),
            },
        }
    }

    /// Paginate by offset
    pub fn offset(mut self, offset: usize) -> Self {
        self.inner.pagination = Pagination::Offset(offset);
        self
    }

    /// Paginate by cursor; use `"*"` for the first page
    pub fn cursor_mark(mut self, token: impl Into<String>) -> Self {
        self.inner.pagination = Pagination::Cursor(token.into());
        self
    }

    /// Page size
    pub fn rows(mut self, rows: usize) -> Self {
        self.inner.rows = rows;
        self
    }

    /// Add a return field
    pub fn field(mut self, field: impl Into<Field>) -> Self {
        self.inner.fields.push(field.into());
        self
    }

    /// Add a highlight field
    pub fn highlight_field(mut self, field: impl Into<Field>) -> Self {
        self.inner.highlight_fields.push(field.into());
        self
    }

    /// Wrap highlighted matches in `pre` and `post` for this query only
    pub fn highlight_tags(mut self, pre: impl Into<String>, post: impl Into<String>) -> Self {
        self.inner.highlight_tags = Some((pre.into(), post.into()));
        self
    }

    /// Add a facet field
    pub fn facet_field(mut self, field: impl Into<Field>) -> Self {
        self.inner.facet_fields.push(field.into());
        self
    }

    /// Add a drill-down filter
    pub fn filter(mut self, filter: FilterQuery) -> Self {
        self.inner.filter_queries.push(filter);
        self
    }

    /// Append a sort clause
    pub fn sort(mut self, sort: Sort) -> Self {
        self.inner.sorts.push(sort);
        self
    }

    /// Default operator
    pub fn default_operator(mut self, operator: Operator) -> Self {
        self.inner.default_operator = operator;
        self
    }

    /// Add a backend parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.params.insert(key.into(), value.into());
        self
    }

    /// Transport hint
    pub fn request_method(mut self, method: RequestMethod) -> Self {
        self.inner.request_method = method;
        self
    }

    /// Validate and produce the query
    pub fn build(self) -> Result<Query, ValidationError> {
        if self.inner.query.trim().is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        if self.inner.rows == 0 {
            return Err(ValidationError::ZeroRows);
        }
        if let Pagination::Cursor(token) = &self.inner.pagination {
            if token.is_empty() {
                return Err(ValidationError::EmptyCursorMark);
            }
        }
        Ok(self.inner)
    }
}
