//! Query string → tantivy query

use quarry_core::{Field, Operator, Query, QueryError, QueryResult};
use std::collections::BTreeSet;
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query as TantivyQuery, QueryParser, TermQuery};
use tantivy::schema::{FieldType, IndexRecordOption};
use tantivy::{Index, Term};

/// Turns a `Query` into an executable tantivy query
pub trait QueryTransformer: Send + Sync {
    /// Build the query to run against `index`
    fn transform(&self, index: &Index, query: &Query) -> QueryResult<Box<dyn TantivyQuery>>;
}

/// Facet dimensions of an index; its presence turns drill-down filters on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetsConfig {
    dimensions: BTreeSet<Field>,
}

impl FacetsConfig {
    /// Config allowing drill-down on `dimensions`
    pub fn new(dimensions: impl IntoIterator<Item = Field>) -> Self {
        FacetsConfig {
            dimensions: dimensions.into_iter().collect(),
        }
    }

    /// Whether `field` is a configured dimension
    pub fn is_dimension(&self, field: &Field) -> bool {
        self.dimensions.contains(field)
    }
}

/// Parses with tantivy's query parser over a set of default fields
///
/// `*:*` and `*` match every document. With a `FacetsConfig`, filters become
/// exact-term clauses ANDed with the parsed query; without one they are
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct StandardQueryTransformer {
    default_fields: Vec<Field>,
    facets: Option<FacetsConfig>,
}

impl StandardQueryTransformer {
    /// Search `default_fields` when a term names no field; empty means every
    /// indexed text field
    pub fn new(default_fields: Vec<Field>) -> Self {
        StandardQueryTransformer {
            default_fields,
            facets: None,
        }
    }

    /// Enable drill-down filters
    pub fn with_facets(mut self, facets: FacetsConfig) -> Self {
        self.facets = Some(facets);
        self
    }

    fn default_fields(&self, index: &Index) -> QueryResult<Vec<tantivy::schema::Field>> {
        let schema = index.schema();
        if self.default_fields.is_empty() {
            return Ok(schema
                .fields()
                .filter(|(_, entry)| match entry.field_type() {
                    FieldType::Str(options) => options.get_indexing_options().is_some(),
                    _ => false,
                })
                .map(|(field, _)| field)
                .collect());
        }
        self.default_fields
            .iter()
            .map(|f| {
                schema
                    .get_field(f.name())
                    .map_err(|_| QueryError::invalid_field(f.name(), "not in the index schema"))
            })
            .collect()
    }

    fn parse(&self, index: &Index, query: &Query) -> QueryResult<Box<dyn TantivyQuery>> {
        let text = query.query().trim();
        if text == Query::ALL || text == "*" {
            return Ok(Box::new(AllQuery));
        }
        let mut parser = QueryParser::for_index(index, self.default_fields(index)?);
        if query.default_operator() == Operator::And {
            parser.set_conjunction_by_default();
        }
        parser.parse_query(text).map_err(|e| QueryError::Parse {
            message: e.to_string(),
            source: Box::new(e),
        })
    }

    fn drill_down(&self, index: &Index, query: &Query) -> QueryResult<Vec<Box<dyn TantivyQuery>>> {
        if query.filter_queries().is_empty() {
            return Ok(Vec::new());
        }
        let Some(facets) = &self.facets else {
            tracing::debug!(
                target: "quarry::query",
                filters = query.filter_queries().len(),
                "no facets configuration, filters ignored"
            );
            return Ok(Vec::new());
        };
        let schema = index.schema();
        query
            .filter_queries()
            .iter()
            .map(|filter| {
                if !facets.is_dimension(&filter.field) {
                    tracing::debug!(
                        target: "quarry::query",
                        field = %filter.field,
                        "filter on unconfigured dimension"
                    );
                }
                let handle = schema.get_field(filter.field.name()).map_err(|_| {
                    QueryError::invalid_field(filter.field.name(), "not in the index schema")
                })?;
                if !matches!(schema.get_field_entry(handle).field_type(), FieldType::Str(_)) {
                    return Err(QueryError::invalid_field(
                        filter.field.name(),
                        "drill-down needs a string field",
                    ));
                }
                let term = Term::from_field_text(handle, &filter.value);
                Ok(Box::new(TermQuery::new(term, IndexRecordOption::Basic)) as Box<dyn TantivyQuery>)
            })
            .collect()
    }
}

impl QueryTransformer for StandardQueryTransformer {
    fn transform(&self, index: &Index, query: &Query) -> QueryResult<Box<dyn TantivyQuery>> {
        let parsed = self.parse(index, query)?;
        let filters = self.drill_down(index, query)?;
        if filters.is_empty() {
            return Ok(parsed);
        }
        let mut clauses = Vec::with_capacity(filters.len() + 1);
        clauses.push((Occur::Must, parsed));
        clauses.extend(filters.into_iter().map(|f| (Occur::Must, f)));
        Ok(Box::new(BooleanQuery::new(clauses)))
    }
}
