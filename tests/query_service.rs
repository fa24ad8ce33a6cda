//! Query service over the five-article fixture

mod common;

use common::*;
use quarry::{
    CursorMark, FacetsConfig, Field, FilterQuery, Operator, Query, QueryError, QueryService,
    QuerySettings, Sort, StandardQueryTransformer, ValidationError,
};

fn by_id(rows: usize) -> quarry::query::QueryBuilder {
    Query::builder(Query::ALL).sort(Sort::asc("id")).rows(rows)
}

// ============================================================================
// Matching and ranking
// ============================================================================

#[test]
fn term_query_ranks_by_relevance() {
    let fixture = TestIndex::seeded();
    let service = fixture.query_service();

    let page = service.search(&Query::builder("solr").build().unwrap()).unwrap();
    assert_eq!(page.total_hits, 2);
    assert_eq!(ids(page.values()), vec!["3", "1"]);
}

#[test]
fn default_operator_applies_between_terms() {
    let fixture = TestIndex::seeded();
    let service = fixture.query_service();

    let and = Query::builder("solr cool").build().unwrap();
    assert_eq!(service.search(&and).unwrap().total_hits, 1);

    let or = Query::builder("solr cool")
        .default_operator(Operator::Or)
        .build()
        .unwrap();
    assert_eq!(service.search(&or).unwrap().total_hits, 3);
}

#[test]
fn sort_by_date_descending() {
    let fixture = TestIndex::seeded();
    let service = fixture.query_service();

    let query = Query::builder(Query::ALL)
        .sort(Sort::desc("create_date"))
        .build()
        .unwrap();
    let page = service.search(&query).unwrap();
    assert_eq!(ids(page.values()), vec!["5", "4", "3", "2", "1"]);
}

#[test]
fn page_never_exceeds_rows() {
    let fixture = TestIndex::seeded();
    let service = fixture.query_service();

    for rows in 1..=6 {
        let page = service.search(&by_id(rows).build().unwrap()).unwrap();
        assert!(page.len() <= rows);
        assert_eq!(page.total_hits, 5);
    }
}

#[test]
fn no_match_is_empty_page() {
    let fixture = TestIndex::seeded();
    let service = fixture.query_service();

    let query = Query::builder("elasticsearch")
        .facet_field("color")
        .build()
        .unwrap();
    let page = service.search(&query).unwrap();
    assert!(page.is_empty());
    assert_eq!(page.total_hits, 0);
    assert!(page.facet("color").unwrap().counts.is_empty());
}

// ============================================================================
// Offset pagination
// ============================================================================

#[test]
fn offset_pages_walk_sorted_ids() {
    let fixture = TestIndex::seeded();
    let service = fixture.query_service();

    let mut groups = Vec::new();
    for offset in [0, 2, 4] {
        let page = service
            .search(&by_id(2).offset(offset).build().unwrap())
            .unwrap();
        assert_eq!(page.total_hits, 5);
        assert_eq!(page.offset, offset);
        groups.push(
            page.values()
                .map(|a| a.id.clone())
                .collect::<Vec<_>>(),
        );
    }
    assert_eq!(groups, vec![vec!["1", "2"], vec!["3", "4"], vec!["5"]]);
}

#[test]
fn adjacent_offset_pages_are_disjoint_slices() {
    let fixture = TestIndex::seeded();
    let service = fixture.query_service();

    let full = service
        .search(&Query::builder("*:*").sort(Sort::desc("create_date")).build().unwrap())
        .unwrap();
    let page = |offset| {
        service
            .search(
                &Query::builder("*:*")
                    .sort(Sort::desc("create_date"))
                    .offset(offset)
                    .rows(2)
                    .build()
                    .unwrap(),
            )
            .unwrap()
    };
    let first = page(1);
    let second = page(3);

    let mut joined: Vec<_> = ids(first.values());
    joined.extend(ids(second.values()));
    assert_eq!(joined, ids(full.values())[1..5].to_vec());
}

#[test]
fn offset_ranking_capped_by_max_results() {
    let fixture = TestIndex::seeded();
    let settings = QuerySettings {
        max_search_results: 3,
        ..QuerySettings::default()
    };
    let service = fixture.query_service_with(settings);

    let page = service
        .search(&by_id(2).offset(2).build().unwrap())
        .unwrap();
    assert_eq!(ids(page.values()), vec!["3"]);
    assert_eq!(page.total_hits, 5);
}

// ============================================================================
// Cursor pagination
// ============================================================================

#[test]
fn cursor_walks_every_document_once() {
    let fixture = TestIndex::seeded();
    let service = fixture.query_service();

    let mut token = CursorMark::START.to_string();
    let mut seen = Vec::new();
    let mut calls = 0;
    loop {
        let query = Query::builder(Query::ALL)
            .sort(Sort::desc("create_date"))
            .sort(Sort::asc("id"))
            .rows(2)
            .cursor_mark(token.clone())
            .build()
            .unwrap();
        let page = service.search(&query).unwrap();
        assert_eq!(page.total_hits, 5);
        seen.extend(page.values().map(|a| a.id.clone()));
        let next = page.next_cursor_mark.clone().unwrap();
        calls += 1;
        if next == token {
            assert!(page.is_empty());
            break;
        }
        token = next;
        assert!(calls < 10, "cursor never terminated");
    }
    assert_eq!(seen, vec!["5", "4", "3", "2", "1"]);
    assert_eq!(calls, 4);
}

#[test]
fn cursor_pages_walk_sorted_ids() {
    let fixture = TestIndex::seeded();
    let service = fixture.query_service();

    let mut token = CursorMark::START.to_string();
    let mut groups = Vec::new();
    for _ in 0..3 {
        let page = service
            .search(&by_id(2).cursor_mark(token.clone()).build().unwrap())
            .unwrap();
        assert_eq!(page.total_hits, 5);
        groups.push(page.values().map(|a| a.id.clone()).collect::<Vec<_>>());
        token = page.next_cursor_mark.unwrap();
    }
    assert_eq!(groups, vec![vec!["1", "2"], vec!["3", "4"], vec!["5"]]);

    let last = service
        .search(&by_id(2).cursor_mark(token.clone()).build().unwrap())
        .unwrap();
    assert!(last.is_empty());
    assert_eq!(last.total_hits, 5);
    assert_eq!(last.next_cursor_mark, Some(token));
}

#[test]
fn cursor_over_relevance_order() {
    let fixture = TestIndex::seeded();
    let service = fixture.query_service();

    let first = Query::builder("cool")
        .default_operator(Operator::Or)
        .rows(1)
        .cursor_mark(CursorMark::START)
        .build()
        .unwrap();
    let page = service.search(&first).unwrap();
    assert_eq!(page.len(), 1);

    let second = first
        .with_cursor_mark(page.next_cursor_mark.clone().unwrap())
        .unwrap();
    let next = service.search(&second).unwrap();
    assert_eq!(next.len(), 1);
    assert_ne!(ids(page.values()), ids(next.values()));
}

#[test]
fn cursor_sort_must_end_on_unique_key() {
    let fixture = TestIndex::seeded();
    let service = fixture.query_service();

    let query = Query::builder(Query::ALL)
        .sort(Sort::desc("create_date"))
        .cursor_mark(CursorMark::START)
        .build()
        .unwrap();
    assert!(matches!(
        service.search(&query),
        Err(QueryError::Validation(
            ValidationError::CursorRequiresUniqueSort { .. }
        ))
    ));
}

#[test]
fn garbage_cursor_rejected_and_lease_released() {
    let fixture = TestIndex::seeded();
    let service = fixture.query_service();

    let query = by_id(2).cursor_mark("AAAA").build().unwrap();
    assert!(matches!(
        service.search(&query),
        Err(QueryError::InvalidCursor(_))
    ));

    let query = Query::builder(Query::ALL)
        .sort(Sort::asc("body"))
        .build()
        .unwrap();
    assert!(matches!(
        service.search(&query),
        Err(QueryError::InvalidField { .. })
    ));

    assert_eq!(fixture.readers.active_leases(), 0);
}

// ============================================================================
// Facets
// ============================================================================

#[test]
fn facet_counts_over_whole_result_set() {
    let fixture = TestIndex::seeded();
    let service = fixture.query_service();

    let query = Query::builder(Query::ALL)
        .rows(1)
        .facet_field("color")
        .build()
        .unwrap();
    let page = service.search(&query).unwrap();
    let colors = page.facet("color").unwrap();
    assert_eq!(colors.count_of("BLUE"), Some(2));
    assert_eq!(colors.count_of("RED"), Some(2));
    assert_eq!(colors.count_of("GREEN"), Some(1));
    assert_eq!(colors.counts.len(), 3);
    assert_eq!(colors.counts[0].value, "BLUE");
}

#[test]
fn drill_down_narrows_hits_and_facets() {
    let fixture = TestIndex::seeded();
    let service = fixture.query_service().with_query_transformer(
        StandardQueryTransformer::new(vec![Field::from("body")])
            .with_facets(FacetsConfig::new([Field::from("color")])),
    );

    let query = Query::builder(Query::ALL)
        .facet_field("color")
        .filter(FilterQuery::new("color", "GREEN"))
        .build()
        .unwrap();
    let page = service.search(&query).unwrap();
    assert_eq!(page.total_hits, 1);
    assert_eq!(ids(page.values()), vec!["3"]);
    let colors = page.facet("color").unwrap();
    assert_eq!(colors.counts.len(), 1);
    assert_eq!(colors.count_of("GREEN"), Some(1));
}

#[test]
fn facet_on_text_field_rejected() {
    let fixture = TestIndex::seeded();
    let service = fixture.query_service();

    let query = Query::builder(Query::ALL)
        .facet_field("body")
        .build()
        .unwrap();
    assert!(matches!(
        service.search(&query),
        Err(QueryError::InvalidField { .. })
    ));
}

// ============================================================================
// Projection and highlighting
// ============================================================================

#[test]
fn highlights_wrap_matches() {
    let fixture = TestIndex::seeded();
    let service = fixture.query_service();

    let query = Query::builder("body:\"Solr is cool\"")
        .highlight_field("body")
        .highlight_field("title")
        .build()
        .unwrap();
    let page = service.search(&query).unwrap();
    assert_eq!(page.total_hits, 1);

    let entry = &page.results[0];
    let body = entry.highlight("body").unwrap();
    assert!(!body.snippets().is_empty());
    assert!(body.snippets()[0].contains("<strong>Solr</strong>"));
    assert!(entry.highlight("title").is_none());
}

#[test]
fn highlight_tags_from_settings() {
    let fixture = TestIndex::seeded();
    let mut settings = QuerySettings::default();
    settings.highlight.pre_tag = "[".to_string();
    settings.highlight.post_tag = "]".to_string();
    let service = fixture.query_service_with(settings);

    let query = Query::builder("lucene")
        .highlight_field("*")
        .build()
        .unwrap();
    let page = service.search(&query).unwrap();
    let body = page.results[0].highlight("body").unwrap();
    assert!(body.snippets()[0].contains("[Lucene]"));
}

#[test]
fn query_highlight_tags_override_settings() {
    let fixture = TestIndex::seeded();
    let mut settings = QuerySettings::default();
    settings.highlight.pre_tag = "[".to_string();
    settings.highlight.post_tag = "]".to_string();
    let service = fixture.query_service_with(settings);

    let query = Query::builder("lucene")
        .highlight_field("body")
        .highlight_tags("<mark>", "</mark>")
        .build()
        .unwrap();
    let page = service.search(&query).unwrap();
    let body = page.results[0].highlight("body").unwrap();
    assert!(body.snippets()[0].contains("<mark>Lucene</mark>"));
    assert!(!body.snippets()[0].contains("[Lucene]"));

    // the override does not leak into later queries
    let plain = Query::builder("lucene").highlight_field("body").build().unwrap();
    let page = service.search(&plain).unwrap();
    assert!(page.results[0].highlight("body").unwrap().snippets()[0].contains("[Lucene]"));
}

#[test]
fn projection_passes_only_requested_fields() {
    let fixture = TestIndex::seeded();
    let service = fixture.query_service();

    // the transformer needs every field, so a narrow projection fails it
    let query = Query::builder("solr").field("id").build().unwrap();
    assert!(matches!(
        service.search(&query),
        Err(QueryError::Transform(_))
    ));

    let query = Query::builder("solr").field("*").build().unwrap();
    assert_eq!(service.search(&query).unwrap().len(), 2);
}
