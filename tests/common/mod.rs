//! Shared fixtures for the integration suites.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use quarry::{
    Document, Entity, Field, FieldValue, Indexer, Query, QueryService, QuerySettings,
    RamSnapshotDirectoryFactory, ReaderManager, SortType, StandardQueryTransformer,
    TantivyIndexer, TantivyQueryService, TantivyTransactionalIndexer, TransformError,
    WriterSettings,
};
use std::sync::{Arc, Once};
use tantivy::schema::{Schema, FAST, INDEXED, STORED, STRING, TEXT};
use tantivy::Index;
use tempfile::TempDir;

// ============================================================================
// Example entity
// ============================================================================

pub const COLORS: [&str; 5] = ["BLUE", "RED", "GREEN", "BLUE", "RED"];

pub const BODIES: [&str; 5] = [
    "Body 1 Solr is cool",
    "Body 2 Lucene is cool",
    "Body 3 Solr is Great, Solr is Fun",
    "Body 4",
    "Body 5",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub body: String,
    pub color: String,
    pub create_date: DateTime<Utc>,
}

impl Entity for Article {
    fn id(&self) -> String {
        self.id.clone()
    }
}

/// Article `n` of the standard fixture (1-based)
pub fn article(n: u32) -> Article {
    let i = (n as usize - 1) % COLORS.len();
    Article {
        id: n.to_string(),
        title: format!("Title {n}"),
        body: BODIES.get(n as usize - 1).copied().unwrap_or("Body extra").to_string(),
        color: COLORS[i].to_string(),
        create_date: Utc.with_ymd_and_hms(2016, 10, 1, n, 0, 0).unwrap(),
    }
}

pub fn articles() -> Vec<Article> {
    (1..=5).map(article).collect()
}

pub fn schema() -> Schema {
    let mut builder = Schema::builder();
    builder.add_text_field("id", STRING | STORED | FAST);
    builder.add_text_field("title", TEXT | STORED);
    builder.add_text_field("body", TEXT | STORED);
    builder.add_text_field("color", STRING | STORED | FAST);
    builder.add_i64_field("create_date", INDEXED | STORED | FAST);
    builder.build()
}

pub fn to_document(article: &Article) -> Result<Document, TransformError> {
    Ok(Document::new()
        .with("id", article.id.as_str())
        .with("title", article.title.as_str())
        .with("body", article.body.as_str())
        .with("color", article.color.as_str())
        .with("create_date", article.create_date.timestamp()))
}

pub fn from_document(doc: &Document) -> Result<Article, TransformError> {
    let text = |field: &str| {
        doc.get_str(field)
            .map(str::to_string)
            .ok_or_else(|| TransformError::missing_field(field))
    };
    let seconds = doc
        .get_first("create_date")
        .and_then(FieldValue::as_i64)
        .ok_or_else(|| TransformError::missing_field("create_date"))?;
    let create_date = Utc
        .timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| TransformError::new(format!("bad create_date {seconds}")))?;
    Ok(Article {
        id: text("id")?,
        title: text("title")?,
        body: text("body")?,
        color: text("color")?,
        create_date,
    })
}

pub fn sort_type(field: &Field) -> SortType {
    match field.name() {
        "create_date" => SortType::I64,
        _ => SortType::Str,
    }
}

// ============================================================================
// Logging
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output to the test harness when `RUST_LOG` is set
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        if std::env::var_os("RUST_LOG").is_some() {
            let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        }
    });
}

// ============================================================================
// TestIndex
// ============================================================================

pub fn writer_settings() -> WriterSettings {
    WriterSettings {
        memory_budget: 20_000_000,
        threads: Some(1),
    }
}

/// On-disk index with a reader manager over it
pub struct TestIndex {
    pub dir: TempDir,
    pub index: Index,
    pub readers: Arc<ReaderManager>,
}

impl TestIndex {
    pub fn new() -> Self {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let index = Index::create_in_dir(dir.path(), schema()).unwrap();
        let readers = Arc::new(ReaderManager::open(&index).unwrap());
        TestIndex {
            dir,
            index,
            readers,
        }
    }

    pub fn indexer(&self) -> TantivyIndexer<Article> {
        TantivyIndexer::new(self.index.clone(), to_document, writer_settings())
    }

    pub fn transactional(&self) -> TantivyTransactionalIndexer<Article> {
        TantivyTransactionalIndexer::new(
            self.index.clone(),
            to_document,
            writer_settings(),
            RamSnapshotDirectoryFactory,
        )
    }

    pub fn query_service(&self) -> TantivyQueryService<Article> {
        self.query_service_with(QuerySettings::default())
    }

    pub fn query_service_with(&self, settings: QuerySettings) -> TantivyQueryService<Article> {
        TantivyQueryService::new(
            self.index.clone(),
            Arc::clone(&self.readers),
            from_document,
            sort_type,
            settings,
        )
        .with_query_transformer(StandardQueryTransformer::new(vec![Field::from("body")]))
    }

    /// Index, commit and refresh the standard five articles
    pub fn seeded() -> Self {
        let fixture = TestIndex::new();
        let indexer = fixture.indexer();
        indexer.open().unwrap();
        for a in articles() {
            indexer.index(&a).unwrap();
        }
        indexer.commit().unwrap();
        indexer.close().unwrap();
        fixture.refresh();
        fixture
    }

    pub fn refresh(&self) {
        self.readers.refresh_blocking().unwrap();
    }

    /// Ids of every visible document, sorted by id
    pub fn visible_ids(&self) -> Vec<String> {
        let service = self.query_service();
        let query = Query::builder(Query::ALL)
            .rows(1000)
            .sort(quarry::Sort::asc("id"))
            .build()
            .unwrap();
        service
            .search(&query)
            .unwrap()
            .values()
            .map(|a| a.id.clone())
            .collect()
    }

    /// Every visible article, sorted by id
    pub fn visible_articles(&self) -> Vec<Article> {
        let service = self.query_service();
        let query = Query::builder(Query::ALL)
            .rows(1000)
            .sort(quarry::Sort::asc("id"))
            .build()
            .unwrap();
        service.search(&query).unwrap().values().cloned().collect()
    }
}

pub fn ids<'a>(articles: impl IntoIterator<Item = &'a Article>) -> Vec<&'a str> {
    articles.into_iter().map(|a| a.id.as_str()).collect()
}
