//! Non-transactional indexer

use crate::lifecycle::WriterCore;
use crate::Indexer;
use parking_lot::Mutex;
use quarry_core::{Entity, Field, IndexResult, IndexTransformer};
use quarry_engine::WriterSettings;
use std::sync::Arc;
use tantivy::Index;
use tracing::{debug, info};

/// Indexer over a tantivy index with plain open / mutate / commit / close
pub struct TantivyIndexer<E> {
    core: Mutex<WriterCore<E>>,
}

impl<E: Entity> TantivyIndexer<E> {
    /// Create an unopened indexer
    pub fn new(
        index: Index,
        transformer: impl IndexTransformer<E> + 'static,
        settings: WriterSettings,
    ) -> Self {
        TantivyIndexer {
            core: Mutex::new(WriterCore::new(index, Arc::new(transformer), settings)),
        }
    }
}

impl<E: Entity> Indexer<E> for TantivyIndexer<E> {
    fn open(&self) -> IndexResult<()> {
        self.core.lock().open()?;
        info!(target: "quarry::index", "Indexer opened");
        Ok(())
    }

    fn index(&self, entity: &E) -> IndexResult<()> {
        self.core.lock().upsert(entity)
    }

    fn update(&self, entity: &E) -> IndexResult<()> {
        self.core.lock().upsert(entity)
    }

    fn delete_by_id(&self, id_field: &Field, id: &str) -> IndexResult<()> {
        self.core.lock().delete_by_id(id_field, id)
    }

    fn commit(&self) -> IndexResult<()> {
        let opstamp = self.core.lock().commit()?;
        debug!(target: "quarry::index", opstamp, "Committed");
        Ok(())
    }

    fn close(&self) -> IndexResult<()> {
        self.core.lock().close()?;
        info!(target: "quarry::index", "Indexer closed");
        Ok(())
    }
}
