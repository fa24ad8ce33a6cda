//! Writer lifecycle shared by both indexers

use quarry_core::{Entity, Field, IndexError, IndexResult, IndexTransformer, StateError};
use quarry_engine::{engine_err, to_tantivy_document, WriterSettings};
use std::sync::Arc;
use tantivy::schema::{FieldType, Schema};
use tantivy::{Index, IndexWriter, Term};

enum Lifecycle {
    Unopened,
    Open(IndexWriter),
    /// Open, but a rollback dropped the writer and failed before replacing it
    Unavailable,
    Closed,
}

pub(crate) struct WriterCore<E> {
    index: Index,
    settings: WriterSettings,
    transformer: Arc<dyn IndexTransformer<E>>,
    lifecycle: Lifecycle,
}

impl<E: Entity> WriterCore<E> {
    pub(crate) fn new(
        index: Index,
        transformer: Arc<dyn IndexTransformer<E>>,
        settings: WriterSettings,
    ) -> Self {
        WriterCore {
            index,
            settings,
            transformer,
            lifecycle: Lifecycle::Unopened,
        }
    }

    pub(crate) fn index(&self) -> &Index {
        &self.index
    }

    pub(crate) fn settings(&self) -> &WriterSettings {
        &self.settings
    }

    pub(crate) fn ensure_unopened(&self) -> Result<(), StateError> {
        match self.lifecycle {
            Lifecycle::Unopened => Ok(()),
            Lifecycle::Open(_) | Lifecycle::Unavailable => Err(StateError::AlreadyOpen),
            Lifecycle::Closed => Err(StateError::Closed),
        }
    }

    /// Open or Unavailable
    pub(crate) fn ensure_open(&self) -> Result<(), StateError> {
        match self.lifecycle {
            Lifecycle::Open(_) | Lifecycle::Unavailable => Ok(()),
            Lifecycle::Unopened => Err(StateError::NotOpen),
            Lifecycle::Closed => Err(StateError::Closed),
        }
    }

    pub(crate) fn open(&mut self) -> IndexResult<()> {
        self.ensure_unopened()?;
        let writer = self.settings.open_writer(&self.index)?;
        self.lifecycle = Lifecycle::Open(writer);
        Ok(())
    }

    fn writer(&mut self) -> Result<&mut IndexWriter, StateError> {
        match &mut self.lifecycle {
            Lifecycle::Open(writer) => Ok(writer),
            Lifecycle::Unavailable => Err(StateError::WriterUnavailable),
            Lifecycle::Unopened => Err(StateError::NotOpen),
            Lifecycle::Closed => Err(StateError::Closed),
        }
    }

    /// Delete by id then add; the transform runs before the writer is touched.
    pub(crate) fn upsert(&mut self, entity: &E) -> IndexResult<()> {
        let doc = self.transformer.transform(entity)?;
        let schema = self.index.schema();
        let native = to_tantivy_document(&schema, &doc)?;
        let term = id_term(&schema, &entity.id_field(), &entity.id())?;
        let writer = self.writer()?;
        writer.delete_term(term);
        writer
            .add_document(native)
            .map_err(engine_err("add document"))?;
        Ok(())
    }

    pub(crate) fn delete_by_id(&mut self, id_field: &Field, id: &str) -> IndexResult<()> {
        let term = id_term(&self.index.schema(), id_field, id)?;
        self.writer()?.delete_term(term);
        Ok(())
    }

    pub(crate) fn commit(&mut self) -> IndexResult<u64> {
        let opstamp = self.writer()?.commit().map_err(engine_err("commit"))?;
        Ok(opstamp)
    }

    /// Hand the writer to the caller, leaving the lifecycle Unavailable.
    pub(crate) fn take_writer(&mut self) -> Result<IndexWriter, StateError> {
        self.ensure_open()?;
        match std::mem::replace(&mut self.lifecycle, Lifecycle::Unavailable) {
            Lifecycle::Open(writer) => Ok(writer),
            _ => Err(StateError::WriterUnavailable),
        }
    }

    pub(crate) fn install_writer(&mut self, writer: IndexWriter) {
        self.lifecycle = Lifecycle::Open(writer);
    }

    /// Move to Closed. Uncommitted work is dropped with the writer.
    pub(crate) fn close(&mut self) -> IndexResult<()> {
        self.ensure_open()?;
        if let Lifecycle::Open(writer) = std::mem::replace(&mut self.lifecycle, Lifecycle::Closed)
        {
            writer
                .wait_merging_threads()
                .map_err(engine_err("wait for merging threads"))?;
        }
        Ok(())
    }
}

/// Term addressing every document whose `field` equals `id`
pub(crate) fn id_term(schema: &Schema, field: &Field, id: &str) -> IndexResult<Term> {
    let handle = schema
        .get_field(field.name())
        .map_err(|_| IndexError::UnknownField(field.name().to_string()))?;
    let bad_id = || {
        IndexError::Transform(quarry_core::TransformError::new(format!(
            "id '{}' does not fit field '{}'",
            id, field
        )))
    };
    let term = match schema.get_field_entry(handle).field_type() {
        FieldType::Str(_) => Term::from_field_text(handle, id),
        FieldType::I64(_) => Term::from_field_i64(handle, id.parse().map_err(|_| bad_id())?),
        FieldType::U64(_) => Term::from_field_u64(handle, id.parse().map_err(|_| bad_id())?),
        _ => return Err(bad_id()),
    };
    Ok(term)
}
