//! Write path for Quarry
//!
//! - `Indexer`: open, mutate, commit, close
//! - `TransactionalIndexer`: adds begin / rollback / end on top of the engine's
//!   commit-only model, using retained snapshots
//!
//! Every call on an indexer is serialized through one lock. Lifecycle misuse
//! is reported as `StateError` and never retried.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod lifecycle;
pub mod plain;
pub mod transactional;

pub use plain::TantivyIndexer;
pub use transactional::TantivyTransactionalIndexer;

use quarry_core::{Entity, Field, IndexResult};

/// Mutations of one index
pub trait Indexer<E: Entity> {
    /// Open the writer. Legal exactly once.
    fn open(&self) -> IndexResult<()>;

    /// Add `entity`, replacing any document with the same id
    fn index(&self, entity: &E) -> IndexResult<()>;

    /// Same as [`Indexer::index`]
    fn update(&self, entity: &E) -> IndexResult<()>;

    /// Remove the document for `entity`
    fn delete(&self, entity: &E) -> IndexResult<()> {
        self.delete_by_id(&entity.id_field(), &entity.id())
    }

    /// Remove every document whose `id_field` equals `id`
    fn delete_by_id(&self, id_field: &Field, id: &str) -> IndexResult<()>;

    /// Make pending mutations durable
    fn commit(&self) -> IndexResult<()>;

    /// Close the writer; uncommitted mutations are discarded. Legal exactly once.
    fn close(&self) -> IndexResult<()>;
}

/// Where a transactional indexer is in its transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// No transaction; the only state `begin_transaction` is legal from
    None,
    /// Begun, mutations allowed
    Started,
    /// Committed; may still be rolled back
    Committed,
    /// Rolled back to the state at begin
    RolledBack,
}

/// An indexer whose mutations are grouped into undoable transactions
pub trait TransactionalIndexer<E: Entity>: Indexer<E> {
    /// Pin the current commit and start accepting mutations
    fn begin_transaction(&self) -> IndexResult<()>;

    /// Undo everything since `begin_transaction`, committed or not
    fn rollback(&self) -> IndexResult<()>;

    /// Release the pinned commit and return to `TransactionState::None`
    fn end_transaction(&self) -> IndexResult<()>;

    /// Current transaction state
    fn transaction_state(&self) -> TransactionState;
}
