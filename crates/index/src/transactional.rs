//! Transactional indexer
//!
//! tantivy only knows "mutate, then commit". Transactions are layered on top
//! by pinning the last commit when a transaction begins and putting it back on
//! rollback:
//!
//! ```text
//!            begin_transaction          commit
//!   None ───────────────────▶ Started ─────────▶ Committed
//!    ▲                          │                   │
//!    │                          │ rollback          │ rollback
//!    │                          ▼                   ▼
//!    └──── end_transaction ── RolledBack ◀──────────┘
//!    └──── end_transaction ── Committed
//! ```
//!
//! Every non-`None` state owns the `RetainedSnapshot`, so the snapshot cannot
//! outlive its transaction.

use crate::lifecycle::WriterCore;
use crate::{Indexer, TransactionState, TransactionalIndexer};
use parking_lot::Mutex;
use quarry_core::{Entity, Field, IndexResult, IndexTransformer, StateError};
use quarry_engine::{engine_err, RetainedSnapshot, SnapshotDirectoryFactory, WriterSettings};
use std::sync::Arc;
use tantivy::directory::Directory;
use tantivy::Index;
use tracing::{debug, info, warn};

enum Transaction {
    None,
    Started(RetainedSnapshot),
    Committed(RetainedSnapshot),
    RolledBack(RetainedSnapshot),
}

impl Transaction {
    fn state(&self) -> TransactionState {
        match self {
            Transaction::None => TransactionState::None,
            Transaction::Started(_) => TransactionState::Started,
            Transaction::Committed(_) => TransactionState::Committed,
            Transaction::RolledBack(_) => TransactionState::RolledBack,
        }
    }

    /// Mutations and commit are only legal while Started
    fn ensure_started(&self) -> Result<(), StateError> {
        match self {
            Transaction::Started(_) => Ok(()),
            Transaction::None => Err(StateError::NoTransaction),
            Transaction::Committed(_) => Err(StateError::AlreadyCommitted),
            Transaction::RolledBack(_) => Err(StateError::AlreadyRolledBack),
        }
    }

    fn snapshot(&self) -> Option<&RetainedSnapshot> {
        match self {
            Transaction::None => None,
            Transaction::Started(s) | Transaction::Committed(s) | Transaction::RolledBack(s) => {
                Some(s)
            }
        }
    }

    fn into_snapshot(self) -> Option<RetainedSnapshot> {
        match self {
            Transaction::None => None,
            Transaction::Started(s) | Transaction::Committed(s) | Transaction::RolledBack(s) => {
                Some(s)
            }
        }
    }
}

struct Inner<E> {
    core: WriterCore<E>,
    store: Option<Box<dyn Directory>>,
    transaction: Transaction,
}

impl<E: Entity> Inner<E> {
    fn ensure_mutable(&self) -> IndexResult<()> {
        self.core.ensure_open()?;
        self.transaction.ensure_started()?;
        Ok(())
    }

    fn store(&self) -> Result<&dyn Directory, StateError> {
        self.store.as_deref().ok_or(StateError::NotOpen)
    }

    fn release(&self, transaction: Transaction) -> IndexResult<()> {
        let Some(snapshot) = transaction.into_snapshot() else {
            return Ok(());
        };
        let opstamp = snapshot.opstamp();
        if let Err(e) = snapshot.release(self.store()?) {
            warn!(target: "quarry::index", opstamp, error = %e, "Failed to release retained snapshot");
            return Err(e.into());
        }
        debug!(target: "quarry::index", opstamp, "Released retained snapshot");
        Ok(())
    }
}

/// Drop the current writer, put the pinned commit back and make it the head
/// with a fresh writer. Retrying after a failure picks up where it stopped.
fn restore_and_reopen<E: Entity>(
    core: &mut WriterCore<E>,
    store: &dyn Directory,
    snapshot: &RetainedSnapshot,
) -> IndexResult<()> {
    match core.take_writer() {
        Ok(mut writer) => {
            writer.rollback().map_err(engine_err("roll back index writer"))?;
            writer
                .wait_merging_threads()
                .map_err(engine_err("wait for merging threads"))?;
        }
        Err(StateError::WriterUnavailable) => {}
        Err(e) => return Err(e.into()),
    }

    snapshot.restore(core.index(), store)?;

    let mut writer = core.settings().open_writer(core.index())?;
    writer
        .commit()
        .map_err(engine_err("commit restored snapshot"))?;
    core.install_writer(writer);
    Ok(())
}

/// Indexer whose mutations happen inside begin / commit / rollback / end
/// transactions
///
/// Rolling back undoes every mutation since `begin_transaction`, including
/// ones already committed inside the same transaction.
pub struct TantivyTransactionalIndexer<E> {
    inner: Mutex<Inner<E>>,
    snapshots: Box<dyn SnapshotDirectoryFactory>,
}

impl<E: Entity> TantivyTransactionalIndexer<E> {
    /// Create an unopened indexer; `snapshots` creates its snapshot store on open
    pub fn new(
        index: Index,
        transformer: impl IndexTransformer<E> + 'static,
        settings: WriterSettings,
        snapshots: impl SnapshotDirectoryFactory + 'static,
    ) -> Self {
        TantivyTransactionalIndexer {
            inner: Mutex::new(Inner {
                core: WriterCore::new(index, Arc::new(transformer), settings),
                store: None,
                transaction: Transaction::None,
            }),
            snapshots: Box::new(snapshots),
        }
    }

    /// Opstamp of the commit pinned by the current transaction
    pub fn snapshot_opstamp(&self) -> Option<u64> {
        self.inner
            .lock()
            .transaction
            .snapshot()
            .map(RetainedSnapshot::opstamp)
    }
}

impl<E: Entity> Indexer<E> for TantivyTransactionalIndexer<E> {
    fn open(&self) -> IndexResult<()> {
        let mut inner = self.inner.lock();
        inner.core.ensure_unopened()?;
        let store = self.snapshots.create_snapshot_directory()?;
        inner.core.open()?;
        inner.store = Some(store);
        info!(target: "quarry::index", "Transactional indexer opened");
        Ok(())
    }

    fn index(&self, entity: &E) -> IndexResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_mutable()?;
        inner.core.upsert(entity)
    }

    fn update(&self, entity: &E) -> IndexResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_mutable()?;
        inner.core.upsert(entity)
    }

    fn delete_by_id(&self, id_field: &Field, id: &str) -> IndexResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_mutable()?;
        inner.core.delete_by_id(id_field, id)
    }

    fn commit(&self) -> IndexResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_mutable()?;
        let opstamp = inner.core.commit()?;
        if let Transaction::Started(snapshot) =
            std::mem::replace(&mut inner.transaction, Transaction::None)
        {
            inner.transaction = Transaction::Committed(snapshot);
        }
        info!(target: "quarry::index", opstamp, "Transaction committed");
        Ok(())
    }

    /// Closes the writer; a transaction still holding a snapshot releases it
    /// first and its uncommitted mutations are discarded.
    fn close(&self) -> IndexResult<()> {
        let mut inner = self.inner.lock();
        inner.core.ensure_open()?;
        let transaction = std::mem::replace(&mut inner.transaction, Transaction::None);
        if transaction.state() != TransactionState::None {
            info!(
                target: "quarry::index",
                state = ?transaction.state(),
                "Closing with an unfinished transaction, releasing its snapshot"
            );
        }
        let released = inner.release(transaction);
        inner.core.close()?;
        inner.store = None;
        info!(target: "quarry::index", "Transactional indexer closed");
        released
    }
}

impl<E: Entity> TransactionalIndexer<E> for TantivyTransactionalIndexer<E> {
    fn begin_transaction(&self) -> IndexResult<()> {
        let mut inner = self.inner.lock();
        inner.core.ensure_open()?;
        if !matches!(inner.transaction, Transaction::None) {
            return Err(StateError::TransactionInProgress.into());
        }
        let snapshot = RetainedSnapshot::capture(inner.core.index(), inner.store()?)?;
        info!(target: "quarry::index", opstamp = snapshot.opstamp(), "Transaction started");
        inner.transaction = Transaction::Started(snapshot);
        Ok(())
    }

    fn rollback(&self) -> IndexResult<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.core.ensure_open()?;
        match inner.transaction {
            Transaction::Started(_) | Transaction::Committed(_) => {}
            Transaction::None => return Err(StateError::NoTransaction.into()),
            Transaction::RolledBack(_) => return Err(StateError::AlreadyRolledBack.into()),
        }

        let store = inner.store.as_deref().ok_or(StateError::NotOpen)?;
        if let Some(snapshot) = inner.transaction.snapshot() {
            if let Err(e) = restore_and_reopen(&mut inner.core, store, snapshot) {
                warn!(target: "quarry::index", error = %e, "Rollback failed");
                return Err(e);
            }
            info!(target: "quarry::index", opstamp = snapshot.opstamp(), "Transaction rolled back");
        }

        if let Some(snapshot) =
            std::mem::replace(&mut inner.transaction, Transaction::None).into_snapshot()
        {
            inner.transaction = Transaction::RolledBack(snapshot);
        }
        Ok(())
    }

    fn end_transaction(&self) -> IndexResult<()> {
        let mut inner = self.inner.lock();
        inner.core.ensure_open()?;
        match inner.transaction {
            Transaction::Committed(_) | Transaction::RolledBack(_) => {}
            Transaction::None => return Err(StateError::NoTransaction.into()),
            Transaction::Started(_) => return Err(StateError::NotFinished.into()),
        }
        let transaction = std::mem::replace(&mut inner.transaction, Transaction::None);
        let released = inner.release(transaction);
        info!(target: "quarry::index", "Transaction ended");
        released
    }

    fn transaction_state(&self) -> TransactionState {
        self.inner.lock().transaction.state()
    }
}
