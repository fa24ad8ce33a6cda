//! Reader manager and searcher leases
//!
//! The manager wraps a tantivy `IndexReader` with a manual reload policy, so a
//! new commit is only adopted when someone asks for a refresh. Searches lease a
//! point-in-time `Searcher`; the lease is released when it is dropped, on every
//! exit path of the caller.

use crate::{engine_err, EngineResult};
use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tantivy::{Index, IndexReader, ReloadPolicy, Searcher};
use tracing::debug;

/// Hands out searchers over the most recently adopted commit
pub struct ReaderManager {
    reader: IndexReader,
    refresh_lock: Mutex<()>,
    active_leases: Arc<AtomicUsize>,
    refreshes: AtomicU64,
}

impl ReaderManager {
    /// Open a manually reloaded reader on `index`.
    pub fn open(index: &Index) -> EngineResult<Self> {
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(engine_err("open index reader"))?;
        Ok(ReaderManager {
            reader,
            refresh_lock: Mutex::new(()),
            active_leases: Arc::new(AtomicUsize::new(0)),
            refreshes: AtomicU64::new(0),
        })
    }

    /// Lease the current searcher.
    pub fn acquire(&self) -> SearcherLease {
        self.active_leases.fetch_add(1, Ordering::AcqRel);
        SearcherLease {
            searcher: self.reader.searcher(),
            active_leases: Arc::clone(&self.active_leases),
        }
    }

    /// Adopt the latest commit unless another refresh is already running.
    ///
    /// Returns `Ok(false)` when the refresh was skipped.
    pub fn maybe_refresh(&self) -> EngineResult<bool> {
        match self.refresh_lock.try_lock() {
            Some(_guard) => {
                self.reload()?;
                Ok(true)
            }
            None => {
                debug!(target: "quarry::engine", "Refresh already in flight, skipping");
                Ok(false)
            }
        }
    }

    /// Adopt the latest commit, waiting for any in-flight refresh first.
    pub fn refresh_blocking(&self) -> EngineResult<()> {
        let _guard = self.refresh_lock.lock();
        self.reload()
    }

    /// Searchers currently leased out.
    pub fn active_leases(&self) -> usize {
        self.active_leases.load(Ordering::Acquire)
    }

    /// Completed refreshes since the manager was opened.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    fn reload(&self) -> EngineResult<()> {
        self.reader.reload().map_err(engine_err("reload index reader"))?;
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// A leased point-in-time searcher; dropping it releases the lease.
pub struct SearcherLease {
    searcher: Searcher,
    active_leases: Arc<AtomicUsize>,
}

impl Deref for SearcherLease {
    type Target = Searcher;

    fn deref(&self) -> &Searcher {
        &self.searcher
    }
}

impl Drop for SearcherLease {
    fn drop(&mut self) {
        self.active_leases.fetch_sub(1, Ordering::AcqRel);
    }
}
