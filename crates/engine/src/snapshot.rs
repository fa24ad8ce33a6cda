//! Retained commit snapshots
//!
//! tantivy garbage-collects segment files as soon as no commit references
//! them, so an older commit cannot be pinned in place. A `RetainedSnapshot`
//! pins one by copying it into a separate snapshot store:
//!
//! ```text
//! capture:  meta.json bytes (kept in memory)
//!           every file of every segment in that meta → snapshot store
//! restore:  missing segment files ← snapshot store (registered as managed)
//!           meta.json ← captured bytes, then directory sync
//! release:  delete the copies from the snapshot store
//! ```
//!
//! Restore must run while no writer holds the index lock.

use crate::{engine_err, EngineResult};
use quarry_core::EngineIoError;
use std::path::{Path, PathBuf};
use tantivy::directory::{Directory, MmapDirectory, RamDirectory};
use tantivy::Index;
use tracing::debug;

const META_FILEPATH: &str = "meta.json";

// ============================================================================
// Snapshot directory factories
// ============================================================================

/// Creates the directory a transactional indexer keeps snapshots in
pub trait SnapshotDirectoryFactory: Send + Sync {
    /// Create a fresh snapshot store
    fn create_snapshot_directory(&self) -> EngineResult<Box<dyn Directory>>;
}

/// Keeps snapshot copies in memory
#[derive(Debug, Clone, Copy, Default)]
pub struct RamSnapshotDirectoryFactory;

impl SnapshotDirectoryFactory for RamSnapshotDirectoryFactory {
    fn create_snapshot_directory(&self) -> EngineResult<Box<dyn Directory>> {
        Ok(Box::new(RamDirectory::create()))
    }
}

/// Keeps snapshot copies in a directory on disk
#[derive(Debug, Clone)]
pub struct MmapSnapshotDirectoryFactory {
    path: PathBuf,
}

impl MmapSnapshotDirectoryFactory {
    /// Snapshots go under `path`, which is created if missing
    pub fn new(path: impl Into<PathBuf>) -> Self {
        MmapSnapshotDirectoryFactory { path: path.into() }
    }

    /// Snapshot store location
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotDirectoryFactory for MmapSnapshotDirectoryFactory {
    fn create_snapshot_directory(&self) -> EngineResult<Box<dyn Directory>> {
        std::fs::create_dir_all(&self.path).map_err(engine_err("create snapshot directory"))?;
        let dir = MmapDirectory::open(&self.path).map_err(engine_err("open snapshot directory"))?;
        Ok(Box::new(dir))
    }
}

// ============================================================================
// RetainedSnapshot
// ============================================================================

/// A committed index state pinned in a snapshot store
#[derive(Debug)]
pub struct RetainedSnapshot {
    meta: Vec<u8>,
    files: Vec<PathBuf>,
    opstamp: u64,
}

impl RetainedSnapshot {
    /// Pin the last commit of `index` by copying it into `store`.
    ///
    /// On failure any copies already made are removed again.
    pub fn capture(index: &Index, store: &dyn Directory) -> EngineResult<Self> {
        let directory = index.directory();
        let meta = directory
            .atomic_read(Path::new(META_FILEPATH))
            .map_err(engine_err("read commit point"))?;
        let metas = index.load_metas().map_err(engine_err("load index metas"))?;

        let mut snapshot = RetainedSnapshot {
            meta,
            files: Vec::new(),
            opstamp: metas.opstamp,
        };
        let mut candidates: Vec<PathBuf> = metas
            .segments
            .iter()
            .flat_map(|segment| segment.list_files())
            .collect();
        candidates.sort();

        for path in candidates {
            if let Err(e) = snapshot.copy_in(directory, store, &path) {
                let _ = snapshot.release(store);
                return Err(e);
            }
        }

        debug!(
            target: "quarry::engine",
            opstamp = snapshot.opstamp,
            files = snapshot.files.len(),
            "Captured retained snapshot"
        );
        Ok(snapshot)
    }

    fn copy_in(
        &mut self,
        directory: &dyn Directory,
        store: &dyn Directory,
        path: &Path,
    ) -> EngineResult<()> {
        if !directory
            .exists(path)
            .map_err(engine_err("check segment file"))?
        {
            return Ok(());
        }
        let bytes = directory
            .atomic_read(path)
            .map_err(engine_err("read segment file"))?;
        store
            .atomic_write(path, &bytes)
            .map_err(engine_err("copy segment file to snapshot"))?;
        self.files.push(path.to_path_buf());
        Ok(())
    }

    /// Put the pinned commit back as the head of `index`.
    ///
    /// Segment files still present in the index are left alone; missing ones
    /// are written back verbatim through the index's managed directory.
    pub fn restore(&self, index: &Index, store: &dyn Directory) -> EngineResult<()> {
        let directory = index.directory();
        let mut restored = 0usize;
        for path in &self.files {
            if directory
                .exists(path)
                .map_err(engine_err("check segment file"))?
            {
                continue;
            }
            let bytes = store
                .atomic_read(path)
                .map_err(engine_err("read snapshot file"))?;
            // bytes already carry their footer; open_write would add another
            directory
                .atomic_write(path, &bytes)
                .map_err(engine_err("restore segment file"))?;
            restored += 1;
        }

        directory
            .atomic_write(Path::new(META_FILEPATH), &self.meta)
            .map_err(engine_err("restore commit point"))?;
        directory
            .sync_directory()
            .map_err(engine_err("sync index directory"))?;

        debug!(
            target: "quarry::engine",
            opstamp = self.opstamp,
            restored,
            "Restored retained snapshot"
        );
        Ok(())
    }

    /// Delete the copies from `store`.
    ///
    /// Every copy is attempted; the first failure is returned.
    pub fn release(self, store: &dyn Directory) -> EngineResult<()> {
        let mut first_error: Option<EngineIoError> = None;
        for path in &self.files {
            if let Err(e) = store.delete(path) {
                first_error.get_or_insert_with(|| EngineIoError::new("release snapshot file", e));
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Opstamp of the pinned commit
    pub fn opstamp(&self) -> u64 {
        self.opstamp
    }

    /// Segment files held by this snapshot
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tantivy::schema::{Schema, Value, STORED, STRING};
    use tantivy::{doc, IndexWriter, ReloadPolicy};

    fn index() -> Index {
        let mut builder = Schema::builder();
        builder.add_text_field("id", STRING | STORED);
        Index::create_in_ram(builder.build())
    }

    fn writer(index: &Index) -> IndexWriter {
        index.writer_with_num_threads(1, 20_000_000).unwrap()
    }

    fn num_docs(index: &Index) -> u64 {
        index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .unwrap()
            .searcher()
            .num_docs()
    }

    /// Stored ids of every live doc; reads every segment file
    fn stored_ids(index: &Index) -> Vec<String> {
        let id = index.schema().get_field("id").unwrap();
        let reader: tantivy::IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .unwrap();
        let searcher = reader.searcher();
        let mut ids = Vec::new();
        for (ord, segment) in searcher.segment_readers().iter().enumerate() {
            for doc in segment.doc_ids_alive() {
                let stored: tantivy::TantivyDocument = searcher
                    .doc(tantivy::DocAddress::new(ord as u32, doc))
                    .unwrap();
                ids.extend(stored.get_first(id).and_then(|v| v.as_str()).map(str::to_string));
            }
        }
        ids.sort();
        ids
    }

    #[test]
    fn capture_copies_segment_files() {
        let index = index();
        let id = index.schema().get_field("id").unwrap();
        let mut w = writer(&index);
        w.add_document(doc!(id => "1")).unwrap();
        w.commit().unwrap();

        let store = RamDirectory::create();
        let snapshot = RetainedSnapshot::capture(&index, &store).unwrap();
        assert!(!snapshot.files().is_empty());
        for path in snapshot.files() {
            assert!(store.exists(path).unwrap());
        }

        let files = snapshot.files().to_vec();
        snapshot.release(&store).unwrap();
        for path in files {
            assert!(!store.exists(&path).unwrap());
        }
    }

    #[test]
    fn restore_brings_back_older_commit() {
        let index = index();
        let id = index.schema().get_field("id").unwrap();
        let mut w = writer(&index);
        w.add_document(doc!(id => "1")).unwrap();
        w.commit().unwrap();

        let store = RamDirectory::create();
        let snapshot = RetainedSnapshot::capture(&index, &store).unwrap();

        w.delete_all_documents().unwrap();
        w.add_document(doc!(id => "2")).unwrap();
        w.add_document(doc!(id => "3")).unwrap();
        w.commit().unwrap();
        w.wait_merging_threads().unwrap();
        assert_eq!(num_docs(&index), 2);

        snapshot.restore(&index, &store).unwrap();
        let mut w = writer(&index);
        w.commit().unwrap();
        assert_eq!(num_docs(&index), 1);
        assert_eq!(stored_ids(&index), vec!["1"]);

        snapshot.release(&store).unwrap();
    }

    #[test]
    fn restored_delete_bitsets_stay_readable() {
        let index = index();
        let id = index.schema().get_field("id").unwrap();
        let mut w = writer(&index);
        for n in ["1", "2", "3", "4"] {
            w.add_document(doc!(id => n)).unwrap();
        }
        w.commit().unwrap();
        w.delete_term(tantivy::Term::from_field_text(id, "1"));
        w.commit().unwrap();
        assert_eq!(stored_ids(&index), vec!["2", "3", "4"]);

        let store = RamDirectory::create();
        let snapshot = RetainedSnapshot::capture(&index, &store).unwrap();

        // a newer delete file replaces the captured one, which gets collected
        w.delete_term(tantivy::Term::from_field_text(id, "2"));
        w.commit().unwrap();
        w.garbage_collect_files().wait().unwrap();
        drop(w);
        let missing = snapshot
            .files()
            .iter()
            .filter(|p| !index.directory().exists(p).unwrap())
            .count();
        assert!(missing > 0);

        snapshot.restore(&index, &store).unwrap();
        let mut w = writer(&index);
        w.commit().unwrap();
        assert_eq!(stored_ids(&index), vec!["2", "3", "4"]);

        snapshot.release(&store).unwrap();
    }

    #[test]
    fn empty_index_snapshot_has_no_files() {
        let index = index();
        let store = RamDirectory::create();
        let snapshot = RetainedSnapshot::capture(&index, &store).unwrap();
        assert!(snapshot.files().is_empty());
        assert_eq!(snapshot.opstamp(), 0);
        snapshot.release(&store).unwrap();
    }

    #[test]
    fn mmap_factory_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots");
        let factory = MmapSnapshotDirectoryFactory::new(&path);
        let store = factory.create_snapshot_directory().unwrap();
        store.atomic_write(Path::new("marker"), b"x").unwrap();
        assert!(path.join("marker").exists());
    }
}
