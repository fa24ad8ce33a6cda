//! Index writer construction

use crate::{engine_err, EngineResult};
use tantivy::{Index, IndexWriter};

/// How index writers are opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterSettings {
    /// Total writer heap in bytes, split across threads
    pub memory_budget: usize,
    /// Indexing threads; `None` lets tantivy choose
    pub threads: Option<usize>,
}

impl Default for WriterSettings {
    fn default() -> Self {
        WriterSettings {
            memory_budget: 50_000_000,
            threads: None,
        }
    }
}

impl WriterSettings {
    /// Open a writer on `index`. Takes the index directory lock.
    pub fn open_writer(&self, index: &Index) -> EngineResult<IndexWriter> {
        match self.threads {
            Some(threads) => index
                .writer_with_num_threads(threads, self.memory_budget)
                .map_err(engine_err("open index writer")),
            None => index
                .writer(self.memory_budget)
                .map_err(engine_err("open index writer")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tantivy::schema::{Schema, STRING};

    #[test]
    fn second_writer_fails_while_first_is_alive() {
        let mut builder = Schema::builder();
        builder.add_text_field("id", STRING);
        let index = Index::create_in_ram(builder.build());
        let settings = WriterSettings {
            memory_budget: 20_000_000,
            threads: Some(1),
        };

        let first = settings.open_writer(&index).unwrap();
        let err = settings.open_writer(&index).err().unwrap();
        assert_eq!(err.context(), "open index writer");

        first.wait_merging_threads().unwrap();
        assert!(settings.open_writer(&index).is_ok());
    }
}
