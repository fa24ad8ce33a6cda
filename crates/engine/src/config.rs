//! Configuration via `quarry.toml`
//!
//! Every key is optional; a missing key takes its default. `writer_settings()`
//! and `query_settings()` turn the flat file into the typed settings the
//! indexers and services are built from.

use crate::writer::WriterSettings;
use quarry_core::Field;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file name placed next to the index.
pub const CONFIG_FILE_NAME: &str = "quarry.toml";

/// Errors loading or saving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("failed to access config file '{path}': {source}")]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this config
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: toml::de::Error,
    },

    /// Config could not be serialized
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range
    #[error("invalid config value for '{key}': {reason}")]
    Invalid {
        /// Offending key
        key: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Highlighting parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSettings {
    /// Inserted before each match
    pub pre_tag: String,
    /// Inserted after each match
    pub post_tag: String,
    /// Maximum snippets per field
    pub max_snippets: usize,
    /// Approximate snippet length in characters
    pub fragment_chars: usize,
}

impl Default for HighlightSettings {
    fn default() -> Self {
        HighlightSettings {
            pre_tag: default_pre_tag(),
            post_tag: default_post_tag(),
            max_snippets: default_max_snippets(),
            fragment_chars: default_fragment_chars(),
        }
    }
}

/// Parameters of the query service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySettings {
    /// Ceiling on ranked results in offset mode
    pub max_search_results: usize,
    /// Field whose values are unique per document
    pub unique_key: Field,
    /// Highlighting parameters
    pub highlight: HighlightSettings,
}

impl Default for QuerySettings {
    fn default() -> Self {
        QuerySettings {
            max_search_results: default_max_search_results(),
            unique_key: Field::ID,
            highlight: HighlightSettings::default(),
        }
    }
}

/// Configuration loaded from `quarry.toml`.
///
/// # Example
///
/// ```toml
/// writer_memory_budget = 50000000
/// refresh_interval_ms = 1000
/// max_search_results = 10000
/// unique_key = "id"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarryConfig {
    /// Total writer heap in bytes.
    #[serde(default = "default_writer_memory_budget")]
    pub writer_memory_budget: usize,
    /// Indexing threads; tantivy picks when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writer_threads: Option<usize>,
    /// Background reader refresh period in milliseconds.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    /// Ceiling on ranked results in offset mode.
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
    /// Inserted before each highlighted match.
    #[serde(default = "default_pre_tag")]
    pub highlight_pre_tag: String,
    /// Inserted after each highlighted match.
    #[serde(default = "default_post_tag")]
    pub highlight_post_tag: String,
    /// Maximum snippets per highlighted field.
    #[serde(default = "default_max_snippets")]
    pub max_snippets: usize,
    /// Approximate snippet length in characters.
    #[serde(default = "default_fragment_chars")]
    pub fragment_chars: usize,
    /// Field with globally unique values; cursor sorts must end on it.
    #[serde(default = "default_unique_key")]
    pub unique_key: String,
}

fn default_writer_memory_budget() -> usize {
    50_000_000
}

fn default_refresh_interval_ms() -> u64 {
    1_000
}

fn default_max_search_results() -> usize {
    10_000
}

fn default_pre_tag() -> String {
    "<strong>".to_string()
}

fn default_post_tag() -> String {
    "</strong>".to_string()
}

fn default_max_snippets() -> usize {
    10
}

fn default_fragment_chars() -> usize {
    100
}

fn default_unique_key() -> String {
    "id".to_string()
}

impl Default for QuarryConfig {
    fn default() -> Self {
        Self {
            writer_memory_budget: default_writer_memory_budget(),
            writer_threads: None,
            refresh_interval_ms: default_refresh_interval_ms(),
            max_search_results: default_max_search_results(),
            highlight_pre_tag: default_pre_tag(),
            highlight_post_tag: default_post_tag(),
            max_snippets: default_max_snippets(),
            fragment_chars: default_fragment_chars(),
            unique_key: default_unique_key(),
        }
    }
}

impl QuarryConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive: [(&'static str, u64); 5] = [
            ("writer_memory_budget", self.writer_memory_budget as u64),
            ("refresh_interval_ms", self.refresh_interval_ms),
            ("max_search_results", self.max_search_results as u64),
            ("max_snippets", self.max_snippets as u64),
            ("fragment_chars", self.fragment_chars as u64),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.writer_threads == Some(0) {
            return Err(ConfigError::Invalid {
                key: "writer_threads",
                reason: "must be greater than zero when set".to_string(),
            });
        }
        if self.unique_key.is_empty() {
            return Err(ConfigError::Invalid {
                key: "unique_key",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Writer settings derived from this config.
    pub fn writer_settings(&self) -> WriterSettings {
        WriterSettings {
            memory_budget: self.writer_memory_budget,
            threads: self.writer_threads,
        }
    }

    /// Query service settings derived from this config.
    pub fn query_settings(&self) -> QuerySettings {
        QuerySettings {
            max_search_results: self.max_search_results,
            unique_key: Field::from(self.unique_key.clone()),
            highlight: HighlightSettings {
                pre_tag: self.highlight_pre_tag.clone(),
                post_tag: self.highlight_post_tag.clone(),
                max_snippets: self.max_snippets,
                fragment_chars: self.fragment_chars,
            },
        }
    }

    /// Background refresh period.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Quarry configuration
#
# Total index writer heap in bytes (default: 50000000).
writer_memory_budget = 50000000

# Indexing threads. Leave unset to let the engine decide.
# writer_threads = 2

# How often the background refresher adopts the latest commit (default: 1000).
refresh_interval_ms = 1000

# Ceiling on ranked results considered in offset mode (default: 10000).
max_search_results = 10000

# Highlighting.
highlight_pre_tag = "<strong>"
highlight_post_tag = "</strong>"
max_snippets = 10
fragment_chars = 100

# Field with globally unique values. Cursor pagination sorts must end on it.
unique_key = "id"
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: QuarryConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
