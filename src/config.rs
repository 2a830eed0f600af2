//! Editor configuration.
//!
//! Every field carries a serde default so a partial JSON file (or none at all)
//! yields a usable configuration.

use crate::constants;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that was being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid configuration JSON.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Path that was being parsed
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },
}

/// Spacing constants consumed by the layout engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Column distance used by the full relayout
    pub horizontal_spacing: f32,
    /// Row distance used by the full relayout
    pub vertical_spacing: f32,
    /// Column distance used when inserting a single node
    pub insert_column_offset: f32,
    /// Row gap used when redistributing a sibling group
    pub sibling_gap: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            horizontal_spacing: constants::HORIZONTAL_SPACING,
            vertical_spacing: constants::VERTICAL_SPACING,
            insert_column_offset: constants::INSERT_COLUMN_OFFSET,
            sibling_gap: constants::SIBLING_GAP,
        }
    }
}

/// Timing and paging knobs for the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Inactivity window before an autosave fires, in milliseconds
    pub autosave_debounce_ms: u64,
    /// Period of the automatic snapshot timer, in seconds
    pub snapshot_interval_secs: u64,
    /// Maximum number of snapshots listed in the history drawer
    pub snapshot_list_limit: usize,
    /// Number of documents per dashboard page
    pub dashboard_page_size: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            autosave_debounce_ms: constants::AUTOSAVE_DEBOUNCE_MS,
            snapshot_interval_secs: constants::SNAPSHOT_INTERVAL_SECS,
            snapshot_list_limit: constants::SNAPSHOT_LIST_LIMIT,
            dashboard_page_size: constants::DASHBOARD_PAGE_SIZE,
        }
    }
}

impl PersistenceConfig {
    /// The autosave debounce window.
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    /// The automatic snapshot period.
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }
}

/// Top-level configuration for the editor binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Layout spacings
    pub layout: LayoutConfig,
    /// Persistence timings
    pub persistence: PersistenceConfig,
    /// Directory backing the file store
    pub store_dir: PathBuf,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            persistence: PersistenceConfig::default(),
            store_dir: PathBuf::from("mindmaps"),
        }
    }
}

impl EditorConfig {
    /// Parses a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reads a configuration file. Missing keys fall back to their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EditorConfig::from_json("{}").unwrap();
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.persistence.autosave_debounce(), Duration::from_millis(3000));
        assert_eq!(config.persistence.snapshot_interval(), Duration::from_secs(180));
    }

    #[test]
    fn test_partial_config_overrides_single_field() {
        let config =
            EditorConfig::from_json(r#"{"layout": {"sibling_gap": 80.0}, "store_dir": "/tmp/maps"}"#)
                .unwrap();
        assert_eq!(config.layout.sibling_gap, 80.0);
        assert_eq!(config.layout.horizontal_spacing, constants::HORIZONTAL_SPACING);
        assert_eq!(config.store_dir, PathBuf::from("/tmp/maps"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = EditorConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
