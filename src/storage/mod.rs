//! Filesystem persistence.
//!
//! Append-only JSONL audit streams for operations that mutate shared
//! state out of band:
//! - Duplicate-participant repairs
//! - Archived (finished or deleted) tasks
//! - Co-occurrence analyzer run summaries

pub mod jsonl;

use std::path::PathBuf;
use thiserror::Error;

pub use jsonl::{AuditLog, AuditStream, JsonlReader, JsonlWriter};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.data_dir.join("audit")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_paths() {
        let config = StorageConfig::new(PathBuf::from("/data"));
        assert_eq!(config.audit_dir(), PathBuf::from("/data/audit"));
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
    }
}
