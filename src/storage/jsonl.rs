//! JSONL (JSON Lines) storage.
//!
//! Each line is one JSON record. Audit streams are append-only.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::{StorageConfig, StorageError};

/// Audit streams kept under the audit directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStream {
    Repairs,
    TaskArchive,
    AnalyzerRuns,
}

impl AuditStream {
    /// Get the filename for this stream.
    pub fn filename(&self) -> &'static str {
        match self {
            AuditStream::Repairs => "repairs.jsonl",
            AuditStream::TaskArchive => "task_archive.jsonl",
            AuditStream::AnalyzerRuns => "analyzer_runs.jsonl",
        }
    }
}

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    /// Create a new JSONL writer for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Ensure the parent directory exists.
    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Append a single record to the file.
    pub fn append(&self, record: &T) -> Result<(), StorageError> {
        self.ensure_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = BufWriter::new(file);
        let json = serde_json::to_string(record)?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;

        debug!("Appended record to {:?}", self.path);
        Ok(())
    }

    /// Append multiple records to the file.
    pub fn append_batch(&self, records: &[T]) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }

        self.ensure_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = BufWriter::new(file);
        for record in records {
            let json = serde_json::to_string(record)?;
            writeln!(writer, "{}", json)?;
        }

        writer.flush()?;
        info!("Appended {} records to {:?}", records.len(), self.path);

        Ok(records.len())
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    /// Create a new JSONL reader for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read all records from the file, skipping unparseable lines.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        "Failed to parse line {} in {:?}: {}",
                        index + 1,
                        self.path,
                        e
                    );
                }
            }
        }

        debug!("Read {} records from {:?}", records.len(), self.path);
        Ok(records)
    }
}

/// Append-only audit log rooted at the audit directory.
#[derive(Debug, Clone)]
pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.audit_dir())
    }

    pub fn path(&self, stream: AuditStream) -> PathBuf {
        self.dir.join(stream.filename())
    }

    pub fn append<T: Serialize>(&self, stream: AuditStream, record: &T) -> Result<(), StorageError> {
        JsonlWriter::new(self.path(stream)).append(record)
    }

    pub fn append_batch<T: Serialize>(
        &self,
        stream: AuditStream,
        records: &[T],
    ) -> Result<usize, StorageError> {
        JsonlWriter::new(self.path(stream)).append_batch(records)
    }

    pub fn read<T: DeserializeOwned>(&self, stream: AuditStream) -> Result<Vec<T>, StorageError> {
        JsonlReader::new(self.path(stream)).read_all()
    }
}
