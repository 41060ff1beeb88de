//! File-backed record sources.

use std::path::{Path, PathBuf};

use tracing::info;

use super::{flatten_snapshot, RawRecord, RecordSource, SourceId};
use crate::error::{MapError, Result};

/// Identity of a file source: the canonical parent directory and the file name.
///
/// Resolved once, when the source is created, so the identity does not change
/// if the file later disappears. A path that cannot be canonicalized (the file
/// does not exist yet) is made absolute instead.
fn file_source_id(path: &Path) -> SourceId {
    let resolved = std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf());
    let namespace = resolved
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let collection = resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "map".to_string());
    SourceId::new(namespace, collection)
}

/// A collection dump: one `{"class": ..., "data": {...}}` document per line.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    path: PathBuf,
    id: SourceId,
}

impl JsonLinesSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = file_source_id(&path);
        Self { path, id }
    }
}

impl RecordSource for JsonLinesSource {
    fn source_id(&self) -> SourceId {
        self.id.clone()
    }

    async fn fetch_records(&self) -> Result<Vec<RawRecord>> {
        info!("Reading map records from {}", self.path.display());
        let content = tokio::fs::read_to_string(&self.path).await?;

        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: RawRecord = serde_json::from_str(line).map_err(|e| {
                MapError::DataConsistency(format!(
                    "{}:{}: not a map record: {}",
                    self.path.display(),
                    line_no + 1,
                    e
                ))
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

/// A whole-map JSON snapshot with `header`, `lanes`, `roads`, ... fields.
#[derive(Debug, Clone)]
pub struct SnapshotFileSource {
    path: PathBuf,
    id: SourceId,
}

impl SnapshotFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = file_source_id(&path);
        Self { path, id }
    }
}

impl RecordSource for SnapshotFileSource {
    fn source_id(&self) -> SourceId {
        self.id.clone()
    }

    async fn fetch_records(&self) -> Result<Vec<RawRecord>> {
        info!("Reading map snapshot from {}", self.path.display());
        let content = tokio::fs::read(&self.path).await?;
        let snapshot: serde_json::Value = serde_json::from_slice(&content)?;
        flatten_snapshot(snapshot)
    }
}
