//! On-disk snapshot of built map data, keyed by data source.
//!
//! One gzip-compressed bincode file per source. Concurrent writers to the same
//! path are not coordinated: the last rename wins.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use xxhash_rust::xxh64::xxh64;

use crate::error::{MapError, Result};
use crate::loader::SourceId;
use crate::models::MapData;

/// Bumped whenever `MapData`'s encoding changes.
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format_version: u32,
    created_at: DateTime<Utc>,
    source: &'a SourceId,
    data: &'a MapData,
}

#[derive(Deserialize)]
struct Envelope {
    format_version: u32,
    created_at: DateTime<Utc>,
    source: SourceId,
    data: MapData,
}

pub struct SnapshotCache {
    dir: PathBuf,
}

impl SnapshotCache {
    /// Use `dir` for snapshots, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, source: &SourceId) -> PathBuf {
        let key = xxh64(format!("{}\0{}", source.namespace, source.collection).as_bytes(), 0);
        self.dir.join(format!(
            "{}.{}.{:016x}.bin",
            sanitize(&source.namespace),
            sanitize(&source.collection),
            key
        ))
    }

    /// Cached data for `source`. A missing, stale or undecodable file is a miss.
    pub fn read(&self, source: &SourceId) -> Result<Option<MapData>> {
        let path = self.path_for(source);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No map cache at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let reader = BufReader::new(GzDecoder::new(BufReader::new(file)));
        let envelope: Envelope = match bincode::deserialize_from(reader) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Ignoring unreadable map cache {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        if envelope.format_version != FORMAT_VERSION || envelope.source != *source {
            warn!(
                "Ignoring stale map cache {} (format {}, source {})",
                path.display(),
                envelope.format_version,
                envelope.source
            );
            return Ok(None);
        }

        info!(
            "Loaded map cache {} written at {}",
            path.display(),
            envelope.created_at
        );
        Ok(Some(envelope.data))
    }

    /// Write `data` for `source`, replacing any previous snapshot.
    pub fn write(&self, source: &SourceId, data: &MapData) -> Result<PathBuf> {
        let path = self.path_for(source);
        let tmp_path = path.with_extension(format!("tmp{}", std::process::id()));

        let envelope = EnvelopeRef {
            format_version: FORMAT_VERSION,
            created_at: Utc::now(),
            source,
            data,
        };

        if let Err(e) = write_envelope(&tmp_path, &path, &envelope) {
            // The rename never happened, so the temp file is ours to remove.
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        info!("Wrote map cache {}", path.display());
        Ok(path)
    }
}

fn write_envelope(tmp_path: &Path, path: &Path, envelope: &EnvelopeRef<'_>) -> Result<()> {
    let file = File::create(tmp_path)?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::fast());
    bincode::serialize_into(&mut encoder, envelope)
        .map_err(|e| MapError::Cache(format!("encoding {}: {}", path.display(), e)))?;
    encoder.finish()?.flush()?;
    fs::rename(tmp_path, path)?;
    Ok(())
}

/// Longest readable prefix kept per key part; the hash keeps names unique.
const MAX_PART_LEN: usize = 48;

fn sanitize(part: &str) -> String {
    let cleaned: Vec<char> = part
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    // Keep the tail: for paths it names the nearest directory.
    cleaned[cleaned.len().saturating_sub(MAX_PART_LEN)..].iter().collect()
}
