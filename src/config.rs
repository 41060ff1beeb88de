//! TOML configuration shared by the binaries.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::cache::SnapshotCache;
use crate::engine::MapEngine;
use crate::loader::{JsonLinesSource, SnapshotFileSource};
use crate::scylla::ScyllaRecordStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub cache: Option<CacheConfig>,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Where map records come from.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Scylla {
        uri: String,
        keyspace: String,
        table: String,
    },
    /// A JSON snapshot, or a JSON-lines record dump (`.jsonl` / `.ndjson`)
    File { path: PathBuf },
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

/// Whether a file holds one record per line rather than a whole snapshot.
pub fn is_json_lines(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("jsonl") | Some("ndjson")
    )
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn snapshot_cache(&self) -> Result<Option<SnapshotCache>> {
        match &self.cache {
            Some(cache) => Ok(Some(
                SnapshotCache::new(&cache.dir).context("Failed to open cache directory")?,
            )),
            None => {
                warn!("No [cache] configured; the map will be rebuilt on every start");
                Ok(None)
            }
        }
    }

    /// Load the configured map, through the cache when one is configured.
    pub async fn load_engine(&self) -> Result<MapEngine> {
        let cache = self.snapshot_cache()?;
        let engine = match &self.source {
            SourceConfig::Scylla {
                uri,
                keyspace,
                table,
            } => {
                let store = ScyllaRecordStore::connect(uri, keyspace, table)
                    .await
                    .context("Failed to connect to ScyllaDB")?;
                MapEngine::load(&store, cache.as_ref()).await
            }
            SourceConfig::File { path } if is_json_lines(path) => {
                MapEngine::load(&JsonLinesSource::new(path), cache.as_ref()).await
            }
            SourceConfig::File { path } => {
                MapEngine::load(&SnapshotFileSource::new(path), cache.as_ref()).await
            }
        };
        engine.context("Failed to load map")
    }
}
