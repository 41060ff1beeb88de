//! Map ingest pipeline.
//!
//! Reads a map snapshot or JSON-lines record dump, checks that it builds,
//! upserts every record into ScyllaDB and optionally warms the snapshot cache
//! so query servers start without rebuilding.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use citymap::cache::SnapshotCache;
use citymap::config::{is_json_lines, Config, SourceConfig};
use citymap::loader::{JsonLinesSource, RawRecord, RecordSource, SnapshotFileSource};
use citymap::scylla::ScyllaRecordStore;
use citymap::MapEngine;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Ingest a city map into ScyllaDB")]
struct Args {
    /// Map snapshot (.json) or JSON-lines record dump (.jsonl / .ndjson)
    #[arg(short, long)]
    file: PathBuf,

    /// TOML config file; its scylla source and cache are the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// ScyllaDB node
    #[arg(long)]
    uri: Option<String>,

    /// Keyspace to write into
    #[arg(long)]
    keyspace: Option<String>,

    /// Table to write into
    #[arg(long)]
    table: Option<String>,

    /// Warm the snapshot cache in this directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Concurrent upserts in flight
    #[arg(long, default_value = "64")]
    concurrency: usize,
}

/// Where records are written.
struct Target {
    uri: String,
    keyspace: String,
    table: String,
    cache_dir: Option<PathBuf>,
}

impl Args {
    fn target(&self) -> Result<Target> {
        let config = self
            .config
            .as_ref()
            .map(Config::load_from_file)
            .transpose()?;

        let (mut uri, mut keyspace, mut table) = (None, None, None);
        if let Some(SourceConfig::Scylla {
            uri: u,
            keyspace: k,
            table: t,
        }) = config.as_ref().map(|c| &c.source)
        {
            uri = Some(u.clone());
            keyspace = Some(k.clone());
            table = Some(t.clone());
        }

        let cache_dir = self
            .cache_dir
            .clone()
            .or_else(|| config.and_then(|c| c.cache).map(|c| c.dir));

        Ok(Target {
            uri: self
                .uri
                .clone()
                .or(uri)
                .unwrap_or_else(|| "127.0.0.1:9042".to_string()),
            keyspace: self
                .keyspace
                .clone()
                .or(keyspace)
                .context("--keyspace is required without a scylla source in --config")?,
            table: self
                .table
                .clone()
                .or(table)
                .context("--table is required without a scylla source in --config")?,
            cache_dir,
        })
    }
}

async fn read_records(path: &Path) -> Result<Vec<RawRecord>> {
    let records = if is_json_lines(path) {
        JsonLinesSource::new(path).fetch_records().await
    } else {
        SnapshotFileSource::new(path).fetch_records().await
    };
    records.with_context(|| format!("Failed to read {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let target = args.target()?;
    let start = Instant::now();

    info!("Citymap Ingest Pipeline");
    info!("File: {}", args.file.display());

    let records = read_records(&args.file).await?;
    info!("Read {} records", records.len());

    // Refuse to write a map that would not load.
    let engine = MapEngine::from_records(records.iter().cloned())
        .context("Map does not build; nothing was written")?;
    let counts = engine.counts();
    info!(
        "Map '{}' builds: {} lanes, {} roads, {} junctions, {} aois, {} pois",
        engine.header().name,
        counts.lanes,
        counts.roads,
        counts.junctions,
        counts.aois,
        counts.pois
    );

    let store = ScyllaRecordStore::connect(&target.uri, &target.keyspace, &target.table)
        .await
        .context("Failed to connect to ScyllaDB")?;
    info!("Connected to ScyllaDB, writing into {}", store.source_id());

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
            )?
            .progress_chars("#>-"),
    );

    let errors = stream::iter(records.iter())
        .map(|record| {
            let store = &store;
            let pb = &pb;
            async move {
                let result = store.upsert_record(record).await;
                pb.inc(1);
                result.map_err(|e| (record.class.as_str(), record.id(), e))
            }
        })
        .buffer_unordered(args.concurrency.max(1))
        .fold(0usize, |errors, result| async move {
            match result {
                Ok(()) => errors,
                Err((class, id, e)) => {
                    warn!("Failed to upsert {} {:?}: {}", class, id, e);
                    errors + 1
                }
            }
        })
        .await;

    pb.finish_with_message("Upsert complete");
    info!(
        "Upserted {} records ({} errors)",
        records.len() - errors,
        errors
    );
    if errors > 0 {
        anyhow::bail!("{} records failed to upsert; cache not warmed", errors);
    }

    if let Some(dir) = &target.cache_dir {
        let cache = SnapshotCache::new(dir).context("Failed to open cache directory")?;
        let path = cache
            .write(&store.source_id(), engine.data())
            .context("Failed to warm map cache")?;
        info!("Warmed cache at {}", path.display());
    }

    info!("Ingest finished in {:?}", start.elapsed());
    Ok(())
}
