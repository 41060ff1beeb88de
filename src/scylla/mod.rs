//! Map records stored in ScyllaDB.
//!
//! One table per map, rows `(class, id, data)` with `data` holding the JSON
//! payload. The header is stored under id 0.

use std::sync::Arc;

use futures::TryStreamExt;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::statement::prepared::PreparedStatement;
use tracing::info;

use crate::error::{MapError, Result};
use crate::loader::{RawRecord, RecordSource, SourceId};

fn store_err(action: &str, e: impl std::fmt::Display) -> MapError {
    MapError::Store(format!("{}: {}", action, e))
}

/// Keyspace and table names go into CQL text, so only plain identifiers are accepted.
fn check_identifier(what: &'static str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(MapError::unsupported(what, name))
    }
}

#[derive(Clone)]
pub struct ScyllaRecordStore {
    session: Arc<Session>,
    keyspace: String,
    table: String,
    insert: PreparedStatement,
}

impl ScyllaRecordStore {
    /// Connect to `uri`, creating the keyspace and table if needed.
    pub async fn connect(uri: &str, keyspace: &str, table: &str) -> Result<Self> {
        check_identifier("keyspace name", keyspace)?;
        check_identifier("table name", table)?;

        info!("Connecting to ScyllaDB at {}...", uri);
        let session: Session = SessionBuilder::new()
            .known_node(uri)
            .build()
            .await
            .map_err(|e| store_err("connecting", e))?;

        init_schema(&session, keyspace, table).await?;

        let insert = session
            .prepare(format!(
                "INSERT INTO {}.{} (class, id, data) VALUES (?, ?, ?)",
                keyspace, table
            ))
            .await
            .map_err(|e| store_err("preparing insert", e))?;

        Ok(Self {
            session: Arc::new(session),
            keyspace: keyspace.to_string(),
            table: table.to_string(),
            insert,
        })
    }

    /// Insert or replace one record, keyed by class and payload id.
    pub async fn upsert_record(&self, record: &RawRecord) -> Result<()> {
        let id = record.id().unwrap_or(0);
        let data = serde_json::to_string(&record.data)?;
        self.session
            .execute_unpaged(&self.insert, (record.class.as_str(), id, data.as_str()))
            .await
            .map_err(|e| store_err("inserting record", e))?;
        Ok(())
    }
}

async fn init_schema(session: &Session, keyspace: &str, table: &str) -> Result<()> {
    session
        .query_unpaged(
            format!(
                "CREATE KEYSPACE IF NOT EXISTS {}
                 WITH REPLICATION = {{
                    'class' : 'SimpleStrategy',
                    'replication_factor' : 1
                 }}",
                keyspace
            ),
            &[],
        )
        .await
        .map_err(|e| store_err("creating keyspace", e))?;

    session
        .query_unpaged(
            format!(
                "CREATE TABLE IF NOT EXISTS {}.{} (
                    class text,
                    id bigint,
                    data text,
                    PRIMARY KEY ((class, id))
                )",
                keyspace, table
            ),
            &[],
        )
        .await
        .map_err(|e| store_err("creating table", e))?;

    Ok(())
}

impl RecordSource for ScyllaRecordStore {
    fn source_id(&self) -> SourceId {
        SourceId::new(&self.keyspace, &self.table)
    }

    async fn fetch_records(&self) -> Result<Vec<RawRecord>> {
        let pager = self
            .session
            .query_iter(
                format!("SELECT class, data FROM {}.{}", self.keyspace, self.table),
                &[],
            )
            .await
            .map_err(|e| store_err("querying records", e))?;
        let rows: Vec<(String, String)> = pager
            .rows_stream::<(String, String)>()
            .map_err(|e| store_err("reading rows", e))?
            .try_collect()
            .await
            .map_err(|e| store_err("reading rows", e))?;

        info!(
            "Fetched {} records from {}.{}",
            rows.len(),
            self.keyspace,
            self.table
        );

        rows.into_iter()
            .map(|(class, data)| {
                let data = serde_json::from_str(&data)
                    .map_err(|source| MapError::InvalidRecord {
                        class: class.clone(),
                        source,
                    })?;
                Ok(RawRecord { class, data })
            })
            .collect()
    }
}
