//! Error taxonomy for map loading and queries.

use thiserror::Error;

use crate::models::EntityKind;

pub type Result<T> = std::result::Result<T, MapError>;

#[derive(Debug, Error)]
pub enum MapError {
    /// No header record was present; the projector cannot be built without it.
    #[error("map data has no header record")]
    MissingHeader,

    #[error("malformed projection {definition:?}: {reason}")]
    MalformedProjection { definition: String, reason: String },

    /// The road owns no driving lanes, so it has no middle lane to take geometry from.
    #[error("road {road_id} has no driving lanes to derive its geometry from")]
    InvalidRoadGeometry { road_id: i64 },

    #[error("data consistency error: {0}")]
    DataConsistency(String),

    #[error("unsupported {what}: {value}")]
    UnsupportedKind { what: &'static str, value: String },

    #[error("{kind} {id} not found")]
    UnknownReference { kind: EntityKind, id: i64 },

    #[error("invalid {class} record: {source}")]
    InvalidRecord {
        class: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("record store error: {0}")]
    Store(String),
}

impl MapError {
    pub(crate) fn unknown(kind: EntityKind, id: i64) -> Self {
        MapError::UnknownReference { kind, id }
    }

    pub(crate) fn unsupported(what: &'static str, value: impl ToString) -> Self {
        MapError::UnsupportedKind {
            what,
            value: value.to_string(),
        }
    }
}
