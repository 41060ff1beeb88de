//! Flattening a whole-map snapshot into `{class, data}` records.

use serde_json::Value;
use tracing::debug;

use super::RawRecord;
use crate::error::{MapError, Result};

/// Record class for a snapshot's top-level field.
fn class_for_field(field: &str) -> Option<&'static str> {
    match field {
        "header" => Some("header"),
        "lanes" => Some("lane"),
        "roads" => Some("road"),
        "junctions" => Some("junction"),
        "aois" => Some("aoi"),
        "pois" => Some("poi"),
        _ => None,
    }
}

/// Walk a map snapshot's top-level fields by name: repeated fields become one
/// record per element, singular fields a single record.
pub fn flatten_snapshot(snapshot: Value) -> Result<Vec<RawRecord>> {
    let Value::Object(fields) = snapshot else {
        return Err(MapError::DataConsistency(
            "map snapshot must be a JSON object".to_string(),
        ));
    };

    let mut records = Vec::new();
    for (field, value) in fields {
        let Some(class) = class_for_field(&field) else {
            debug!("Ignoring snapshot field {:?}", field);
            continue;
        };
        match value {
            Value::Array(items) => {
                records.extend(items.into_iter().map(|item| RawRecord::new(class, item)));
            }
            Value::Null => {}
            single => records.push(RawRecord::new(class, single)),
        }
    }
    Ok(records)
}
