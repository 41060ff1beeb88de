//! Loading raw map records and partitioning them by entity kind.
//!
//! Records arrive as `{class, data}` documents from a record source (a
//! document store, a collection dump or a flattened map snapshot). They are
//! parsed into typed payloads here; geometry is built afterwards by
//! [`crate::geometry::build_map`].

mod file;
mod snapshot;

pub use file::{JsonLinesSource, SnapshotFileSource};
pub use snapshot::flatten_snapshot;

use std::future::Future;

use hashbrown::HashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MapError, Result};
use crate::models::{AoiRecord, Header, JunctionRecord, LaneRecord, PoiRecord, RoadRecord};

/// One stored map document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub class: String,
    pub data: serde_json::Value,
}

impl RawRecord {
    pub fn new(class: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            class: class.into(),
            data,
        }
    }

    /// The payload's `id`, if it has one (the header does not).
    pub fn id(&self) -> Option<i64> {
        self.data.get("id").and_then(|v| v.as_i64())
    }
}

/// Identity of a data source: where the records came from.
///
/// Keys the snapshot cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId {
    /// Database / keyspace, or the directory of a file source
    pub namespace: String,
    /// Collection / table, or the file name
    pub collection: String,
}

impl SourceId {
    pub fn new(namespace: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            collection: collection.into(),
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.namespace, self.collection)
    }
}

/// Something map records can be fetched from.
pub trait RecordSource {
    fn source_id(&self) -> SourceId;

    fn fetch_records(&self) -> impl Future<Output = Result<Vec<RawRecord>>> + Send;
}

/// Records partitioned by kind, before any geometry is built.
#[derive(Debug, Clone)]
pub struct RawMap {
    pub header: Header,
    pub lanes: HashMap<i64, LaneRecord>,
    pub roads: HashMap<i64, RoadRecord>,
    pub junctions: HashMap<i64, JunctionRecord>,
    pub aois: HashMap<i64, AoiRecord>,
    pub pois: HashMap<i64, PoiRecord>,
}

fn parse_payload<T: DeserializeOwned>(class: &str, data: serde_json::Value) -> Result<T> {
    serde_json::from_value(data).map_err(|source| MapError::InvalidRecord {
        class: class.to_string(),
        source,
    })
}

/// Split records into per-kind maps keyed by id.
///
/// A later record with the same id replaces an earlier one, so the result is
/// deterministic for a given input order. Fails with
/// [`MapError::MissingHeader`] when no header record is present.
pub fn partition_records<I>(records: I) -> Result<RawMap>
where
    I: IntoIterator<Item = RawRecord>,
{
    let mut header = None;
    let mut lanes = HashMap::new();
    let mut roads = HashMap::new();
    let mut junctions = HashMap::new();
    let mut aois = HashMap::new();
    let mut pois = HashMap::new();
    let mut skipped = 0usize;

    for RawRecord { class, data } in records {
        match class.as_str() {
            "header" => header = Some(parse_payload::<Header>(&class, data)?),
            "lane" => {
                let lane: LaneRecord = parse_payload(&class, data)?;
                lanes.insert(lane.id, lane);
            }
            "road" => {
                let road: RoadRecord = parse_payload(&class, data)?;
                roads.insert(road.id, road);
            }
            "junction" => {
                let junction: JunctionRecord = parse_payload(&class, data)?;
                junctions.insert(junction.id, junction);
            }
            "aoi" => {
                let aoi: AoiRecord = parse_payload(&class, data)?;
                aois.insert(aoi.id, aoi);
            }
            "poi" => {
                let poi: PoiRecord = parse_payload(&class, data)?;
                pois.insert(poi.id, poi);
            }
            other => {
                debug!("Skipping record of unknown class {:?}", other);
                skipped += 1;
            }
        }
    }

    let header = header.ok_or(MapError::MissingHeader)?;

    info!(
        "Loaded map '{}': {} lanes, {} roads, {} junctions, {} aois, {} pois ({} skipped)",
        header.name,
        lanes.len(),
        roads.len(),
        junctions.len(),
        aois.len(),
        pois.len(),
        skipped
    );

    Ok(RawMap {
        header,
        lanes,
        roads,
        junctions,
        aois,
        pois,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn header() -> RawRecord {
        RawRecord::new(
            "header",
            json!({"name": "test", "projection": "+proj=tmerc +lat_0=39.9 +lon_0=116.4"}),
        )
    }

    fn lane(id: i64, max_speed: f64) -> RawRecord {
        RawRecord::new(
            "lane",
            json!({
                "id": id,
                "type": 1,
                "max_speed": max_speed,
                "center_line": {"nodes": [{"x": 0.0, "y": 0.0}, {"x": 1.0, "y": 0.0}]}
            }),
        )
    }

    #[test]
    fn test_partition_by_class() {
        let records = vec![
            lane(1, 10.0),
            header(),
            RawRecord::new("road", json!({"id": 200000000, "lane_ids": [1]})),
            RawRecord::new("junction", json!({"id": 300000000, "lane_ids": []})),
            RawRecord::new(
                "poi",
                json!({"id": 700000000, "category": "131300", "position": {"x": 1.0, "y": 2.0}}),
            ),
            RawRecord::new("person", json!({"id": 1})),
        ];
        let raw = partition_records(records).unwrap();
        assert_eq!(raw.header.name, "test");
        assert_eq!(raw.lanes.len(), 1);
        assert_eq!(raw.roads[&200000000].lane_ids, vec![1]);
        assert_eq!(raw.junctions.len(), 1);
        assert_eq!(raw.pois[&700000000].category, "131300");
        assert!(raw.aois.is_empty());
    }

    #[test]
    fn test_missing_header_is_fatal() {
        let err = partition_records(vec![lane(1, 10.0)]).unwrap_err();
        assert!(matches!(err, MapError::MissingHeader));
    }

    #[test]
    fn test_duplicate_id_last_write_wins() {
        let raw = partition_records(vec![header(), lane(1, 10.0), lane(1, 20.0)]).unwrap();
        assert_eq!(raw.lanes[&1].max_speed, 20.0);
    }

    #[test]
    fn test_malformed_payload_is_invalid_record() {
        let bad = RawRecord::new("aoi", json!({"id": "not-a-number"}));
        let err = partition_records(vec![header(), bad]).unwrap_err();
        assert!(matches!(err, MapError::InvalidRecord { ref class, .. } if class == "aoi"));
    }
}
