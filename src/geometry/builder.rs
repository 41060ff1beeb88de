//! Builds derived geometry and aggregate attributes for loaded records.
//!
//! Lanes are built first; roads and junctions read lane geometry, AOIs and
//! POIs are independent.

use geo::{Centroid, Coord, LineString, MultiLineString, Point, Polygon};
use hashbrown::HashMap;
use rayon::prelude::*;
use tracing::{info, warn};

use super::Projector;
use crate::error::{MapError, Result};
use crate::loader::RawMap;
use crate::models::{
    Aoi, AoiRecord, AoiShape, EntityKind, Junction, JunctionRecord, Lane, LaneRecord, LaneType,
    LaneConnectionType, MapData, Poi, PoiRecord, Road, RoadGeometry, RoadRecord, XyPosition,
};

/// Index of the lane a road takes its geometry from: the middle one, rounding
/// towards the right-hand (higher) index for even counts. `None` for zero lanes.
pub fn middle_driving_lane_index(driving_lane_count: usize) -> Option<usize> {
    if driving_lane_count == 0 {
        None
    } else {
        Some(driving_lane_count / 2)
    }
}

pub fn build_lane(record: LaneRecord, projector: &Projector) -> Result<Lane> {
    if record.center_line.nodes.is_empty() {
        return Err(MapError::DataConsistency(format!(
            "lane {} has an empty center line",
            record.id
        )));
    }
    let xy: Vec<Coord<f64>> = record
        .center_line
        .nodes
        .iter()
        .map(|p| Coord::from(*p))
        .collect();
    let lnglat = projector.unproject_many(&xy);
    Ok(Lane::from_record(
        record,
        LineString::new(xy),
        LineString::new(lnglat),
    ))
}

/// Driving lanes of a road in order, with the middle lane's attributes.
pub fn derive_road_geometry(
    road_id: i64,
    driving_lane_ids: &[i64],
    lanes: &HashMap<i64, Lane>,
) -> Result<RoadGeometry> {
    let index = middle_driving_lane_index(driving_lane_ids.len())
        .ok_or(MapError::InvalidRoadGeometry { road_id })?;
    let center_lane_id = driving_lane_ids[index];
    let lane = lanes
        .get(&center_lane_id)
        .ok_or(MapError::unknown(EntityKind::Lane, center_lane_id))?;
    Ok(RoadGeometry {
        center_lane_id,
        length: lane.length,
        max_speed: lane.max_speed,
        shape_xy: lane.shape_xy.clone(),
        shape_lnglat: lane.shape_lnglat.clone(),
    })
}

pub fn build_road(record: RoadRecord, lanes: &HashMap<i64, Lane>) -> Result<Road> {
    let mut driving_lane_ids = Vec::new();
    for lane_id in &record.lane_ids {
        let lane = lanes
            .get(lane_id)
            .ok_or(MapError::unknown(EntityKind::Lane, *lane_id))?;
        if lane.lane_type == LaneType::Driving {
            driving_lane_ids.push(*lane_id);
        }
    }

    let geometry = match derive_road_geometry(record.id, &driving_lane_ids, lanes) {
        Ok(geometry) => Some(geometry),
        Err(MapError::InvalidRoadGeometry { .. }) => None,
        Err(e) => return Err(e),
    };

    Ok(Road {
        id: record.id,
        lane_ids: record.lane_ids,
        driving_lane_ids,
        geometry,
    })
}

/// Junction center: the length-weighted centroid of the owned lanes' centerlines.
/// Lanes that overlap count once per lane.
pub fn build_junction(record: JunctionRecord, lanes: &HashMap<i64, Lane>) -> Result<Junction> {
    let mut shapes = Vec::with_capacity(record.lane_ids.len());
    for lane_id in &record.lane_ids {
        let lane = lanes
            .get(lane_id)
            .ok_or(MapError::unknown(EntityKind::Lane, *lane_id))?;
        shapes.push(lane.shape_xy.clone());
    }
    let center = MultiLineString::new(shapes)
        .centroid()
        .map(|p| XyPosition::new(p.x(), p.y()));
    Ok(Junction::from_record(record, center))
}

pub fn build_aoi(record: AoiRecord, projector: &Projector) -> Result<Aoi> {
    let Some(first) = record.positions.first() else {
        return Err(MapError::DataConsistency(format!(
            "aoi {} has no boundary positions",
            record.id
        )));
    };

    let (shape_xy, shape_lnglat) = if record.area.is_none() {
        let (lng, lat) = projector.unproject(first.x, first.y);
        (
            AoiShape::Point(Point::new(first.x, first.y)),
            AoiShape::Point(Point::new(lng, lat)),
        )
    } else {
        let xy: Vec<Coord<f64>> = record.positions.iter().map(|p| Coord::from(*p)).collect();
        let lnglat = projector.unproject_many(&xy);
        (
            AoiShape::Polygon(Polygon::new(LineString::new(xy), vec![])),
            AoiShape::Polygon(Polygon::new(LineString::new(lnglat), vec![])),
        )
    };
    Ok(Aoi::from_record(record, shape_xy, shape_lnglat))
}

pub fn build_poi(record: PoiRecord, projector: &Projector) -> Poi {
    let (lng, lat) = projector.unproject(record.position.x, record.position.y);
    Poi::from_record(record, Point::new(lng, lat))
}

/// Lanes breaking the connection rules, ids ascending.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConnectionAnomalies {
    /// Junction lanes with more than one predecessor or successor
    pub junction_fan: Vec<i64>,
    /// Driving lanes whose predecessors are not joined at their tail or
    /// whose successors are not joined at their head
    pub misdirected: Vec<i64>,
}

impl ConnectionAnomalies {
    pub fn is_empty(&self) -> bool {
        self.junction_fan.is_empty() && self.misdirected.is_empty()
    }
}

pub fn check_lane_connections(
    lanes: &HashMap<i64, Lane>,
    junctions: &HashMap<i64, Junction>,
) -> ConnectionAnomalies {
    let mut anomalies = ConnectionAnomalies::default();

    let mut junction_lanes: Vec<i64> = junctions
        .values()
        .flat_map(|j| j.lane_ids.iter().copied())
        .collect();
    junction_lanes.sort_unstable();
    junction_lanes.dedup();
    for id in junction_lanes {
        let Some(lane) = lanes.get(&id) else { continue };
        if lane.predecessors.len() > 1 || lane.successors.len() > 1 {
            anomalies.junction_fan.push(id);
        }
    }

    for lane in lanes.values().filter(|l| l.lane_type == LaneType::Driving) {
        let misdirected = lane
            .predecessors
            .iter()
            .any(|c| c.connection_type != LaneConnectionType::Tail)
            || lane
                .successors
                .iter()
                .any(|c| c.connection_type != LaneConnectionType::Head);
        if misdirected {
            anomalies.misdirected.push(lane.id);
        }
    }
    anomalies.misdirected.sort_unstable();

    anomalies
}

/// Build every entity's geometry. Fails on a malformed projection, a dangling
/// lane reference or an entity without coordinates.
pub fn build_map(raw: RawMap) -> Result<MapData> {
    let projector = Projector::from_proj_string(&raw.header.projection)?;

    let lanes: HashMap<i64, Lane> = raw
        .lanes
        .into_iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(id, record)| build_lane(record, &projector).map(|lane| (id, lane)))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .collect();

    let roads = raw
        .roads
        .into_iter()
        .map(|(id, record)| build_road(record, &lanes).map(|road| (id, road)))
        .collect::<Result<HashMap<_, _>>>()?;
    let without_geometry = roads.values().filter(|r| r.geometry.is_none()).count();
    if without_geometry > 0 {
        warn!(
            "{} roads have no driving lanes; their geometry is unavailable",
            without_geometry
        );
    }

    let junctions = raw
        .junctions
        .into_iter()
        .map(|(id, record)| build_junction(record, &lanes).map(|j| (id, j)))
        .collect::<Result<HashMap<_, _>>>()?;

    // Routing tolerates these, so they are reported rather than rejected.
    let anomalies = check_lane_connections(&lanes, &junctions);
    if !anomalies.junction_fan.is_empty() {
        warn!(
            "{} junction lanes have more than one predecessor or successor: {:?}",
            anomalies.junction_fan.len(),
            anomalies.junction_fan
        );
    }
    if !anomalies.misdirected.is_empty() {
        warn!(
            "{} driving lanes connect to the wrong end of a neighbour: {:?}",
            anomalies.misdirected.len(),
            anomalies.misdirected
        );
    }

    let aois = raw
        .aois
        .into_iter()
        .map(|(id, record)| build_aoi(record, &projector).map(|aoi| (id, aoi)))
        .collect::<Result<HashMap<_, _>>>()?;

    let pois = raw
        .pois
        .into_iter()
        .map(|(id, record)| (id, build_poi(record, &projector)))
        .collect::<HashMap<_, _>>();

    info!(
        "Built geometry for {} lanes, {} roads, {} junctions, {} aois, {} pois",
        lanes.len(),
        roads.len(),
        junctions.len(),
        aois.len(),
        pois.len()
    );

    Ok(MapData {
        header: raw.header,
        projector,
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
    use crate::loader::{partition_records, RawRecord};
    use serde_json::json;

    fn projector() -> Projector {
        Projector::from_proj_string("+proj=tmerc +lat_0=39.9 +lon_0=116.4 +ellps=WGS84").unwrap()
    }

    fn lane_record(id: i64, lane_type: i32, y: f64, length: f64, max_speed: f64) -> LaneRecord {
        serde_json::from_value(json!({
            "id": id,
            "type": lane_type,
            "length": length,
            "max_speed": max_speed,
            "center_line": {"nodes": [{"x": 0.0, "y": y}, {"x": length, "y": y}]}
        }))
        .unwrap()
    }

    fn lanes(records: Vec<LaneRecord>) -> HashMap<i64, Lane> {
        let projector = projector();
        records
            .into_iter()
            .map(|r| (r.id, build_lane(r, &projector).unwrap()))
            .collect()
    }

    #[test]
    fn test_middle_driving_lane_index_edge_counts() {
        assert_eq!(middle_driving_lane_index(0), None);
        assert_eq!(middle_driving_lane_index(1), Some(0));
        assert_eq!(middle_driving_lane_index(2), Some(1));
        assert_eq!(middle_driving_lane_index(3), Some(1));
        assert_eq!(middle_driving_lane_index(4), Some(2));
    }

    #[test]
    fn test_lane_geometry_in_both_frames() {
        let lane = build_lane(lane_record(1, 1, 0.0, 100.0, 10.0), &projector()).unwrap();
        assert_eq!(lane.shape_xy.0.len(), 2);
        assert_eq!(lane.shape_lnglat.0.len(), 2);
        let start = lane.shape_lnglat.0[0];
        assert!((start.x - 116.4).abs() < 1e-9);
        assert!((start.y - 39.9).abs() < 1e-9);
    }

    #[test]
    fn test_road_takes_middle_driving_lane() {
        let lanes = lanes(vec![
            lane_record(1, 2, -3.0, 50.0, 1.5),
            lane_record(10, 1, 0.0, 100.0, 10.0),
            lane_record(11, 1, 3.0, 101.0, 11.0),
            lane_record(12, 1, 6.0, 102.0, 12.0),
        ]);
        let record: RoadRecord =
            serde_json::from_value(json!({"id": 200, "lane_ids": [1, 10, 11, 12]})).unwrap();
        let road = build_road(record, &lanes).unwrap();

        assert_eq!(road.driving_lane_ids, vec![10, 11, 12]);
        let geometry = road.geometry().unwrap();
        assert_eq!(geometry.center_lane_id, 11);
        assert_eq!(geometry.length, 101.0);
        assert_eq!(geometry.max_speed, 11.0);
        assert_eq!(geometry.shape_xy, lanes[&11].shape_xy);
        assert_eq!(geometry.shape_lnglat, lanes[&11].shape_lnglat);
    }

    #[test]
    fn test_road_without_driving_lanes_has_no_geometry() {
        let lanes = lanes(vec![lane_record(1, 2, 0.0, 50.0, 1.5)]);
        let record: RoadRecord =
            serde_json::from_value(json!({"id": 201, "lane_ids": [1]})).unwrap();
        let road = build_road(record, &lanes).unwrap();
        assert!(road.driving_lane_ids.is_empty());
        assert!(matches!(
            road.geometry(),
            Err(MapError::InvalidRoadGeometry { road_id: 201 })
        ));
        assert!(matches!(
            derive_road_geometry(201, &[], &lanes),
            Err(MapError::InvalidRoadGeometry { road_id: 201 })
        ));
    }

    #[test]
    fn test_road_with_dangling_lane_fails() {
        let record: RoadRecord =
            serde_json::from_value(json!({"id": 202, "lane_ids": [99]})).unwrap();
        let err = build_road(record, &HashMap::new()).unwrap_err();
        assert!(matches!(err, MapError::UnknownReference { kind: EntityKind::Lane, id: 99 }));
    }

    #[test]
    fn test_junction_center_is_centroid_of_lanes() {
        let lanes = lanes(vec![
            lane_record(1, 1, 0.0, 10.0, 10.0),
            lane_record(2, 1, 4.0, 10.0, 10.0),
        ]);
        let record: JunctionRecord =
            serde_json::from_value(json!({"id": 300, "lane_ids": [1, 2]})).unwrap();
        let junction = build_junction(record, &lanes).unwrap();
        let center = junction.center.unwrap();
        assert!((center.x - 5.0).abs() < 1e-9);
        assert!((center.y - 2.0).abs() < 1e-9);

        let empty: JunctionRecord = serde_json::from_value(json!({"id": 301})).unwrap();
        assert!(build_junction(empty, &lanes).unwrap().center.is_none());
    }

    #[test]
    fn test_junction_center_weights_overlapping_lanes() {
        // Lanes 1 and 2 share a centerline, so y = 0 counts twice.
        let lanes = lanes(vec![
            lane_record(1, 1, 0.0, 10.0, 10.0),
            lane_record(2, 1, 0.0, 10.0, 10.0),
            lane_record(3, 1, 6.0, 10.0, 10.0),
        ]);
        let record: JunctionRecord =
            serde_json::from_value(json!({"id": 302, "lane_ids": [1, 2, 3]})).unwrap();
        let center = build_junction(record, &lanes).unwrap().center.unwrap();
        assert!((center.x - 5.0).abs() < 1e-9);
        assert!((center.y - 2.0).abs() < 1e-9);
    }

    fn connected_lane(
        id: i64,
        predecessors: serde_json::Value,
        successors: serde_json::Value,
    ) -> LaneRecord {
        serde_json::from_value(json!({
            "id": id,
            "type": 1,
            "length": 10.0,
            "center_line": {"nodes": [{"x": 0.0, "y": 0.0}, {"x": 10.0, "y": 0.0}]},
            "predecessors": predecessors,
            "successors": successors
        }))
        .unwrap()
    }

    #[test]
    fn test_connection_check_flags_fanning_junction_lane() {
        let lanes = lanes(vec![
            connected_lane(1, json!([]), json!([{"id": 2, "type": 1}])),
            connected_lane(
                2,
                json!([{"id": 1, "type": 2}]),
                json!([{"id": 3, "type": 1}, {"id": 4, "type": 1}]),
            ),
            connected_lane(3, json!([{"id": 2, "type": 2}]), json!([])),
            connected_lane(4, json!([{"id": 2, "type": 2}]), json!([])),
        ]);
        let record: JunctionRecord =
            serde_json::from_value(json!({"id": 303, "lane_ids": [2]})).unwrap();
        let junctions: HashMap<i64, Junction> =
            [(303, build_junction(record, &lanes).unwrap())].into_iter().collect();

        let anomalies = check_lane_connections(&lanes, &junctions);
        assert_eq!(anomalies.junction_fan, vec![2]);
        assert!(anomalies.misdirected.is_empty());

        // Outside a junction the same fan-out is allowed.
        assert!(check_lane_connections(&lanes, &HashMap::new()).is_empty());
    }

    #[test]
    fn test_connection_check_flags_misdirected_driving_lanes() {
        let lanes = lanes(vec![
            // Successor joined at its tail
            connected_lane(1, json!([]), json!([{"id": 2, "type": 2}])),
            // Predecessor joined at its head
            connected_lane(2, json!([{"id": 1, "type": 1}]), json!([])),
            connected_lane(3, json!([{"id": 1, "type": 2}]), json!([{"id": 2, "type": 1}])),
        ]);
        let anomalies = check_lane_connections(&lanes, &HashMap::new());
        assert_eq!(anomalies.misdirected, vec![1, 2]);
        assert!(anomalies.junction_fan.is_empty());
    }

    #[test]
    fn test_fixture_map_has_consistent_connections() {
        let data = crate::engine::fixtures::fixture_map_data();
        assert_eq!(
            check_lane_connections(&data.lanes, &data.junctions),
            ConnectionAnomalies::default()
        );
    }

    #[test]
    fn test_aoi_polygon_or_point() {
        let projector = projector();
        let polygon: AoiRecord = serde_json::from_value(json!({
            "id": 500,
            "area": 100.0,
            "positions": [{"x": 0, "y": 0}, {"x": 10, "y": 0}, {"x": 10, "y": 10}, {"x": 0, "y": 10}]
        }))
        .unwrap();
        let aoi = build_aoi(polygon, &projector).unwrap();
        assert!(matches!(aoi.shape_xy, AoiShape::Polygon(_)));
        assert!(matches!(aoi.shape_lnglat, AoiShape::Polygon(_)));
        let centroid = aoi.shape_xy.centroid().unwrap();
        assert!((centroid.x() - 5.0).abs() < 1e-9 && (centroid.y() - 5.0).abs() < 1e-9);

        let point: AoiRecord = serde_json::from_value(json!({
            "id": 501,
            "positions": [{"x": 3, "y": 4}, {"x": 10, "y": 0}]
        }))
        .unwrap();
        let aoi = build_aoi(point, &projector).unwrap();
        assert_eq!(aoi.shape_xy, AoiShape::Point(Point::new(3.0, 4.0)));
    }

    #[test]
    fn test_build_map_rejects_bad_projection() {
        let raw = partition_records(vec![RawRecord::new(
            "header",
            json!({"projection": "+proj=unknown"}),
        )])
        .unwrap();
        assert!(matches!(
            build_map(raw),
            Err(MapError::MalformedProjection { .. })
        ));
    }
}
