//! A small hand-made map shared by unit tests.
//!
//! ```text
//!            lane 400 (junction 20, going north from x=40)
//!                                         |
//!  (0,0) --lane 100--> (20,0) --lane 200--> (40,0)      road 10
//!  (0,-1) -------------lane 300------------> (40,-1)     road 11 (walking only)
//!  [ AOI A: (0..10, -10..-2) ]   [ AOI B: (20..30, -10..-2) ]
//! ```

use serde_json::json;

use crate::engine::MapEngine;
use crate::geometry::build_map;
use crate::loader::{partition_records, RawRecord};
use crate::models::MapData;

pub const PROJECTION: &str =
    "+proj=tmerc +lat_0=39.90611 +lon_0=116.3911 +k=1 +x_0=0 +y_0=0 +ellps=WGS84 +units=m +no_defs";

pub const LANE_100: i64 = 100;
pub const LANE_200: i64 = 200;
pub const LANE_300: i64 = 300;
pub const LANE_400: i64 = 400;
pub const ROAD_10: i64 = 10;
pub const ROAD_11: i64 = 11;
pub const JUNCTION_20: i64 = 20;
pub const AOI_A: i64 = 500_000_001;
pub const AOI_B: i64 = 500_000_002;
pub const POI_LIBRARY: i64 = 700_000_001;
pub const POI_BANK: i64 = 700_000_002;

fn nodes(points: &[(f64, f64)]) -> serde_json::Value {
    json!({ "nodes": points.iter().map(|(x, y)| json!({"x": x, "y": y})).collect::<Vec<_>>() })
}

fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> serde_json::Value {
    json!([
        {"x": x0, "y": y0},
        {"x": x1, "y": y0},
        {"x": x1, "y": y1},
        {"x": x0, "y": y1}
    ])
}

pub fn fixture_records() -> Vec<RawRecord> {
    vec![
        RawRecord::new(
            "header",
            json!({
                "name": "fixture",
                "date": "2024-01-01",
                "north": 10000.0,
                "south": -10000.0,
                "east": 10000.0,
                "west": -10000.0,
                "projection": PROJECTION
            }),
        ),
        RawRecord::new(
            "lane",
            json!({
                "id": LANE_100,
                "type": 1,
                "turn": 1,
                "max_speed": 10.0,
                "length": 20.0,
                "width": 3.2,
                "center_line": nodes(&[(0.0, 0.0), (20.0, 0.0)]),
                "left_border_line": nodes(&[(0.0, 1.6), (20.0, 1.6)]),
                "right_border_line": nodes(&[(0.0, -1.6), (20.0, -1.6)]),
                "successors": [{"id": LANE_200, "type": 1}],
                "parent_id": ROAD_10,
                "overlaps": [{
                    "self": {"lane_id": LANE_100, "s": 19.0},
                    "other": {"lane_id": LANE_300, "s": 19.0},
                    "self_first": true
                }],
                "aoi_ids": [AOI_A]
            }),
        ),
        RawRecord::new(
            "lane",
            json!({
                "id": LANE_200,
                "type": 1,
                "turn": 1,
                "max_speed": 12.0,
                "length": 20.0,
                "width": 3.2,
                "center_line": nodes(&[(20.0, 0.0), (40.0, 0.0)]),
                "predecessors": [{"id": LANE_100, "type": 2}],
                "successors": [{"id": LANE_400, "type": 1}],
                "parent_id": ROAD_10,
                "aoi_ids": [AOI_B]
            }),
        ),
        RawRecord::new(
            "lane",
            json!({
                "id": LANE_300,
                "type": 2,
                "turn": 1,
                "max_speed": 1.4,
                "length": 40.0,
                "width": 2.0,
                "center_line": nodes(&[(0.0, -1.0), (40.0, -1.0)]),
                "parent_id": ROAD_11,
                "aoi_ids": [AOI_A, AOI_B]
            }),
        ),
        RawRecord::new(
            "lane",
            json!({
                "id": LANE_400,
                "type": 1,
                "turn": 2,
                "max_speed": 8.0,
                "length": 20.0,
                "width": 3.2,
                "center_line": nodes(&[(40.0, 0.0), (40.0, 20.0)]),
                "predecessors": [{"id": LANE_200, "type": 2}],
                "parent_id": JUNCTION_20
            }),
        ),
        RawRecord::new("road", json!({"id": ROAD_10, "lane_ids": [LANE_100, LANE_200]})),
        RawRecord::new("road", json!({"id": ROAD_11, "lane_ids": [LANE_300]})),
        RawRecord::new(
            "junction",
            json!({
                "id": JUNCTION_20,
                "lane_ids": [LANE_400],
                "driving_lane_groups": [{
                    "in_road_id": ROAD_10,
                    "out_road_id": ROAD_10,
                    "lane_ids": [LANE_400],
                    "turn": 2
                }]
            }),
        ),
        RawRecord::new(
            "aoi",
            json!({
                "id": AOI_A,
                "type": 7,
                "positions": square(0.0, -10.0, 10.0, -2.0),
                "area": 80.0,
                "driving_positions": [{"lane_id": LANE_100, "s": 5.0}],
                "walking_positions": [{"lane_id": LANE_300, "s": 5.0}],
                "driving_gates": [{"x": 5.0, "y": -2.0}],
                "walking_gates": [{"x": 5.0, "y": -2.0}],
                "urban_land_use": "R",
                "land_use": 5,
                "poi_ids": [POI_LIBRARY],
                "external": {
                    "name": "Block A",
                    "driving_distances": [2.0],
                    "driving_lane_project_point": [{"x": 5.0, "y": 0.0}]
                }
            }),
        ),
        RawRecord::new(
            "aoi",
            json!({
                "id": AOI_B,
                "type": 7,
                "positions": square(20.0, -10.0, 30.0, -2.0),
                "area": 80.0,
                "driving_positions": [{"lane_id": LANE_200, "s": 3.0}],
                "walking_positions": [{"lane_id": LANE_300, "s": 25.0}],
                "driving_gates": [{"x": 23.0, "y": -2.0}],
                "walking_gates": [{"x": 25.0, "y": -2.0}],
                "urban_land_use": "B",
                "land_use": 6,
                "poi_ids": [POI_BANK]
            }),
        ),
        RawRecord::new(
            "poi",
            json!({
                "id": POI_LIBRARY,
                "name": "Library",
                "category": "131300",
                "position": {"x": 5.0, "y": -6.0},
                "aoi_id": AOI_A
            }),
        ),
        RawRecord::new(
            "poi",
            json!({
                "id": POI_BANK,
                "name": "Bank",
                "category": "100000",
                "position": {"x": 25.0, "y": -6.0},
                "aoi_id": AOI_B
            }),
        ),
    ]
}

pub fn fixture_map_data() -> MapData {
    build_map(partition_records(fixture_records()).unwrap()).unwrap()
}

pub fn fixture_engine() -> MapEngine {
    MapEngine::from_records(fixture_records()).unwrap()
}
