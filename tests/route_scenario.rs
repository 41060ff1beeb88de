//! End-to-end route reconstruction: a small map loaded from a record dump,
//! routes parsed from routing service JSON, geometry checked in both planar
//! and geographic coordinates.

use geojson::Value;
use serde_json::json;

use citymap::cache::SnapshotCache;
use citymap::loader::{JsonLinesSource, RawRecord};
use citymap::models::{RouteRequest, RouteResponse};
use citymap::{MapEngine, MapError};

const AOI_HOME: i64 = 500_000_001;
const AOI_OFFICE: i64 = 500_000_002;

fn nodes(points: &[(f64, f64)]) -> serde_json::Value {
    json!({ "nodes": points.iter().map(|(x, y)| json!({"x": x, "y": y})).collect::<Vec<_>>() })
}

fn block(x0: f64, x1: f64) -> serde_json::Value {
    json!([
        {"x": x0, "y": -10.0},
        {"x": x1, "y": -10.0},
        {"x": x1, "y": -2.0},
        {"x": x0, "y": -2.0}
    ])
}

/// Two blocks south of a two-lane street, with a sidewalk along both.
fn records() -> Vec<RawRecord> {
    vec![
        RawRecord::new(
            "header",
            json!({
                "name": "scenario",
                "projection": "+proj=tmerc +lat_0=39.90611 +lon_0=116.3911 +ellps=WGS84 +units=m +no_defs"
            }),
        ),
        RawRecord::new(
            "lane",
            json!({
                "id": 1, "type": 1, "turn": 1, "max_speed": 10.0, "length": 20.0,
                "center_line": nodes(&[(0.0, 0.0), (20.0, 0.0)]),
                "successors": [{"id": 2, "type": 1}],
                "parent_id": 200_000_001
            }),
        ),
        RawRecord::new(
            "lane",
            json!({
                "id": 2, "type": 1, "turn": 1, "max_speed": 10.0, "length": 20.0,
                "center_line": nodes(&[(20.0, 0.0), (40.0, 0.0)]),
                "predecessors": [{"id": 1, "type": 2}],
                "parent_id": 200_000_001
            }),
        ),
        RawRecord::new(
            "lane",
            json!({
                "id": 3, "type": 2, "turn": 1, "max_speed": 1.4, "length": 40.0,
                "center_line": nodes(&[(0.0, -1.0), (40.0, -1.0)]),
                "parent_id": 200_000_002
            }),
        ),
        RawRecord::new("road", json!({"id": 200_000_001, "lane_ids": [1, 2]})),
        RawRecord::new("road", json!({"id": 200_000_002, "lane_ids": [3]})),
        RawRecord::new(
            "aoi",
            json!({
                "id": AOI_HOME, "type": 7, "positions": block(0.0, 10.0), "area": 80.0,
                "driving_positions": [{"lane_id": 1, "s": 5.0}],
                "walking_positions": [{"lane_id": 3, "s": 5.0}]
            }),
        ),
        RawRecord::new(
            "aoi",
            json!({
                "id": AOI_OFFICE, "type": 7, "positions": block(20.0, 30.0), "area": 80.0,
                "driving_positions": [{"lane_id": 2, "s": 3.0}],
                "walking_positions": [{"lane_id": 3, "s": 25.0}]
            }),
        ),
    ]
}

fn route(request: serde_json::Value, response: serde_json::Value) -> (RouteRequest, RouteResponse) {
    (
        serde_json::from_value(request).unwrap(),
        serde_json::from_value(response).unwrap(),
    )
}

fn home_to_office(route_type: &str) -> serde_json::Value {
    json!({
        "type": route_type,
        "start": {"aoi_position": {"aoi_id": AOI_HOME}},
        "end": {"aoi_position": {"aoi_id": AOI_OFFICE}}
    })
}

fn assert_xy(actual: &[geo::Coord<f64>], expected: &[(f64, f64)]) {
    let actual: Vec<(f64, f64)> = actual.iter().map(|c| (c.x, c.y)).collect();
    assert_eq!(actual.len(), expected.len(), "{:?}", actual);
    for (a, e) in actual.iter().zip(expected) {
        assert!((a.0 - e.0).abs() < 1e-9 && (a.1 - e.1).abs() < 1e-9, "{:?} != {:?}", actual, expected);
    }
}

#[test]
fn test_driving_route_between_blocks() {
    let engine = MapEngine::from_records(records()).unwrap();
    let (req, res) = route(
        home_to_office("ROUTE_TYPE_DRIVING"),
        json!({"journeys": [{"type": 1, "driving": {"road_ids": [200_000_001], "eta": 12.5}}]}),
    );

    let coords = engine.route_to_xy(&req, &res).unwrap();
    assert_xy(
        &coords,
        &[(5.0, -6.0), (5.0, 0.0), (20.0, 0.0), (20.0, 0.0), (23.0, 0.0), (25.0, -6.0)],
    );
    assert_eq!(engine.estimate_route_time(&req, &res).unwrap(), 12.5);

    let feature = engine
        .export_route_as_geojson(&req, &res, Default::default())
        .unwrap();
    let Some(geojson::Geometry { value: Value::LineString(line), .. }) = &feature.geometry else {
        panic!("expected a line string");
    };
    assert_eq!(line.len(), coords.len());
    for (position, c) in line.iter().zip(&coords) {
        let (x, y) = engine.lnglat_to_xy(position[0], position[1]);
        assert!((x - c.x).abs() < 1e-6 && (y - c.y).abs() < 1e-6);
        // Near the projection origin.
        assert!((position[0] - 116.3911).abs() < 1e-3);
        assert!((position[1] - 39.90611).abs() < 1e-3);
    }
}

#[test]
fn test_walking_route_back_and_forth() {
    let engine = MapEngine::from_records(records()).unwrap();

    let (req, res) = route(
        home_to_office("ROUTE_TYPE_WALKING"),
        json!({"journeys": [{"type": "JOURNEY_TYPE_WALKING", "walking": {
            "route": [{"lane_id": 3, "moving_direction": "MOVING_DIRECTION_FORWARD"}],
            "eta": 14.0
        }}]}),
    );
    assert_xy(
        &engine.route_to_xy(&req, &res).unwrap(),
        &[(5.0, -6.0), (5.0, -1.0), (25.0, -1.0), (25.0, -6.0)],
    );

    let (req, res) = route(
        json!({
            "type": 2,
            "start": {"aoi_position": {"aoi_id": AOI_OFFICE}},
            "end": {"lane_position": {"lane_id": 3, "s": 2.0}}
        }),
        json!({"journeys": [{"type": 2, "walking": {
            "route": [{"lane_id": 3, "moving_direction": 2}],
            "eta": 16.6
        }}]}),
    );
    assert_xy(
        &engine.route_to_xy(&req, &res).unwrap(),
        &[(25.0, -6.0), (25.0, -1.0), (2.0, -1.0)],
    );
}

#[test]
fn test_route_through_wrong_road_is_rejected() {
    let engine = MapEngine::from_records(records()).unwrap();
    let (req, res) = route(
        home_to_office("ROUTE_TYPE_DRIVING"),
        json!({"journeys": [{"type": 1, "driving": {"road_ids": [200_000_002], "eta": 1.0}}]}),
    );
    let err = engine.route_to_xy(&req, &res).unwrap_err();
    assert!(matches!(err, MapError::DataConsistency(_)), "{}", err);
}

#[tokio::test]
async fn test_route_after_cached_reload() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("scenario.jsonl");
    let lines: Vec<String> = records()
        .iter()
        .map(|r| serde_json::to_string(r).unwrap())
        .collect();
    std::fs::write(&dump, lines.join("\n")).unwrap();

    let source = JsonLinesSource::new(&dump);
    let cache = SnapshotCache::new(dir.path().join("cache")).unwrap();
    let first = MapEngine::load(&source, Some(&cache)).await.unwrap();

    // The second load is served from the cache even with the dump gone.
    std::fs::remove_file(&dump).unwrap();
    let second = MapEngine::load(&source, Some(&cache)).await.unwrap();

    let (req, res) = route(
        home_to_office("ROUTE_TYPE_DRIVING"),
        json!({"journeys": [{"type": 1, "driving": {"road_ids": [200_000_001], "eta": 12.5}}]}),
    );
    assert_eq!(
        first.route_to_xy(&req, &res).unwrap(),
        second.route_to_xy(&req, &res).unwrap()
    );
}
