//! Lanes: directed driving or walking path segments.

use geo::LineString;
use serde::{Deserialize, Serialize};

use super::{LaneConnectionType, LanePosition, LaneTurn, LaneType, XyPosition};

/// Ordered polyline as stored by the map producer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polyline {
    #[serde(default)]
    pub nodes: Vec<XyPosition>,
}

/// Link to a neighbouring lane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaneConnection {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub connection_type: LaneConnectionType,
}

/// Region where this lane overlaps another one (inside junctions).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaneOverlap {
    #[serde(rename = "self")]
    pub self_position: LanePosition,
    pub other: LanePosition,
    #[serde(default)]
    pub self_first: bool,
}

/// Lane payload as read from the data source.
#[derive(Debug, Clone, Deserialize)]
pub struct LaneRecord {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub lane_type: LaneType,
    #[serde(default)]
    pub turn: LaneTurn,
    #[serde(default)]
    pub max_speed: f64,
    #[serde(default)]
    pub length: f64,
    #[serde(default)]
    pub width: f64,
    pub center_line: Polyline,
    #[serde(default)]
    pub left_border_line: Option<Polyline>,
    #[serde(default)]
    pub right_border_line: Option<Polyline>,
    #[serde(default)]
    pub predecessors: Vec<LaneConnection>,
    #[serde(default)]
    pub successors: Vec<LaneConnection>,
    #[serde(default)]
    pub left_lane_ids: Vec<i64>,
    #[serde(default)]
    pub right_lane_ids: Vec<i64>,
    #[serde(default)]
    pub parent_id: i64,
    #[serde(default)]
    pub overlaps: Vec<LaneOverlap>,
    #[serde(default)]
    pub aoi_ids: Vec<i64>,
}

/// A lane with its centerline built in both coordinate systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    pub id: i64,
    #[serde(rename = "type")]
    pub lane_type: LaneType,
    pub turn: LaneTurn,
    /// Speed limit in m/s
    pub max_speed: f64,
    /// Centerline length in meters
    pub length: f64,
    pub width: f64,
    pub center_line: Polyline,
    pub left_border_line: Option<Polyline>,
    pub right_border_line: Option<Polyline>,
    /// A lane inside a junction has at most one predecessor and one successor.
    /// Driving lanes always connect to the tail of their predecessors.
    pub predecessors: Vec<LaneConnection>,
    /// Driving lanes always connect to the head of their successors.
    pub successors: Vec<LaneConnection>,
    /// Adjacent lanes on the left, nearest first
    pub left_lane_ids: Vec<i64>,
    /// Adjacent lanes on the right, nearest first
    pub right_lane_ids: Vec<i64>,
    /// Owning road or junction
    pub parent_id: i64,
    pub overlaps: Vec<LaneOverlap>,
    pub aoi_ids: Vec<i64>,
    pub shape_xy: LineString<f64>,
    pub shape_lnglat: LineString<f64>,
}

impl Lane {
    pub(crate) fn from_record(
        record: LaneRecord,
        shape_xy: LineString<f64>,
        shape_lnglat: LineString<f64>,
    ) -> Self {
        Self {
            id: record.id,
            lane_type: record.lane_type,
            turn: record.turn,
            max_speed: record.max_speed,
            length: record.length,
            width: record.width,
            center_line: record.center_line,
            left_border_line: record.left_border_line,
            right_border_line: record.right_border_line,
            predecessors: record.predecessors,
            successors: record.successors,
            left_lane_ids: record.left_lane_ids,
            right_lane_ids: record.right_lane_ids,
            parent_id: record.parent_id,
            overlaps: record.overlaps,
            aoi_ids: record.aoi_ids,
            shape_xy,
            shape_lnglat,
        }
    }

    pub fn is_driving(&self) -> bool {
        self.lane_type == LaneType::Driving
    }

    /// Copy without the border lines and overlaps, which nothing downstream uses.
    pub fn public_view(&self) -> Self {
        Self {
            left_border_line: None,
            right_border_line: None,
            overlaps: Vec::new(),
            ..self.clone()
        }
    }
}
