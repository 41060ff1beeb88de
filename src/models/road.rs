//! Roads and junctions.

use geo::LineString;
use serde::{Deserialize, Serialize};

use super::{LaneTurn, XyPosition};
use crate::error::{MapError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct RoadRecord {
    pub id: i64,
    #[serde(default)]
    pub lane_ids: Vec<i64>,
}

/// Attributes a road takes over from its middle driving lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadGeometry {
    /// Id of the driving lane the geometry was taken from
    pub center_lane_id: i64,
    pub length: f64,
    pub max_speed: f64,
    pub shape_xy: LineString<f64>,
    pub shape_lnglat: LineString<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Road {
    pub id: i64,
    /// Driving and walking lanes, in producer order
    pub lane_ids: Vec<i64>,
    /// Driving lanes only, order preserved
    pub driving_lane_ids: Vec<i64>,
    /// `None` when the road owns no driving lanes
    pub geometry: Option<RoadGeometry>,
}

impl Road {
    /// Derived geometry, or `InvalidRoadGeometry` for a road without driving lanes.
    pub fn geometry(&self) -> Result<&RoadGeometry> {
        self.geometry
            .as_ref()
            .ok_or(MapError::InvalidRoadGeometry { road_id: self.id })
    }

    pub fn public_view(&self) -> Self {
        self.clone()
    }
}

/// Lanes connecting one incoming road to one outgoing road.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JunctionLaneGroup {
    pub in_road_id: i64,
    #[serde(default)]
    pub in_angle: f64,
    pub out_road_id: i64,
    #[serde(default)]
    pub out_angle: f64,
    #[serde(default)]
    pub lane_ids: Vec<i64>,
    #[serde(default)]
    pub turn: LaneTurn,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JunctionRecord {
    pub id: i64,
    #[serde(default)]
    pub lane_ids: Vec<i64>,
    #[serde(default)]
    pub driving_lane_groups: Vec<JunctionLaneGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Junction {
    pub id: i64,
    pub lane_ids: Vec<i64>,
    pub driving_lane_groups: Vec<JunctionLaneGroup>,
    /// Length-weighted centroid of the owned lanes' centerlines. Overlapping
    /// lanes are not merged, so a stretch shared by several lanes weighs once
    /// per lane. May fall outside the junction hull. `None` without lanes.
    pub center: Option<XyPosition>,
}

impl Junction {
    pub(crate) fn from_record(record: JunctionRecord, center: Option<XyPosition>) -> Self {
        Self {
            id: record.id,
            lane_ids: record.lane_ids,
            driving_lane_groups: record.driving_lane_groups,
            center,
        }
    }

    pub fn public_view(&self) -> Self {
        Self {
            driving_lane_groups: Vec::new(),
            ..self.clone()
        }
    }
}
