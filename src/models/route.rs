//! Routing service request/response shapes consumed by route reconstruction.

use serde::{Deserialize, Serialize};

use super::{JourneyType, MovingDirection, RouteType};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AoiPositionRef {
    #[serde(alias = "aoiId")]
    pub aoi_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LanePositionRef {
    #[serde(alias = "laneId")]
    pub lane_id: i64,
    #[serde(default)]
    pub s: f64,
}

/// Symbolic start or end of a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// Somewhere inside an AOI; resolved through its access points
    #[serde(alias = "aoiPosition")]
    AoiPosition(AoiPositionRef),
    /// An exact point on a lane
    #[serde(alias = "lanePosition")]
    LanePosition(LanePositionRef),
}

impl Position {
    pub fn aoi(aoi_id: i64) -> Self {
        Position::AoiPosition(AoiPositionRef { aoi_id })
    }

    pub fn lane(lane_id: i64, s: f64) -> Self {
        Position::LanePosition(LanePositionRef { lane_id, s })
    }

    pub fn aoi_id(&self) -> Option<i64> {
        match self {
            Position::AoiPosition(p) => Some(p.aoi_id),
            Position::LanePosition(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    #[serde(rename = "type")]
    pub route_type: RouteType,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DrivingJourney {
    #[serde(default, alias = "roadIds")]
    pub road_ids: Vec<i64>,
    /// Seconds
    #[serde(default)]
    pub eta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalkingRouteSegment {
    #[serde(alias = "laneId")]
    pub lane_id: i64,
    #[serde(default, alias = "movingDirection")]
    pub moving_direction: MovingDirection,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WalkingJourney {
    #[serde(default)]
    pub route: Vec<WalkingRouteSegment>,
    /// Seconds
    #[serde(default)]
    pub eta: f64,
}

/// One leg of a route, travelled in a single mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    #[serde(rename = "type")]
    pub journey_type: JourneyType,
    #[serde(default)]
    pub driving: Option<DrivingJourney>,
    #[serde(default)]
    pub walking: Option<WalkingJourney>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteResponse {
    #[serde(default)]
    pub journeys: Vec<Journey>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_routing_service_json() {
        let req: RouteRequest = serde_json::from_str(
            r#"{
                "type": "ROUTE_TYPE_WALKING",
                "start": {"aoi_position": {"aoi_id": 500000001}},
                "end": {"lane_position": {"lane_id": 12, "s": 4.5}}
            }"#,
        )
        .unwrap();
        assert_eq!(req.route_type, RouteType::Walking);
        assert_eq!(req.start, Position::aoi(500000001));
        assert_eq!(req.end, Position::lane(12, 4.5));

        let res: RouteResponse = serde_json::from_str(
            r#"{"journeys": [{
                "type": 2,
                "walking": {"route": [
                    {"lane_id": 1, "moving_direction": "MOVING_DIRECTION_BACKWARD"},
                    {"lane_id": 2, "moving_direction": 1}
                ], "eta": 30.5}
            }]}"#,
        )
        .unwrap();
        let walking = res.journeys[0].walking.as_ref().unwrap();
        assert_eq!(res.journeys[0].journey_type, JourneyType::Walking);
        assert_eq!(walking.route[0].moving_direction, MovingDirection::Backward);
        assert_eq!(walking.route[1].moving_direction, MovingDirection::Forward);
        assert!(res.journeys[0].driving.is_none());
    }
}
