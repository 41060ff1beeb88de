//! Map data model: raw records as loaded, and built immutable entities.

pub mod area;
pub mod common;
pub mod header;
pub mod lane;
pub mod road;
pub mod route;

pub use area::{Aoi, AoiExternal, AoiRecord, AoiShape, Poi, PoiRecord};
pub use common::{
    EntityKind, JourneyType, LaneConnectionType, LanePosition, LaneTurn, LaneType,
    MovingDirection, ProtoEnumValue, RouteType, XyPosition,
};
pub use header::Header;
pub use lane::{Lane, LaneConnection, LaneOverlap, LaneRecord, Polyline};
pub use road::{Junction, JunctionLaneGroup, JunctionRecord, Road, RoadGeometry, RoadRecord};
pub use route::{
    DrivingJourney, Journey, Position, RouteRequest, RouteResponse, WalkingJourney,
    WalkingRouteSegment,
};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::geometry::Projector;

/// Fully built map: every entity with its derived geometry, plus the projector.
///
/// This is what the snapshot cache stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapData {
    pub header: Header,
    pub projector: Projector,
    pub lanes: HashMap<i64, Lane>,
    pub roads: HashMap<i64, Road>,
    pub junctions: HashMap<i64, Junction>,
    pub aois: HashMap<i64, Aoi>,
    pub pois: HashMap<i64, Poi>,
}
