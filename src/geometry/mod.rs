//! Geometry: coordinate projection, linear referencing and the builder that
//! turns raw records into entities with derived shapes.

mod builder;
pub mod linear;
mod projection;

pub use builder::{
    build_aoi, build_junction, build_lane, build_map, build_poi, build_road,
    check_lane_connections, derive_road_geometry, middle_driving_lane_index,
    ConnectionAnomalies,
};
pub use projection::Projector;
