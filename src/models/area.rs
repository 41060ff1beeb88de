//! Areas (AOIs) and points (POIs) of interest.

use geo::{BoundingRect, Centroid, Geometry, Point, Polygon, Rect};
use serde::{Deserialize, Serialize};

use super::{LanePosition, XyPosition};

/// Precomputed AOI-to-lane projections carried by some map producers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AoiExternal {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub driving_distances: Option<Vec<f64>>,
    #[serde(default)]
    pub driving_lane_project_point: Option<Vec<XyPosition>>,
    #[serde(default)]
    pub walking_distances: Option<Vec<f64>>,
    #[serde(default)]
    pub walking_lane_project_point: Option<Vec<XyPosition>>,
}

impl AoiExternal {
    fn without_projections(&self) -> Self {
        Self {
            name: self.name.clone(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AoiRecord {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub aoi_type: i32,
    pub positions: Vec<XyPosition>,
    /// Absent for degenerate (point) AOIs
    #[serde(default)]
    pub area: Option<f64>,
    #[serde(default)]
    pub driving_positions: Vec<LanePosition>,
    #[serde(default)]
    pub walking_positions: Vec<LanePosition>,
    #[serde(default)]
    pub driving_gates: Vec<XyPosition>,
    #[serde(default)]
    pub walking_gates: Vec<XyPosition>,
    #[serde(default)]
    pub urban_land_use: Option<String>,
    #[serde(default)]
    pub land_use: Option<i32>,
    #[serde(default)]
    pub poi_ids: Vec<i64>,
    #[serde(default)]
    pub external: Option<AoiExternal>,
}

/// AOI geometry: a polygon, or a single point when the AOI has no area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AoiShape {
    Polygon(Polygon<f64>),
    Point(Point<f64>),
}

impl AoiShape {
    pub fn centroid(&self) -> Option<Point<f64>> {
        match self {
            AoiShape::Polygon(polygon) => polygon.centroid(),
            AoiShape::Point(point) => Some(*point),
        }
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            AoiShape::Polygon(polygon) => polygon.bounding_rect(),
            AoiShape::Point(point) => Some(point.bounding_rect()),
        }
    }

    pub fn to_geometry(&self) -> Geometry<f64> {
        match self {
            AoiShape::Polygon(polygon) => Geometry::Polygon(polygon.clone()),
            AoiShape::Point(point) => Geometry::Point(*point),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aoi {
    pub id: i64,
    /// Type code; `None` in public views
    #[serde(rename = "type")]
    pub aoi_type: Option<i32>,
    pub positions: Vec<XyPosition>,
    /// Square meters; `None` for point AOIs
    pub area: Option<f64>,
    /// Access points on driving lanes
    pub driving_positions: Vec<LanePosition>,
    /// Access points on walking lanes
    pub walking_positions: Vec<LanePosition>,
    /// Boundary positions matching `driving_positions`
    pub driving_gates: Vec<XyPosition>,
    /// Boundary positions matching `walking_positions`
    pub walking_gates: Vec<XyPosition>,
    /// Urban land use class (GB 50137-2011)
    pub urban_land_use: Option<String>,
    pub land_use: Option<i32>,
    pub poi_ids: Vec<i64>,
    pub external: Option<AoiExternal>,
    pub shape_xy: AoiShape,
    pub shape_lnglat: AoiShape,
}

impl Aoi {
    pub(crate) fn from_record(
        record: AoiRecord,
        shape_xy: AoiShape,
        shape_lnglat: AoiShape,
    ) -> Self {
        Self {
            id: record.id,
            aoi_type: Some(record.aoi_type),
            positions: record.positions,
            area: record.area,
            driving_positions: record.driving_positions,
            walking_positions: record.walking_positions,
            driving_gates: record.driving_gates,
            walking_gates: record.walking_gates,
            urban_land_use: record.urban_land_use,
            land_use: record.land_use,
            poi_ids: record.poi_ids,
            external: record.external,
            shape_xy,
            shape_lnglat,
        }
    }

    /// All access points, walking first.
    pub fn access_points(&self) -> impl Iterator<Item = &LanePosition> {
        self.walking_positions
            .iter()
            .chain(self.driving_positions.iter())
    }

    /// Copy without the AOI type code and the precomputed lane projections.
    pub fn public_view(&self) -> Self {
        Self {
            aoi_type: None,
            external: self.external.as_ref().map(AoiExternal::without_projections),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoiRecord {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// Hierarchical category code, matched by prefix
    #[serde(default)]
    pub category: String,
    pub position: XyPosition,
    #[serde(default)]
    pub aoi_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub position: XyPosition,
    pub aoi_id: i64,
    pub shape_xy: Point<f64>,
    pub shape_lnglat: Point<f64>,
}

impl Poi {
    pub(crate) fn from_record(record: PoiRecord, shape_lnglat: Point<f64>) -> Self {
        Self {
            id: record.id,
            name: record.name,
            category: record.category,
            shape_xy: Point::new(record.position.x, record.position.y),
            position: record.position,
            aoi_id: record.aoi_id,
            shape_lnglat,
        }
    }

    pub fn matches_category(&self, prefix: &str) -> bool {
        self.category.starts_with(prefix)
    }

    pub fn public_view(&self) -> Self {
        self.clone()
    }
}
