//! Radius queries.
//!
//! The R-trees yield candidates by envelope; every candidate is then checked
//! by exact planar distance to its geometry, so a polygon containing the
//! center is at distance zero.

use std::cmp::Ordering;

use geo::Point;
use serde::Serialize;

use super::MapEngine;
use crate::error::{MapError, Result};
use crate::geometry::linear;
use crate::index::ShapeTree;
use crate::models::{Aoi, Lane, LaneType, Poi, XyPosition};

/// An entity within the query radius.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Nearby<'a, T> {
    pub entity: &'a T,
    /// Planar distance in meters from the query center to the geometry
    pub distance: f64,
}

/// A lane within the query radius.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LaneMatch<'a> {
    pub lane: &'a Lane,
    /// Position of the center's projection along the lane, in `[0, lane.length]`
    pub s: f64,
    pub distance: f64,
}

fn by_distance_then_id(a: (f64, i64), b: (f64, i64)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

fn truncate<T>(mut results: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        results.truncate(limit);
    }
    results
}

impl MapEngine {
    /// POIs within `radius` of `center` whose category starts with
    /// `category_prefix`, closest first. `limit` keeps the closest `limit`.
    pub fn query_pois(
        &self,
        center: XyPosition,
        radius: f64,
        category_prefix: &str,
        limit: Option<usize>,
    ) -> Vec<Nearby<'_, Poi>> {
        let p = Point::new(center.x, center.y);
        let mut results: Vec<Nearby<'_, Poi>> = self
            .index
            .pois
            .candidates(center.x, center.y, radius)
            .filter_map(|id| self.data.pois.get(&id))
            .filter(|poi| poi.matches_category(category_prefix))
            .map(|poi| Nearby {
                entity: poi,
                distance: linear::distance_to_point(p, poi.shape_xy),
            })
            .filter(|hit| hit.distance <= radius)
            .collect();
        results.sort_by(|a, b| {
            by_distance_then_id((a.distance, a.entity.id), (b.distance, b.entity.id))
        });
        truncate(results, limit)
    }

    /// AOIs within `radius` of `center`, closest first.
    ///
    /// With `urban_land_uses`, only AOIs whose urban land use is one of the
    /// given classes are returned; AOIs without a land use never match.
    pub fn query_aois(
        &self,
        center: XyPosition,
        radius: f64,
        urban_land_uses: Option<&[String]>,
        limit: Option<usize>,
    ) -> Vec<Nearby<'_, Aoi>> {
        let p = Point::new(center.x, center.y);
        let mut results: Vec<Nearby<'_, Aoi>> = self
            .index
            .aois
            .candidates(center.x, center.y, radius)
            .filter_map(|id| self.data.aois.get(&id))
            .filter(|aoi| match urban_land_uses {
                None => true,
                Some(allowed) => aoi
                    .urban_land_use
                    .as_ref()
                    .is_some_and(|land_use| allowed.contains(land_use)),
            })
            .map(|aoi| Nearby {
                entity: aoi,
                distance: linear::distance_to_aoi(p, &aoi.shape_xy),
            })
            .filter(|hit| hit.distance <= radius)
            .collect();
        results.sort_by(|a, b| {
            by_distance_then_id((a.distance, a.entity.id), (b.distance, b.entity.id))
        });
        truncate(results, limit)
    }

    /// Lanes of `lane_type` within `radius` of `center`, closest first, with
    /// the position of the center projected onto each lane.
    ///
    /// Only driving and walking lanes are indexed; any other type is rejected.
    pub fn query_lanes(
        &self,
        center: XyPosition,
        radius: f64,
        lane_type: LaneType,
        limit: Option<usize>,
    ) -> Result<Vec<LaneMatch<'_>>> {
        let tree: &ShapeTree = match lane_type {
            LaneType::Driving => &self.index.driving_lanes,
            LaneType::Walking => &self.index.walking_lanes,
            other => return Err(MapError::unsupported("lane type filter", other)),
        };

        let p = Point::new(center.x, center.y);
        let mut results: Vec<LaneMatch<'_>> = tree
            .candidates(center.x, center.y, radius)
            .filter_map(|id| self.data.lanes.get(&id))
            .filter_map(|lane| {
                let distance = linear::distance_to_line(p, &lane.shape_xy);
                if distance > radius {
                    return None;
                }
                let s = linear::locate_point(&lane.shape_xy, p).clamp(0.0, lane.length.max(0.0));
                Some(LaneMatch { lane, s, distance })
            })
            .collect();
        results.sort_by(|a, b| by_distance_then_id((a.distance, a.lane.id), (b.distance, b.lane.id)));
        Ok(truncate(results, limit))
    }
}
