//! Spatial indexes for radius lookups.
//!
//! Four independent R-trees over planar geometry: AOIs, POIs, driving lanes
//! and walking lanes. Trees are bulk-loaded once and never modified; a data
//! update means building a new engine.

use geo::{BoundingRect, Rect};
use rstar::{RTree, RTreeObject, AABB};
use tracing::info;

use crate::models::{LaneType, MapData};

/// Entity id with the envelope of its planar geometry.
#[derive(Debug, Clone, Copy)]
pub struct IndexedShape {
    pub id: i64,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedShape {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedShape {
    pub fn new(id: i64, rect: Rect<f64>) -> Self {
        Self {
            id,
            envelope: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
        }
    }
}

/// R-tree over one kind of entity.
pub struct ShapeTree {
    tree: RTree<IndexedShape>,
}

impl ShapeTree {
    pub fn build(shapes: Vec<IndexedShape>) -> Self {
        Self {
            tree: RTree::bulk_load(shapes),
        }
    }

    /// Ids whose envelope intersects the square around the query circle.
    ///
    /// This is a candidate set: callers must filter by exact distance.
    pub fn candidates(&self, x: f64, y: f64, radius: f64) -> impl Iterator<Item = i64> + '_ {
        let query_envelope = AABB::from_corners([x - radius, y - radius], [x + radius, y + radius]);
        self.tree
            .locate_in_envelope_intersecting(&query_envelope)
            .map(|shape| shape.id)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// The four trees a map is queried through.
pub struct MapIndex {
    pub aois: ShapeTree,
    pub pois: ShapeTree,
    pub driving_lanes: ShapeTree,
    pub walking_lanes: ShapeTree,
}

impl MapIndex {
    pub fn build(data: &MapData) -> Self {
        info!("Building spatial indexes...");

        let aois = data
            .aois
            .values()
            .filter_map(|aoi| aoi.shape_xy.bounding_rect().map(|r| IndexedShape::new(aoi.id, r)))
            .collect();
        let pois = data
            .pois
            .values()
            .map(|poi| IndexedShape::new(poi.id, poi.shape_xy.bounding_rect()))
            .collect();

        let lanes_of = |lane_type: LaneType| -> Vec<IndexedShape> {
            data.lanes
                .values()
                .filter(|lane| lane.lane_type == lane_type)
                .filter_map(|lane| {
                    lane.shape_xy
                        .bounding_rect()
                        .map(|r| IndexedShape::new(lane.id, r))
                })
                .collect()
        };

        let index = Self {
            aois: ShapeTree::build(aois),
            pois: ShapeTree::build(pois),
            driving_lanes: ShapeTree::build(lanes_of(LaneType::Driving)),
            walking_lanes: ShapeTree::build(lanes_of(LaneType::Walking)),
        };

        info!(
            "Spatial indexes built: {} aois, {} pois, {} driving lanes, {} walking lanes",
            index.aois.len(),
            index.pois.len(),
            index.driving_lanes.len(),
            index.walking_lanes.len()
        );
        index
    }
}
