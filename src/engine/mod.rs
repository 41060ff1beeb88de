//! The map engine: a loaded, immutable map and its read API.
//!
//! Loading is one-shot. Once built, every query is a pure read, so a
//! `MapEngine` can be shared across threads behind an `Arc` without locking.

mod export;
#[cfg(test)]
pub(crate) mod fixtures;
mod query;
mod route;

pub use export::{wrap_feature_collection, Properties};
pub use query::{LaneMatch, Nearby};

use std::time::Instant;

use tracing::{info, warn};

use crate::cache::SnapshotCache;
use crate::error::Result;
use crate::geometry::{build_map, Projector};
use crate::index::MapIndex;
use crate::loader::{partition_records, RawRecord, RecordSource};
use crate::models::{Aoi, Header, Junction, Lane, MapData, Poi, Road};

pub struct MapEngine {
    data: MapData,
    index: MapIndex,
}

impl MapEngine {
    /// Wrap already built map data, indexing it.
    pub fn from_map_data(data: MapData) -> Self {
        let index = MapIndex::build(&data);
        Self { data, index }
    }

    /// Partition, build and index a flat collection of records.
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let raw = partition_records(records)?;
        let data = build_map(raw)?;
        Ok(Self::from_map_data(data))
    }

    /// Load from `source`, going through the snapshot cache when one is given.
    ///
    /// A cache hit skips fetching and building entirely. A failed cache write
    /// is logged and does not fail the load.
    pub async fn load<S: RecordSource>(source: &S, cache: Option<&SnapshotCache>) -> Result<Self> {
        let source_id = source.source_id();
        let start = Instant::now();

        if let Some(cache) = cache {
            if let Some(data) = cache.read(&source_id)? {
                info!("Map {} served from cache", source_id);
                return Ok(Self::from_map_data(data));
            }
        }

        info!("Fetching map records from {}", source_id);
        let records = source.fetch_records().await?;
        let raw = partition_records(records)?;
        let data = build_map(raw)?;

        if let Some(cache) = cache {
            if let Err(e) = cache.write(&source_id, &data) {
                warn!("Failed to write map cache for {}: {}", source_id, e);
            }
        }

        let engine = Self::from_map_data(data);
        info!("Map {} loaded in {:?}", source_id, start.elapsed());
        Ok(engine)
    }

    pub fn header(&self) -> &Header {
        &self.data.header
    }

    pub fn projector(&self) -> &Projector {
        &self.data.projector
    }

    /// The full built map, as stored in the snapshot cache.
    pub fn data(&self) -> &MapData {
        &self.data
    }

    /// Planar (x, y) in meters for a geographic (lng, lat) in degrees.
    pub fn lnglat_to_xy(&self, lng: f64, lat: f64) -> (f64, f64) {
        self.data.projector.project(lng, lat)
    }

    /// Geographic (lng, lat) in degrees for a planar (x, y) in meters.
    pub fn xy_to_lnglat(&self, x: f64, y: f64) -> (f64, f64) {
        self.data.projector.unproject(x, y)
    }

    /// Copy of an AOI. Without `include_unused`, the AOI type code and the
    /// precomputed lane projections are stripped.
    pub fn get_aoi(&self, id: i64, include_unused: bool) -> Option<Aoi> {
        self.data
            .aois
            .get(&id)
            .map(|aoi| if include_unused { aoi.clone() } else { aoi.public_view() })
    }

    pub fn get_poi(&self, id: i64, include_unused: bool) -> Option<Poi> {
        self.data
            .pois
            .get(&id)
            .map(|poi| if include_unused { poi.clone() } else { poi.public_view() })
    }

    /// Copy of a lane. Without `include_unused`, border lines and overlaps are stripped.
    pub fn get_lane(&self, id: i64, include_unused: bool) -> Option<Lane> {
        self.data
            .lanes
            .get(&id)
            .map(|lane| if include_unused { lane.clone() } else { lane.public_view() })
    }

    pub fn get_road(&self, id: i64, include_unused: bool) -> Option<Road> {
        self.data
            .roads
            .get(&id)
            .map(|road| if include_unused { road.clone() } else { road.public_view() })
    }

    /// Copy of a junction. Without `include_unused`, the driving lane groups are stripped.
    pub fn get_junction(&self, id: i64, include_unused: bool) -> Option<Junction> {
        self.data
            .junctions
            .get(&id)
            .map(|j| if include_unused { j.clone() } else { j.public_view() })
    }

    pub fn lanes(&self) -> impl Iterator<Item = &Lane> {
        self.data.lanes.values()
    }

    pub fn roads(&self) -> impl Iterator<Item = &Road> {
        self.data.roads.values()
    }

    pub fn junctions(&self) -> impl Iterator<Item = &Junction> {
        self.data.junctions.values()
    }

    pub fn aois(&self) -> impl Iterator<Item = &Aoi> {
        self.data.aois.values()
    }

    pub fn pois(&self) -> impl Iterator<Item = &Poi> {
        self.data.pois.values()
    }

    /// Entity counts: lanes, roads, junctions, aois, pois.
    pub fn counts(&self) -> EntityCounts {
        EntityCounts {
            lanes: self.data.lanes.len(),
            roads: self.data.roads.len(),
            junctions: self.data.junctions.len(),
            aois: self.data.aois.len(),
            pois: self.data.pois.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct EntityCounts {
    pub lanes: usize,
    pub roads: usize,
    pub junctions: usize,
    pub aois: usize,
    pub pois: usize,
}
