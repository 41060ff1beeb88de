//! GeoJSON export of single entities, in geographic coordinates.

use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;

use super::MapEngine;
use crate::error::{MapError, Result};
use crate::models::{Aoi, EntityKind};

/// Feature properties: derived from the entity, or given by the caller.
#[derive(Debug, Clone, Default)]
pub enum Properties {
    #[default]
    Auto,
    Custom(JsonObject),
}

impl Properties {
    fn resolve(self, auto: impl FnOnce() -> JsonObject) -> JsonObject {
        match self {
            Properties::Auto => auto(),
            Properties::Custom(properties) => properties,
        }
    }
}

impl From<JsonObject> for Properties {
    fn from(properties: JsonObject) -> Self {
        Properties::Custom(properties)
    }
}

fn object(value: serde_json::Value) -> JsonObject {
    match value {
        serde_json::Value::Object(map) => map,
        _ => JsonObject::new(),
    }
}

pub(super) fn feature(id: Option<i64>, value: Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: id.map(|id| Id::Number(id.into())),
        properties: Some(properties),
        foreign_members: None,
    }
}

fn aoi_properties(aoi: &Aoi) -> JsonObject {
    object(json!({
        "aoi_type": aoi.land_use.unwrap_or(0).to_string(),
        "poi_ids": aoi.poi_ids.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
    }))
}

impl MapEngine {
    fn aoi_or_err(&self, id: i64) -> Result<&Aoi> {
        self.data
            .aois
            .get(&id)
            .ok_or(MapError::unknown(EntityKind::Aoi, id))
    }

    /// The AOI's polygon (or point). Auto properties: land use and contained POIs.
    pub fn export_aoi_as_geojson(&self, id: i64, properties: Properties) -> Result<Feature> {
        let aoi = self.aoi_or_err(id)?;
        let value = Value::from(&aoi.shape_lnglat.to_geometry());
        Ok(feature(Some(id), value, properties.resolve(|| aoi_properties(aoi))))
    }

    /// A point at the AOI's geographic centroid.
    pub fn export_aoi_center_as_geojson(&self, id: i64, properties: Properties) -> Result<Feature> {
        let aoi = self.aoi_or_err(id)?;
        let center = aoi.shape_lnglat.centroid().ok_or_else(|| {
            MapError::DataConsistency(format!("aoi {} has a degenerate shape", id))
        })?;
        let properties = properties.resolve(|| {
            let mut properties = object(json!({
                "point_type": "aoi",
                "id": id.to_string(),
            }));
            properties.extend(aoi_properties(aoi));
            properties
        });
        Ok(feature(Some(id), Value::from(&center), properties))
    }

    pub fn export_poi_as_geojson(&self, id: i64, properties: Properties) -> Result<Feature> {
        let poi = self
            .data
            .pois
            .get(&id)
            .ok_or(MapError::unknown(EntityKind::Poi, id))?;
        let properties = properties.resolve(|| {
            object(json!({
                "point_type": "poi",
                "id": id.to_string(),
                "poi_type": poi.category,
                "name": poi.name,
                "address": "",
            }))
        });
        Ok(feature(Some(id), Value::from(&poi.shape_lnglat), properties))
    }

    /// Auto properties: type and turn codes, parent id and speed limit.
    pub fn export_lane_as_geojson(&self, id: i64, properties: Properties) -> Result<Feature> {
        let lane = self
            .data
            .lanes
            .get(&id)
            .ok_or(MapError::unknown(EntityKind::Lane, id))?;
        let properties = properties.resolve(|| {
            object(json!({
                "id": id.to_string(),
                "lane_type": lane.lane_type.code().to_string(),
                "lane_turn": lane.turn.code().to_string(),
                "parent_id": lane.parent_id.to_string(),
                "max_speed": lane.max_speed,
            }))
        });
        Ok(feature(Some(id), Value::from(&lane.shape_lnglat), properties))
    }

    /// The road's middle driving lane geometry. Auto properties are empty.
    pub fn export_road_as_geojson(&self, id: i64, properties: Properties) -> Result<Feature> {
        let road = self
            .data
            .roads
            .get(&id)
            .ok_or(MapError::unknown(EntityKind::Road, id))?;
        let geometry = road.geometry()?;
        Ok(feature(
            Some(id),
            Value::from(&geometry.shape_lnglat),
            properties.resolve(JsonObject::new),
        ))
    }
}

/// Collect features into a named collection in CRS84.
pub fn wrap_feature_collection(features: Vec<Feature>, name: &str) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(object(json!({
            "name": name,
            "crs": {
                "type": "name",
                "properties": {"name": "urn:ogc:def:crs:OGC:1.3:CRS84"},
            },
        }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::*;

    #[test]
    fn test_aoi_feature_in_lnglat() {
        let engine = fixture_engine();
        let feature = engine.export_aoi_as_geojson(AOI_A, Properties::Auto).unwrap();
        assert_eq!(feature.id, Some(Id::Number(AOI_A.into())));

        let Some(Geometry { value: Value::Polygon(rings), .. }) = &feature.geometry else {
            panic!("expected a polygon, got {:?}", feature.geometry);
        };
        let (lng, lat) = engine.xy_to_lnglat(0.0, -10.0);
        assert!((rings[0][0][0] - lng).abs() < 1e-12);
        assert!((rings[0][0][1] - lat).abs() < 1e-12);

        let properties = feature.properties.unwrap();
        assert_eq!(properties["aoi_type"], "5");
        assert_eq!(properties["poi_ids"], json!([POI_LIBRARY.to_string()]));
    }

    #[test]
    fn test_aoi_center_feature() {
        let engine = fixture_engine();
        let feature = engine
            .export_aoi_center_as_geojson(AOI_B, Properties::Auto)
            .unwrap();
        let Some(Geometry { value: Value::Point(point), .. }) = &feature.geometry else {
            panic!("expected a point");
        };
        let (x, y) = engine.lnglat_to_xy(point[0], point[1]);
        assert!((x - 25.0).abs() < 1e-3);
        assert!((y + 6.0).abs() < 1e-3);
        let properties = feature.properties.unwrap();
        assert_eq!(properties["point_type"], "aoi");
        assert_eq!(properties["id"], AOI_B.to_string());
    }

    #[test]
    fn test_poi_and_lane_auto_properties() {
        let engine = fixture_engine();
        let poi = engine.export_poi_as_geojson(POI_BANK, Properties::Auto).unwrap();
        let properties = poi.properties.unwrap();
        assert_eq!(properties["point_type"], "poi");
        assert_eq!(properties["poi_type"], "100000");
        assert_eq!(properties["name"], "Bank");
        assert_eq!(properties["address"], "");

        let lane = engine.export_lane_as_geojson(LANE_400, Properties::Auto).unwrap();
        let properties = lane.properties.unwrap();
        assert_eq!(properties["lane_type"], "1");
        assert_eq!(properties["lane_turn"], "2");
        assert_eq!(properties["parent_id"], JUNCTION_20.to_string());
        assert_eq!(properties["max_speed"], 8.0);
    }

    #[test]
    fn test_custom_properties_replace_auto() {
        let engine = fixture_engine();
        let custom = object(json!({"color": "red"}));
        let feature = engine
            .export_lane_as_geojson(LANE_100, Properties::Custom(custom.clone()))
            .unwrap();
        assert_eq!(feature.properties, Some(custom));
    }

    #[test]
    fn test_road_export() {
        let engine = fixture_engine();
        let feature = engine.export_road_as_geojson(ROAD_10, Properties::Auto).unwrap();
        assert_eq!(feature.properties, Some(JsonObject::new()));
        let Some(Geometry { value: Value::LineString(coords), .. }) = &feature.geometry else {
            panic!("expected a line");
        };
        // Middle of [100, 200] is lane 200.
        let (x, _) = engine.lnglat_to_xy(coords[0][0], coords[0][1]);
        assert!((x - 20.0).abs() < 1e-6);

        let err = engine.export_road_as_geojson(ROAD_11, Properties::Auto).unwrap_err();
        assert!(matches!(err, MapError::InvalidRoadGeometry { road_id } if road_id == ROAD_11));
    }

    #[test]
    fn test_absent_id_is_unknown_reference() {
        let engine = fixture_engine();
        let err = engine.export_poi_as_geojson(1, Properties::Auto).unwrap_err();
        assert!(matches!(
            err,
            MapError::UnknownReference { kind: EntityKind::Poi, id: 1 }
        ));
    }

    #[test]
    fn test_wrap_feature_collection() {
        let engine = fixture_engine();
        let features = vec![
            engine.export_poi_as_geojson(POI_BANK, Properties::Auto).unwrap(),
            engine.export_poi_as_geojson(POI_LIBRARY, Properties::Auto).unwrap(),
        ];
        let collection = wrap_feature_collection(features, "pois");
        let value = serde_json::to_value(&collection).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["name"], "pois");
        assert_eq!(
            value["crs"]["properties"]["name"],
            "urn:ogc:def:crs:OGC:1.3:CRS84"
        );
        assert_eq!(value["features"].as_array().unwrap().len(), 2);
    }
}
