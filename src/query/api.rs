//! Request parameters, response bodies and error mapping for the HTTP API.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use citymap::models::{LaneType, RouteRequest, RouteResponse};
use citymap::MapError;

pub type ApiError = (StatusCode, String);

/// Status code for a failed engine operation.
pub fn map_error(e: MapError) -> ApiError {
    let status = match &e {
        MapError::UnknownReference { .. } => StatusCode::NOT_FOUND,
        MapError::UnsupportedKind { .. } => StatusCode::BAD_REQUEST,
        MapError::DataConsistency(_) | MapError::InvalidRoadGeometry { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => {
            tracing::error!("Query failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

pub fn not_found(kind: &str, id: i64) -> ApiError {
    (StatusCode::NOT_FOUND, format!("{} {} not found", kind, id))
}

#[derive(Deserialize)]
pub struct LookupParams {
    /// Keep internal bookkeeping fields
    #[serde(default)]
    pub include_unused: bool,
}

#[derive(Deserialize)]
pub struct NearbyParams {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub limit: Option<usize>,
    /// POI category prefix
    pub category_prefix: Option<String>,
    /// Comma-separated urban land use classes (AOIs)
    pub urban_land_uses: Option<String>,
    /// `driving` / `walking` or a numeric lane type code
    pub lane_type: Option<String>,
}

impl NearbyParams {
    pub fn urban_land_uses(&self) -> Option<Vec<String>> {
        self.urban_land_uses.as_ref().map(|l| {
            l.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }

    /// Driving lanes unless asked otherwise. Unknown names map to
    /// `Unspecified`, which the engine rejects.
    pub fn lane_type(&self) -> LaneType {
        match self.lane_type.as_deref() {
            None => LaneType::Driving,
            Some(raw) => match raw.trim().parse::<i32>() {
                Ok(code) => LaneType::from_code(code),
                Err(_) => LaneType::from_name(raw.trim()),
            },
        }
    }
}

#[derive(Deserialize)]
pub struct LngLatParams {
    pub lng: f64,
    pub lat: f64,
}

#[derive(Deserialize)]
pub struct XyParams {
    pub x: f64,
    pub y: f64,
}

#[derive(Serialize)]
pub struct XyBody {
    pub x: f64,
    pub y: f64,
}

#[derive(Serialize)]
pub struct LngLatBody {
    pub lng: f64,
    pub lat: f64,
}

/// A routing service request together with its result.
#[derive(Deserialize)]
pub struct RouteBody {
    pub request: RouteRequest,
    pub response: RouteResponse,
    #[serde(default)]
    pub properties: Option<geojson::JsonObject>,
}

#[derive(Serialize)]
pub struct EtaBody {
    /// Seconds
    pub eta: f64,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub map: String,
    pub counts: citymap::engine::EntityCounts,
}
