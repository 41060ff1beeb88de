//! Query server for a loaded city map.
//!
//! Loads the map once (through the snapshot cache when configured) and serves
//! lookups, radius queries, coordinate conversion, GeoJSON export and route
//! geometry over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use clap::Parser;
use geojson::Feature;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use citymap::config::{CacheConfig, Config, ServerConfig, SourceConfig};
use citymap::models::{Aoi, Header, Junction, Lane, Poi, Road, XyPosition};
use citymap::{LaneMatch, MapEngine, Nearby, Properties};

mod api;
use api::{
    map_error, not_found, ApiError, EtaBody, HealthResponse, LngLatBody, LngLatParams,
    LookupParams, NearbyParams, RouteBody, XyBody, XyParams,
};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "City map query server")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Map snapshot or JSON-lines record dump, instead of the configured source
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Snapshot cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Listen address
    #[arg(short, long)]
    listen: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from_file(path)?,
            None => {
                let Some(path) = self.file.clone() else {
                    anyhow::bail!("either --config or --file is required");
                };
                Config {
                    source: SourceConfig::File { path },
                    cache: None,
                    server: ServerConfig::default(),
                }
            }
        };
        if let Some(path) = self.file {
            config.source = SourceConfig::File { path };
        }
        if let Some(dir) = self.cache_dir {
            config.cache = Some(CacheConfig { dir });
        }
        if let Some(listen) = self.listen {
            config.server.listen = listen;
        }
        Ok(config)
    }
}

type AppState = Arc<MapEngine>;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Args::parse().into_config()?;

    info!("Citymap Query Server");
    let engine = config.load_engine().await?;
    let counts = engine.counts();
    info!(
        "Serving map '{}': {} lanes, {} roads, {} junctions, {} aois, {} pois",
        engine.header().name,
        counts.lanes,
        counts.roads,
        counts.junctions,
        counts.aois,
        counts.pois
    );

    let state: AppState = Arc::new(engine);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/header", get(header_handler))
        .route("/v1/aois/{id}", get(aoi_handler))
        .route("/v1/aois/{id}/geojson", get(aoi_geojson_handler))
        .route("/v1/aois/{id}/center/geojson", get(aoi_center_geojson_handler))
        .route("/v1/pois/{id}", get(poi_handler))
        .route("/v1/pois/{id}/geojson", get(poi_geojson_handler))
        .route("/v1/lanes/{id}", get(lane_handler))
        .route("/v1/lanes/{id}/geojson", get(lane_geojson_handler))
        .route("/v1/roads/{id}", get(road_handler))
        .route("/v1/roads/{id}/geojson", get(road_geojson_handler))
        .route("/v1/junctions/{id}", get(junction_handler))
        .route("/v1/nearby/pois", get(nearby_pois_handler))
        .route("/v1/nearby/aois", get(nearby_aois_handler))
        .route("/v1/nearby/lanes", get(nearby_lanes_handler))
        .route("/v1/convert/xy", get(to_xy_handler))
        .route("/v1/convert/lnglat", get(to_lnglat_handler))
        .route("/v1/route/geojson", post(route_geojson_handler))
        .route("/v1/route/eta", post(route_eta_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Starting server on {}", config.server.listen);

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen))?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler(State(engine): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        map: engine.header().name.clone(),
        counts: engine.counts(),
    })
}

async fn header_handler(State(engine): State<AppState>) -> Json<Header> {
    Json(engine.header().clone())
}

async fn aoi_handler(
    State(engine): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<LookupParams>,
) -> Result<Json<Aoi>, ApiError> {
    engine
        .get_aoi(id, params.include_unused)
        .map(Json)
        .ok_or_else(|| not_found("aoi", id))
}

async fn poi_handler(
    State(engine): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<LookupParams>,
) -> Result<Json<Poi>, ApiError> {
    engine
        .get_poi(id, params.include_unused)
        .map(Json)
        .ok_or_else(|| not_found("poi", id))
}

async fn lane_handler(
    State(engine): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<LookupParams>,
) -> Result<Json<Lane>, ApiError> {
    engine
        .get_lane(id, params.include_unused)
        .map(Json)
        .ok_or_else(|| not_found("lane", id))
}

async fn road_handler(
    State(engine): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<LookupParams>,
) -> Result<Json<Road>, ApiError> {
    engine
        .get_road(id, params.include_unused)
        .map(Json)
        .ok_or_else(|| not_found("road", id))
}

async fn junction_handler(
    State(engine): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<LookupParams>,
) -> Result<Json<Junction>, ApiError> {
    engine
        .get_junction(id, params.include_unused)
        .map(Json)
        .ok_or_else(|| not_found("junction", id))
}

async fn aoi_geojson_handler(
    State(engine): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Feature>, ApiError> {
    engine
        .export_aoi_as_geojson(id, Properties::Auto)
        .map(Json)
        .map_err(map_error)
}

async fn aoi_center_geojson_handler(
    State(engine): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Feature>, ApiError> {
    engine
        .export_aoi_center_as_geojson(id, Properties::Auto)
        .map(Json)
        .map_err(map_error)
}

async fn poi_geojson_handler(
    State(engine): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Feature>, ApiError> {
    engine
        .export_poi_as_geojson(id, Properties::Auto)
        .map(Json)
        .map_err(map_error)
}

async fn lane_geojson_handler(
    State(engine): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Feature>, ApiError> {
    engine
        .export_lane_as_geojson(id, Properties::Auto)
        .map(Json)
        .map_err(map_error)
}

async fn road_geojson_handler(
    State(engine): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Feature>, ApiError> {
    engine
        .export_road_as_geojson(id, Properties::Auto)
        .map(Json)
        .map_err(map_error)
}

fn results<T: Serialize>(results: &[T]) -> Result<Json<serde_json::Value>, ApiError> {
    let results = serde_json::to_value(results).map_err(|e| map_error(e.into()))?;
    Ok(Json(serde_json::json!({ "results": results })))
}

/// POIs near a planar point, optionally by category prefix.
async fn nearby_pois_handler(
    State(engine): State<AppState>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let center = XyPosition::new(params.x, params.y);
    let prefix = params.category_prefix.as_deref().unwrap_or("");
    let hits: Vec<Nearby<'_, Poi>> = engine.query_pois(center, params.radius, prefix, params.limit);
    results(&hits)
}

/// AOIs near a planar point, optionally restricted to urban land use classes.
async fn nearby_aois_handler(
    State(engine): State<AppState>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let center = XyPosition::new(params.x, params.y);
    let land_uses = params.urban_land_uses();
    let hits: Vec<Nearby<'_, Aoi>> =
        engine.query_aois(center, params.radius, land_uses.as_deref(), params.limit);
    results(&hits)
}

/// Lanes near a planar point, with the projected position along each lane.
async fn nearby_lanes_handler(
    State(engine): State<AppState>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let center = XyPosition::new(params.x, params.y);
    let hits: Vec<LaneMatch<'_>> = engine
        .query_lanes(center, params.radius, params.lane_type(), params.limit)
        .map_err(map_error)?;
    results(&hits)
}

async fn to_xy_handler(
    State(engine): State<AppState>,
    Query(params): Query<LngLatParams>,
) -> Json<XyBody> {
    let (x, y) = engine.lnglat_to_xy(params.lng, params.lat);
    Json(XyBody { x, y })
}

async fn to_lnglat_handler(
    State(engine): State<AppState>,
    Query(params): Query<XyParams>,
) -> Json<LngLatBody> {
    let (lng, lat) = engine.xy_to_lnglat(params.x, params.y);
    Json(LngLatBody { lng, lat })
}

/// Route geometry as a LineString feature.
async fn route_geojson_handler(
    State(engine): State<AppState>,
    Json(body): Json<RouteBody>,
) -> Result<Json<Feature>, ApiError> {
    engine
        .export_route_as_geojson(
            &body.request,
            &body.response,
            body.properties.unwrap_or_default(),
        )
        .map(Json)
        .map_err(map_error)
}

async fn route_eta_handler(
    State(engine): State<AppState>,
    Json(body): Json<RouteBody>,
) -> Result<Json<EtaBody>, ApiError> {
    engine
        .estimate_route_time(&body.request, &body.response)
        .map(|eta| Json(EtaBody { eta }))
        .map_err(map_error)
}
