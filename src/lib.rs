//! Citymap - city map data engine
//!
//! Loads a city's road network, buildings and points of interest, builds
//! spatial indexes over them and answers radius, lookup, export and route
//! geometry queries. Shared by the `query` and `ingest` binaries.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod index;
pub mod loader;
pub mod models;
pub mod scylla;

pub use engine::{LaneMatch, MapEngine, Nearby, Properties};
pub use error::{MapError, Result};
