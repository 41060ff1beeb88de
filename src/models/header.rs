use serde::{Deserialize, Serialize};

/// Map metadata. Exactly one per map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub name: String,
    /// Creation date of the map data, as given by the producer
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub north: f64,
    #[serde(default)]
    pub south: f64,
    #[serde(default)]
    pub east: f64,
    #[serde(default)]
    pub west: f64,
    /// PROJ.4 definition of the planar coordinate system
    pub projection: String,
}
