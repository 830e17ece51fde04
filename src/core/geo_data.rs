//! Geo Data Provider: US state polygons from a GeoJSON FeatureCollection

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::types::{Bounds, LatLng};

/// Why the polygon dataset could not be loaded
#[derive(Debug, Error)]
pub enum GeoDataError {
    #[error("failed to fetch geo data: {0}")]
    Fetch(String),
    #[error("failed to read geo data file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid GeoJSON: {0}")]
    Parse(String),
}

/// Where the dataset lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeoSource {
    Url(String),
    File(PathBuf),
}

impl GeoSource {
    /// `http(s)://…` is a URL, anything else a path
    pub fn parse(spec: &str) -> Self {
        if spec.starts_with("http://") || spec.starts_with("https://") {
            GeoSource::Url(spec.to_string())
        } else {
            GeoSource::File(PathBuf::from(spec))
        }
    }
}

impl std::fmt::Display for GeoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeoSource::Url(url) => write!(f, "{}", url),
            GeoSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

// Raw GeoJSON, only the parts we use

#[derive(Deserialize)]
struct RawCollection {
    features: Vec<RawFeature>,
}

#[derive(Deserialize)]
struct RawFeature {
    #[serde(default)]
    properties: Option<Value>,
    #[serde(default)]
    geometry: Option<RawGeometry>,
}

#[derive(Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

/// `[lon, lat, ...]` positions of one ring
type Ring = Vec<Vec<f64>>;

/// One named polygon (or multipolygon) of the dataset
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFeature {
    /// `properties.name`, if any
    pub name: Option<String>,
    /// All rings of all polygons, GeoJSON `[lon, lat]` order
    pub rings: Vec<Ring>,
}

impl GeoFeature {
    pub fn new(name: &str, rings: Vec<Ring>) -> Self {
        Self {
            name: Some(name.to_string()),
            rings,
        }
    }

    /// Bounding box of every finite position, `None` when there are none
    pub fn bounds(&self) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        for position in self.rings.iter().flatten() {
            let (lon, lat) = match position.as_slice() {
                [lon, lat, ..] if lon.is_finite() && lat.is_finite() => (*lon, *lat),
                _ => continue,
            };
            let p = LatLng(lat, lon);
            match bounds.as_mut() {
                Some(b) => b.extend(p),
                None => bounds = Some(Bounds::from_point(p)),
            }
        }
        bounds
    }
}

/// The polygon dataset, read-only once built
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoPolygonSet {
    features: Vec<GeoFeature>,
    /// Original document, served back to the page
    source_document: Value,
}

impl GeoPolygonSet {
    pub fn new(features: Vec<GeoFeature>) -> Self {
        let source_document = to_geojson(&features);
        Self {
            features,
            source_document,
        }
    }

    /// Parse a GeoJSON FeatureCollection
    pub fn from_geojson(text: &str) -> Result<Self, GeoDataError> {
        let document: Value =
            serde_json::from_str(text).map_err(|e| GeoDataError::Parse(e.to_string()))?;
        let raw: RawCollection = serde_json::from_value(document.clone())
            .map_err(|e| GeoDataError::Parse(e.to_string()))?;

        let features = raw
            .features
            .into_iter()
            .map(|f| {
                let name = f
                    .properties
                    .as_ref()
                    .and_then(|p| p.get("name"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let rings = f.geometry.map(geometry_rings).unwrap_or_default();
                GeoFeature { name, rings }
            })
            .collect();

        Ok(Self {
            features,
            source_document: document,
        })
    }

    pub fn features(&self) -> &[GeoFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Document as GeoJSON
    pub fn to_geojson(&self) -> &Value {
        &self.source_document
    }
}

/// Rings of a Polygon or MultiPolygon; other geometry types have none
fn geometry_rings(geometry: RawGeometry) -> Vec<Ring> {
    match geometry.kind.as_str() {
        "Polygon" => serde_json::from_value::<Vec<Ring>>(geometry.coordinates).unwrap_or_default(),
        "MultiPolygon" => serde_json::from_value::<Vec<Vec<Ring>>>(geometry.coordinates)
            .map(|polys| polys.into_iter().flatten().collect())
            .unwrap_or_default(),
        other => {
            warn!(geometry = other, "Ignoring unsupported geometry");
            Vec::new()
        }
    }
}

fn to_geojson(features: &[GeoFeature]) -> Value {
    let features: Vec<Value> = features
        .iter()
        .map(|f| {
            serde_json::json!({
                "type": "Feature",
                "properties": { "name": f.name },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": f.rings.iter().map(|r| vec![r]).collect::<Vec<_>>(),
                },
            })
        })
        .collect();
    serde_json::json!({ "type": "FeatureCollection", "features": features })
}

/// Loads the dataset once; no retry
pub struct GeoDataProvider {
    client: reqwest::Client,
}

impl GeoDataProvider {
    pub fn new(timeout_secs: u64) -> Result<Self, GeoDataError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GeoDataError::Fetch(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub async fn load(&self, source: &GeoSource) -> Result<GeoPolygonSet, GeoDataError> {
        let text = match source {
            GeoSource::Url(url) => self.fetch(url).await?,
            GeoSource::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|source| GeoDataError::Read {
                    path: path.clone(),
                    source,
                })?,
        };
        let set = GeoPolygonSet::from_geojson(&text)?;
        info!(%source, features = set.len(), "Geo data loaded");
        Ok(set)
    }

    async fn fetch(&self, url: &str) -> Result<String, GeoDataError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GeoDataError::Fetch(format!("Request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(GeoDataError::Fetch(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }
        response
            .text()
            .await
            .map_err(|e| GeoDataError::Fetch(format!("Failed to read response: {}", e)))
    }
}
