//! Map presentation types
//!
//! Everything here is rendered by the page with Leaflet; coordinates are
//! `[lat, lon]` on the wire, matching Leaflet's `LatLng` order.

use serde::Serialize;

use crate::{DEFAULT_CENTER_LAT, DEFAULT_CENTER_LON, DEFAULT_ZOOM};

/// Which of the visual styles a polygon gets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleKind {
    /// State the event is in
    Primary,
    /// Nearby target state
    Suggested,
    /// Everything else
    Neutral,
    /// Pointer is over the polygon
    Hover,
}

/// Leaflet path options
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f64>,
}

impl PathStyle {
    const fn full(
        color: &'static str,
        weight: u8,
        fill_color: &'static str,
        fill_opacity: f64,
    ) -> Self {
        Self {
            color: Some(color),
            weight: Some(weight),
            opacity: Some(1.0),
            fill_color: Some(fill_color),
            fill_opacity: Some(fill_opacity),
        }
    }
}

/// The four styles
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Palette {
    pub primary: PathStyle,
    pub suggested: PathStyle,
    pub neutral: PathStyle,
    /// Overlay; unset fields keep the resolved style's values
    pub hover: PathStyle,
}

impl Palette {
    pub fn style(&self, kind: StyleKind) -> PathStyle {
        match kind {
            StyleKind::Primary => self.primary,
            StyleKind::Suggested => self.suggested,
            StyleKind::Neutral => self.neutral,
            StyleKind::Hover => self.hover,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            // slate-600 / slate-800
            neutral: PathStyle::full("#475569", 1, "#1e293b", 0.5),
            // cyan-300 / cyan-500
            suggested: PathStyle::full("#67e8f9", 2, "#0ea5e9", 0.6),
            // fuchsia-300 / fuchsia-500
            primary: PathStyle::full("#f0abfc", 2, "#d946ef", 0.7),
            hover: PathStyle {
                color: Some("#e2e8f0"),
                weight: Some(3),
                opacity: None,
                fill_color: None,
                fill_opacity: Some(0.9),
            },
        }
    }
}

/// A `[lat, lon]` pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng(pub f64, pub f64);

impl LatLng {
    pub fn lat(&self) -> f64 {
        self.0
    }

    pub fn lon(&self) -> f64 {
        self.1
    }
}

/// Axis-aligned geographic box
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl Bounds {
    /// Box around a single point
    pub fn from_point(p: LatLng) -> Self {
        Self {
            south_west: p,
            north_east: p,
        }
    }

    /// Grow to include a point
    pub fn extend(&mut self, p: LatLng) {
        self.south_west = LatLng(self.south_west.0.min(p.0), self.south_west.1.min(p.1));
        self.north_east = LatLng(self.north_east.0.max(p.0), self.north_east.1.max(p.1));
    }

    /// Grow to include another box
    pub fn union(&mut self, other: &Bounds) {
        self.extend(other.south_west);
        self.extend(other.north_east);
    }

    /// Pad each side by `ratio` of the box extent (Leaflet `pad`)
    pub fn pad(&self, ratio: f64) -> Self {
        let lat_buf = (self.north_east.0 - self.south_west.0).abs() * ratio;
        let lon_buf = (self.north_east.1 - self.south_west.1).abs() * ratio;
        Self {
            south_west: LatLng(self.south_west.0 - lat_buf, self.south_west.1 - lon_buf),
            north_east: LatLng(self.north_east.0 + lat_buf, self.north_east.1 + lon_buf),
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.south_west.0, self.south_west.1, self.north_east.0, self.north_east.1]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// How the map frames its content
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Viewport {
    /// Fit to a box
    FitBounds { bounds: Bounds },
    /// Center on a point at a zoom level
    Center { center: LatLng, zoom: u8 },
}

impl Viewport {
    /// Continental US overview
    pub fn default_view() -> Self {
        Viewport::Center {
            center: LatLng(DEFAULT_CENTER_LAT, DEFAULT_CENTER_LON),
            zoom: DEFAULT_ZOOM,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::default_view()
    }
}

/// One polygon of the states layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyledFeature {
    /// Index into the polygon dataset
    pub index: usize,
    /// Feature name (also the tooltip text)
    pub name: String,
    pub style: StyleKind,
}

/// Layers on the map surface
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "layer", rename_all = "camelCase")]
pub enum MapLayer {
    /// Every polygon with its resolved style
    States { features: Vec<StyledFeature> },
    /// Event marker
    Marker { position: LatLng },
}

/// Serializable render of the map
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    /// False until the polygon dataset is loaded
    pub ready: bool,
    pub layers: Vec<MapLayer>,
    pub viewport: Viewport,
    pub palette: Palette,
}

impl MapView {
    pub fn marker(&self) -> Option<LatLng> {
        self.layers.iter().find_map(|l| match l {
            MapLayer::Marker { position } => Some(*position),
            _ => None,
        })
    }

    pub fn features(&self) -> &[StyledFeature] {
        self.layers
            .iter()
            .find_map(|l| match l {
                MapLayer::States { features } => Some(features.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Resolved style of a feature, matched case-insensitively
    pub fn style_of(&self, name: &str) -> Option<StyleKind> {
        self.features()
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.style)
    }
}
