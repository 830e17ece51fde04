//! Map Presenter: per-polygon style, marker and viewport
//!
//! Style precedence per polygon (names compared case-insensitively):
//! 1. name == primary state → PRIMARY
//! 2. name ∈ nearby states → SUGGESTED
//! 3. otherwise → NEUTRAL
//!
//! Viewport precedence:
//! 1. highlighted polygons exist → their padded bounding box
//! 2. valid marker → center on it at close zoom
//! 3. default continental view
//!
//! The presenter owns its layers and replaces them wholesale on every
//! recomputation.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::core::geo_data::GeoPolygonSet;
use crate::types::{
    AudienceResponse, Bounds, LatLng, MapLayer, MapView, Palette, PathStyle, ShowLocation,
    StateInfo, StyleKind, StyledFeature, Viewport,
};
use crate::{BOUNDS_PADDING, MARKER_ZOOM};

/// Failure while framing the map
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
    #[error("highlighted state {0} has no usable geometry")]
    DegenerateGeometry(String),
    #[error("computed bounds are not finite")]
    NonFiniteBounds,
}

/// What the map shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapInput {
    pub primary_state: Option<StateInfo>,
    pub nearby_states: Vec<StateInfo>,
    pub show_location: Option<ShowLocation>,
}

impl MapInput {
    pub fn from_response(response: Option<&AudienceResponse>) -> Self {
        match response {
            Some(r) => Self {
                primary_state: Some(r.primary_state.clone()),
                nearby_states: r.nearby_states.clone(),
                show_location: Some(r.show_location),
            },
            None => Self::default(),
        }
    }

    /// Marker position, if the location is usable
    pub fn marker(&self) -> Option<LatLng> {
        self.show_location.as_ref().and_then(ShowLocation::position)
    }
}

/// Name sets used for style resolution
struct StyleRules {
    primary: Option<String>,
    nearby: HashSet<String>,
}

impl StyleRules {
    fn new(input: &MapInput) -> Self {
        Self {
            primary: input.primary_state.as_ref().map(StateInfo::match_key),
            nearby: input.nearby_states.iter().map(StateInfo::match_key).collect(),
        }
    }

    fn resolve(&self, name: Option<&str>) -> StyleKind {
        let Some(name) = name.map(str::to_lowercase) else {
            return StyleKind::Neutral;
        };
        if self.primary.as_deref() == Some(name.as_str()) {
            StyleKind::Primary
        } else if self.nearby.contains(&name) {
            StyleKind::Suggested
        } else {
            StyleKind::Neutral
        }
    }
}

/// Owns the map surface state
#[derive(Debug, Default)]
pub struct MapPresenter {
    geo: Option<Arc<GeoPolygonSet>>,
    input: MapInput,
    palette: Palette,
    layers: Vec<MapLayer>,
    viewport: Viewport,
    hovered: Option<String>,
}

impl MapPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dataset arrived (or changed): recompute
    pub fn set_geo_data(&mut self, geo: Arc<GeoPolygonSet>) {
        self.geo = Some(geo);
        self.recompute();
    }

    pub fn has_geo_data(&self) -> bool {
        self.geo.is_some()
    }

    pub fn geo_data(&self) -> Option<&Arc<GeoPolygonSet>> {
        self.geo.as_ref()
    }

    /// New audience inputs: recompute
    pub fn update(&mut self, input: MapInput) {
        self.input = input;
        self.recompute();
    }

    /// Current render
    pub fn view(&self) -> MapView {
        MapView {
            ready: self.geo.is_some(),
            layers: self.layers.clone(),
            viewport: self.viewport,
            palette: self.palette,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Pointer entered a polygon: its temporary style
    ///
    /// Hover never round-trips to the server. The page applies
    /// `palette.hover` on pointer-over and the feature's resolved style on
    /// pointer-out; these two methods are the contract it follows.
    pub fn pointer_enter(&mut self, name: &str) -> Option<PathStyle> {
        self.resolved_style(name)?;
        self.hovered = Some(name.to_lowercase());
        Some(self.palette.style(StyleKind::Hover))
    }

    /// Pointer left a polygon: back to its resolved style
    pub fn pointer_exit(&mut self, name: &str) -> Option<PathStyle> {
        let kind = self.resolved_style(name)?;
        if self.hovered.as_deref() == Some(name.to_lowercase().as_str()) {
            self.hovered = None;
        }
        Some(self.palette.style(kind))
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    /// Resolved style of a polygon by name
    pub fn resolved_style(&self, name: &str) -> Option<StyleKind> {
        self.layers.iter().find_map(|layer| match layer {
            MapLayer::States { features } => features
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case(name))
                .map(|f| f.style),
            _ => None,
        })
    }

    fn recompute(&mut self) {
        // Remove everything before adding anything
        self.layers.clear();
        self.hovered = None;

        let Some(geo) = self.geo.clone() else {
            self.viewport = Viewport::default_view();
            debug!("No geo data yet, empty map surface");
            return;
        };

        let rules = StyleRules::new(&self.input);
        let features: Vec<StyledFeature> = geo
            .features()
            .iter()
            .enumerate()
            .map(|(index, f)| StyledFeature {
                index,
                name: f.name.clone().unwrap_or_default(),
                style: rules.resolve(f.name.as_deref()),
            })
            .collect();

        let marker = self.input.marker();
        let framed = frame(&geo, &features, marker);

        self.layers.push(MapLayer::States { features });
        if let Some(position) = marker {
            self.layers.push(MapLayer::Marker { position });
        }
        // Layers stay; only the framing falls back
        self.viewport = framed.unwrap_or_else(|e| {
            warn!(error = %e, "Map update failed, falling back to default view");
            Viewport::default_view()
        });
        debug!(layers = self.layers.len(), viewport = ?self.viewport, "Map recomputed");
    }
}

/// Pick the viewport for the styled features
fn frame(
    geo: &GeoPolygonSet,
    features: &[StyledFeature],
    marker: Option<LatLng>,
) -> Result<Viewport, MapError> {
    let mut highlighted: Option<Bounds> = None;
    for styled in features
        .iter()
        .filter(|f| matches!(f.style, StyleKind::Primary | StyleKind::Suggested))
    {
        let bounds = geo.features()[styled.index]
            .bounds()
            .ok_or_else(|| MapError::DegenerateGeometry(styled.name.clone()))?;
        match highlighted.as_mut() {
            Some(b) => b.union(&bounds),
            None => highlighted = Some(bounds),
        }
    }

    if let Some(bounds) = highlighted {
        let padded = bounds.pad(BOUNDS_PADDING);
        if !padded.is_finite() {
            return Err(MapError::NonFiniteBounds);
        }
        return Ok(Viewport::FitBounds { bounds: padded });
    }

    Ok(match marker {
        Some(center) => Viewport::Center {
            center,
            zoom: MARKER_ZOOM,
        },
        None => Viewport::default_view(),
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo_data::GeoFeature;

    /// Square polygon from (lat0, lon0) to (lat1, lon1)
    fn square(name: &str, lat0: f64, lon0: f64, lat1: f64, lon1: f64) -> GeoFeature {
        GeoFeature::new(
            name,
            vec![vec![
                vec![lon0, lat0],
                vec![lon1, lat0],
                vec![lon1, lat1],
                vec![lon0, lat1],
                vec![lon0, lat0],
            ]],
        )
    }

    fn dataset() -> Arc<GeoPolygonSet> {
        Arc::new(GeoPolygonSet::new(vec![
            square("texas", 26.0, -106.0, 36.0, -94.0),
            square("Oklahoma", 34.0, -103.0, 37.0, -94.5),
            square("Louisiana", 29.0, -94.0, 33.0, -89.0),
            square("Maine", 43.0, -71.0, 47.5, -67.0),
        ]))
    }

    fn input(primary: &str, nearby: &[&str], loc: Option<ShowLocation>) -> MapInput {
        MapInput {
            primary_state: Some(StateInfo::new(primary, "")),
            nearby_states: nearby.iter().map(|n| StateInfo::new(*n, "")).collect(),
            show_location: loc,
        }
    }

    fn presenter() -> MapPresenter {
        let mut p = MapPresenter::new();
        p.set_geo_data(dataset());
        p
    }

    #[test]
    fn test_no_geo_data_is_empty_surface() {
        let mut p = MapPresenter::new();
        p.update(input("Texas", &[], Some(ShowLocation::new(30.0, -97.0))));
        let view = p.view();
        assert!(!view.ready);
        assert!(view.layers.is_empty());
        assert_eq!(view.viewport, Viewport::default_view());
    }

    #[test]
    fn test_case_insensitive_primary_match() {
        let mut p = presenter();
        p.update(input("Texas", &[], None));
        assert_eq!(p.resolved_style("texas"), Some(StyleKind::Primary));
        assert_eq!(p.resolved_style("Maine"), Some(StyleKind::Neutral));
    }

    #[test]
    fn test_primary_wins_over_suggested() {
        let mut p = presenter();
        p.update(input("Texas", &["TEXAS", "Oklahoma"], None));
        assert_eq!(p.resolved_style("Texas"), Some(StyleKind::Primary));
        assert_eq!(p.resolved_style("Oklahoma"), Some(StyleKind::Suggested));
        assert_eq!(p.resolved_style("Louisiana"), Some(StyleKind::Neutral));
    }

    #[test]
    fn test_fit_bounds_of_highlighted_set_ignores_marker() {
        let mut p = presenter();
        let loc = ShowLocation::new(30.0, -97.0);
        p.update(input("Texas", &["Louisiana"], Some(loc)));
        // Texas ∪ Louisiana = lat 26..36, lon -106..-89; pad 20%
        let expected = Bounds {
            south_west: LatLng(24.0, -109.4),
            north_east: LatLng(38.0, -85.6),
        };
        match p.viewport() {
            Viewport::FitBounds { bounds } => {
                assert!((bounds.south_west.0 - expected.south_west.0).abs() < 1e-9);
                assert!((bounds.south_west.1 - expected.south_west.1).abs() < 1e-9);
                assert!((bounds.north_east.0 - expected.north_east.0).abs() < 1e-9);
                assert!((bounds.north_east.1 - expected.north_east.1).abs() < 1e-9);
            }
            other => panic!("expected FitBounds, got {:?}", other),
        }
        assert_eq!(p.view().marker(), Some(LatLng(30.0, -97.0)));
    }

    #[test]
    fn test_center_on_marker_when_nothing_matches() {
        let mut p = presenter();
        p.update(input("Atlantis", &["Lemuria"], Some(ShowLocation::new(25.0, -71.0))));
        assert_eq!(
            p.viewport(),
            Viewport::Center { center: LatLng(25.0, -71.0), zoom: MARKER_ZOOM }
        );
    }

    #[test]
    fn test_default_view_when_nothing_usable() {
        let mut p = presenter();
        p.update(input("Atlantis", &[], Some(ShowLocation::new(f64::NAN, -71.0))));
        assert_eq!(p.viewport(), Viewport::default_view());
        assert!(p.view().marker().is_none());
    }

    #[test]
    fn test_marker_omitted_for_bad_coordinates() {
        let mut p = presenter();
        for loc in [
            ShowLocation::new(f64::NAN, -97.0),
            ShowLocation::new(f64::INFINITY, -97.0),
            ShowLocation::new(30.0, f64::NEG_INFINITY),
        ] {
            p.update(input("Texas", &[], Some(loc)));
            assert!(p.view().marker().is_none());
        }
        p.update(input("Texas", &[], None));
        assert!(p.view().marker().is_none());
    }

    #[test]
    fn test_layers_replaced_not_accumulated() {
        let mut p = presenter();
        let loc = Some(ShowLocation::new(30.0, -97.0));
        p.update(input("Texas", &[], loc));
        p.update(input("Texas", &[], loc));
        p.update(input("Maine", &[], loc));
        let view = p.view();
        assert_eq!(view.layers.len(), 2);
        assert_eq!(view.features().len(), 4);
        assert_eq!(view.style_of("maine"), Some(StyleKind::Primary));
        assert_eq!(view.style_of("texas"), Some(StyleKind::Neutral));
    }

    #[test]
    fn test_degenerate_geometry_falls_back_to_default() {
        let geo = Arc::new(GeoPolygonSet::new(vec![
            GeoFeature::new("Texas", vec![vec![vec![f64::NAN, f64::NAN]]]),
            square("Maine", 43.0, -71.0, 47.5, -67.0),
        ]));
        let mut p = MapPresenter::new();
        p.set_geo_data(geo);
        p.update(input("Texas", &[], Some(ShowLocation::new(30.0, -97.0))));
        assert_eq!(p.viewport(), Viewport::default_view());
        // States layer and marker both survive the failed framing
        assert_eq!(p.view().layers.len(), 2);
        assert_eq!(p.view().marker(), Some(LatLng(30.0, -97.0)));
    }

    #[test]
    fn test_hover_is_temporary() {
        let mut p = presenter();
        p.update(input("Texas", &["Oklahoma"], None));
        let palette = Palette::default();

        assert_eq!(p.pointer_enter("Oklahoma"), Some(palette.hover));
        assert_eq!(p.hovered(), Some("oklahoma"));
        assert_eq!(p.resolved_style("Oklahoma"), Some(StyleKind::Suggested));
        assert_eq!(p.pointer_exit("Oklahoma"), Some(palette.suggested));
        assert!(p.hovered().is_none());
        assert!(p.pointer_enter("Atlantis").is_none());
    }

    #[test]
    fn test_geo_data_arrival_recomputes() {
        let mut p = MapPresenter::new();
        p.update(input("Texas", &["Oklahoma"], None));
        assert!(p.view().layers.is_empty());
        p.set_geo_data(dataset());
        assert!(matches!(p.viewport(), Viewport::FitBounds { .. }));
    }

    #[test]
    fn test_cleared_input_resets_styles() {
        let mut p = presenter();
        p.update(input("Texas", &["Oklahoma"], None));
        p.update(MapInput::from_response(None));
        assert!(p.view().features().iter().all(|f| f.style == StyleKind::Neutral));
        assert_eq!(p.viewport(), Viewport::default_view());
    }
}
