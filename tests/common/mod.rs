//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use audience_mapper::core::{
    AudienceBackend, AudienceResolver, CredentialSource, GenerationRequest, GeoFeature,
    GeoPolygonSet, ResolverConfig,
};
use audience_mapper::types::ResolutionError;

/// Backend that replies with canned text and counts calls
#[derive(Clone)]
pub struct StubBackend {
    pub reply: Result<String, ResolutionError>,
    pub calls: Arc<AtomicUsize>,
}

impl StubBackend {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(err: ResolutionError) -> Self {
        Self {
            reply: Err(err),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AudienceBackend for StubBackend {
    async fn generate(
        &self,
        _request: &GenerationRequest,
        _api_key: &str,
    ) -> Result<String, ResolutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

pub fn resolver(backend: StubBackend) -> AudienceResolver<StubBackend> {
    AudienceResolver::new(
        backend,
        ResolverConfig {
            credentials: CredentialSource::Fixed(Some("test-key".into())),
            ..ResolverConfig::default()
        },
    )
}

/// Model reply for Madison Square Garden
pub const MSG_REPLY: &str = r#"{
    "showLocation": {"latitude": 40.75, "longitude": -73.99},
    "primaryState": {"name": "New York", "abbreviation": "NY"},
    "nearbyStates": [
        {"name": "New Jersey", "abbreviation": "NJ"},
        {"name": "Connecticut", "abbreviation": "CT"},
        {"name": "Pennsylvania", "abbreviation": "PA"}
    ]
}"#;

/// Box polygon from (lat0, lon0) to (lat1, lon1)
pub fn square(name: &str, lat0: f64, lon0: f64, lat1: f64, lon1: f64) -> GeoFeature {
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

/// Rough boxes for a handful of states
pub fn us_states() -> GeoPolygonSet {
    GeoPolygonSet::new(vec![
        square("New York", 40.5, -79.8, 45.0, -71.8),
        square("New Jersey", 38.9, -75.6, 41.4, -73.9),
        square("Connecticut", 40.9, -73.7, 42.1, -71.8),
        square("Pennsylvania", 39.7, -80.5, 42.3, -74.7),
        square("Texas", 25.8, -106.6, 36.5, -93.5),
        square("California", 32.5, -124.4, 42.0, -114.1),
    ])
}
