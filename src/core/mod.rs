//! Core modules for the audience mapper

pub mod resolver;
pub mod orchestrator;
pub mod geo_data;
pub mod map_presenter;
pub mod api;

pub use resolver::{AudienceBackend, AudienceResolver, CredentialSource, GeminiBackend, GenerationRequest, ResolverConfig, validate_payload};
pub use orchestrator::{AudienceSession, RequestTicket, Settlement};
pub use geo_data::{GeoDataError, GeoDataProvider, GeoFeature, GeoPolygonSet, GeoSource};
pub use map_presenter::{MapError, MapInput, MapPresenter};
pub use api::{create_router, run_server, spawn_geo_load, AppState, ClientSession, SessionUpdate};
