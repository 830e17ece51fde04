//! Audience Mapper: resolve an event location to a home US state plus nearby
//! marketing targets, and present them on a choropleth map
//!
//! location → AudienceResolver → AudienceSession → MapPresenter → HTTP / terminal

pub mod config;
pub mod core;
pub mod logging;
pub mod types;

// =============================================================================
// AI BACKEND
// =============================================================================

/// Gemini REST base URL
pub const DEFAULT_BACKEND_URL: &str = "https://generativelanguage.googleapis.com";

/// Model used for resolution
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Low sampling temperature: the answer drives a UI decision, not prose
pub const DEFAULT_TEMPERATURE: f64 = 0.2;

/// Environment variable holding the backend credential
pub const DEFAULT_API_KEY_ENV: &str = "API_KEY";

/// Outbound request timeout (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// MAP
// =============================================================================

/// US states polygon dataset
pub const DEFAULT_GEO_DATA_URL: &str =
    "https://raw.githubusercontent.com/PublicaMundi/MappingAPI/master/data/geojson/us-states.json";

/// Geographic center of the contiguous US
pub const DEFAULT_CENTER_LAT: f64 = 39.8283;
pub const DEFAULT_CENTER_LON: f64 = -98.5795;

/// Wide zoom for the default view
pub const DEFAULT_ZOOM: u8 = 4;

/// Close zoom when centering on the event marker
pub const MARKER_ZOOM: u8 = 6;

/// Padding around highlighted states, as a fraction of the box extent
pub const BOUNDS_PADDING: f64 = 0.2;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
