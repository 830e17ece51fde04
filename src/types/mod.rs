//! Core types for the audience mapper

mod audience;
mod error;
mod map;
mod session;

pub use audience::{AudienceResponse, ShowLocation, StateInfo};
pub use error::{ErrorKind, ResolutionError, GENERIC_FAILURE_MESSAGE, INPUT_INVALID_MESSAGE};
pub use map::{Bounds, LatLng, MapLayer, MapView, Palette, PathStyle, StyleKind, StyledFeature, Viewport};
pub use session::{SessionError, SessionPhase, SessionState};
