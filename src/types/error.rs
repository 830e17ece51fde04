//! Resolution error taxonomy

use serde::Serialize;
use thiserror::Error;

/// Shown for every failure that is not an input error
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Could not fetch audience data. The location might be invalid or there was a network error.";

/// Shown when the submitted location is blank
pub const INPUT_INVALID_MESSAGE: &str = "Please enter a location.";

/// Why a resolution did not produce an audience
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Blank location, no backend call made
    #[error("invalid input: {0}")]
    InputInvalid(String),
    /// No credential configured for the backend
    #[error("configuration missing: {0}")]
    ConfigMissing(String),
    /// Network, HTTP status, auth or quota failure
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    /// Empty payload or payload that is not JSON
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// JSON that lacks a required field
    #[error("schema violation: {0}")]
    SchemaViolation(String),
}

/// Stable tag for each error variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InputInvalid,
    ConfigMissing,
    BackendUnavailable,
    MalformedResponse,
    SchemaViolation,
}

impl ResolutionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputInvalid(_) => ErrorKind::InputInvalid,
            Self::ConfigMissing(_) => ErrorKind::ConfigMissing,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::SchemaViolation(_) => ErrorKind::SchemaViolation,
        }
    }

    /// User-facing text; the underlying cause is never shown
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InputInvalid(_) => INPUT_INVALID_MESSAGE,
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }

    /// Was this caused by the user rather than the backend?
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InputInvalid(_))
    }
}
