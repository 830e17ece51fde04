//! Session phase and the serializable session state

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{AudienceResponse, ErrorKind};

/// Lifecycle of one location lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    /// Nothing submitted yet
    Idle,
    /// One resolution in flight
    Loading,
    /// Last resolution produced an audience
    Success,
    /// Last submission failed (input or backend)
    Failure,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionPhase::Idle => "IDLE",
            SessionPhase::Loading => "LOADING",
            SessionPhase::Success => "SUCCESS",
            SessionPhase::Failure => "FAILURE",
        };
        write!(f, "{}", name)
    }
}

/// Error as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Snapshot of the audience session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Last submitted location
    pub location_query: String,
    pub phase: SessionPhase,
    pub is_loading: bool,
    /// Latest successful resolution; cleared by a new lookup or a backend
    /// failure, kept across a blank-input error
    pub result: Option<AudienceResponse>,
    /// Set by the last failed submission, cleared when a lookup starts
    pub error: Option<SessionError>,
    /// Id of the latest issued request (0 = none yet)
    pub request_id: u64,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display_and_serde() {
        assert_eq!(SessionPhase::Loading.to_string(), "LOADING");
        let json = serde_json::to_string(&SessionPhase::Failure).unwrap();
        assert_eq!(json, "\"FAILURE\"");
    }
}
