//! Audience session: request lifecycle state machine
//!
//! State transitions:
//! - IDLE/SUCCESS/FAILURE → LOADING: non-blank query submitted
//! - any → FAILURE: blank query (no request issued)
//! - LOADING → SUCCESS: latest request resolved
//! - LOADING → FAILURE: latest request failed
//!
//! Every accepted submission gets a new request id. Only the latest id may
//! settle; anything older is discarded as superseded.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::core::resolver::{AudienceBackend, AudienceResolver};
use crate::types::{
    AudienceResponse, ResolutionError, SessionError, SessionPhase, SessionState,
};

/// Proof of an accepted submission, handed back on settlement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    pub id: u64,
    pub query: String,
}

/// What `settle` did with an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Outcome stored
    Applied,
    /// A newer request was issued; outcome dropped
    Superseded,
}

/// Session state holder
#[derive(Debug)]
pub struct AudienceSession {
    /// Last submitted query (blank ones included)
    location_query: String,
    /// Current phase
    phase: SessionPhase,
    /// Latest successful resolution
    result: Option<AudienceResponse>,
    /// Latest failure
    error: Option<ResolutionError>,
    /// Highest request id issued so far
    latest_request: u64,
    /// When the state last changed
    updated_at: DateTime<Utc>,
}

impl Default for AudienceSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AudienceSession {
    pub fn new() -> Self {
        Self {
            location_query: String::new(),
            phase: SessionPhase::Idle,
            result: None,
            error: None,
            latest_request: 0,
            updated_at: Utc::now(),
        }
    }

    /// Start a resolution for `query`.
    ///
    /// A blank query records an input error and supersedes any pending
    /// request without issuing a new one. Previous results survive an input
    /// error.
    pub fn begin(&mut self, query: &str) -> Result<RequestTicket, ResolutionError> {
        self.location_query = query.to_string();
        self.updated_at = Utc::now();

        if query.trim().is_empty() {
            let err = ResolutionError::InputInvalid("location is blank".into());
            if self.phase == SessionPhase::Loading {
                // Pending request can no longer settle
                self.latest_request += 1;
            }
            self.phase = SessionPhase::Failure;
            self.error = Some(err.clone());
            debug!("Rejected blank location");
            return Err(err);
        }

        self.latest_request += 1;
        self.phase = SessionPhase::Loading;
        self.result = None;
        self.error = None;

        debug!(request = self.latest_request, query = %query.trim(), "Resolution started");
        Ok(RequestTicket {
            id: self.latest_request,
            query: query.trim().to_string(),
        })
    }

    /// Apply an outcome if its ticket is still current
    pub fn settle(
        &mut self,
        ticket: &RequestTicket,
        outcome: Result<AudienceResponse, ResolutionError>,
    ) -> Settlement {
        if ticket.id != self.latest_request || self.phase != SessionPhase::Loading {
            warn!(
                request = ticket.id,
                latest = self.latest_request,
                "Discarding superseded resolution"
            );
            return Settlement::Superseded;
        }

        self.updated_at = Utc::now();
        match outcome {
            Ok(response) => {
                info!(request = ticket.id, primary = %response.primary_state.name, "Session updated");
                self.result = Some(response);
                self.error = None;
                self.phase = SessionPhase::Success;
            }
            Err(err) => {
                info!(request = ticket.id, kind = ?err.kind(), "Session failed");
                self.result = None;
                self.error = Some(err);
                self.phase = SessionPhase::Failure;
            }
        }
        Settlement::Applied
    }

    /// begin → resolve → settle in one go
    pub async fn submit<B: AudienceBackend>(
        &mut self,
        resolver: &AudienceResolver<B>,
        query: &str,
    ) -> Result<&AudienceResponse, ResolutionError> {
        let ticket = self.begin(query)?;
        let outcome = resolver.resolve(&ticket.query).await;
        self.settle(&ticket, outcome);
        match (&self.result, &self.error) {
            (Some(result), _) => Ok(result),
            (None, Some(err)) => Err(err.clone()),
            (None, None) => Err(ResolutionError::MalformedResponse("no outcome".into())),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == SessionPhase::Loading
    }

    pub fn result(&self) -> Option<&AudienceResponse> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&ResolutionError> {
        self.error.as_ref()
    }

    /// User-facing error text
    pub fn error_message(&self) -> Option<&'static str> {
        self.error.as_ref().map(ResolutionError::user_message)
    }

    pub fn latest_request(&self) -> u64 {
        self.latest_request
    }

    /// Serializable view of the session
    pub fn snapshot(&self) -> SessionState {
        SessionState {
            location_query: self.location_query.clone(),
            phase: self.phase,
            is_loading: self.is_loading(),
            result: self.result.clone(),
            error: self.error.as_ref().map(|e| SessionError {
                kind: e.kind(),
                message: e.user_message().to_string(),
            }),
            request_id: self.latest_request,
            updated_at: self.updated_at,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
