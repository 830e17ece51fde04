//! Audience values produced by the resolver

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::LatLng;

lazy_static! {
    /// Two-letter USPS postal code (already upper-cased)
    static ref RE_POSTAL_CODE: Regex = Regex::new(r"^[A-Z]{2}$").unwrap();
}

/// One US state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateInfo {
    /// Full state name, e.g. "New York"
    pub name: String,
    /// Two-letter postal code, e.g. "NY"
    #[serde(default)]
    pub abbreviation: String,
}

impl StateInfo {
    /// Create a state with a trimmed name and upper-cased abbreviation
    pub fn new(name: impl Into<String>, abbreviation: impl Into<String>) -> Self {
        let name: String = name.into();
        let abbreviation: String = abbreviation.into();
        Self {
            name: name.trim().to_string(),
            abbreviation: abbreviation.trim().to_uppercase(),
        }
    }

    /// Is the abbreviation a well-formed postal code?
    pub fn has_postal_code(&self) -> bool {
        RE_POSTAL_CODE.is_match(&self.abbreviation)
    }

    /// Lower-cased name used for polygon matching
    pub fn match_key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Geographic point of the event
///
/// Only the latitude is guaranteed; a reply without a usable longitude
/// still resolves, it just has no marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShowLocation {
    pub latitude: f64,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl ShowLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude: Some(longitude),
        }
    }

    pub fn latitude_only(latitude: f64) -> Self {
        Self {
            latitude,
            longitude: None,
        }
    }

    /// Map position when both coordinates are finite and inside the WGS84 range
    pub fn position(&self) -> Option<LatLng> {
        let lon = self.longitude?;
        let usable = self.latitude.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&lon);
        usable.then_some(LatLng(self.latitude, lon))
    }

    pub fn is_valid(&self) -> bool {
        self.position().is_some()
    }
}

/// The unit exchanged between the resolver and the rest of the system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceResponse {
    /// State the event physically sits in
    pub primary_state: StateInfo,
    /// Nearby states worth targeting, in backend order (duplicates allowed)
    pub nearby_states: Vec<StateInfo>,
    /// Event coordinates
    pub show_location: ShowLocation,
}

impl AudienceResponse {
    /// Normalize names and postal codes of every state
    pub fn normalized(self) -> Self {
        let norm = |s: StateInfo| StateInfo::new(s.name, s.abbreviation);
        Self {
            primary_state: norm(self.primary_state),
            nearby_states: self.nearby_states.into_iter().map(norm).collect(),
            show_location: self.show_location,
        }
    }

    /// All states, primary first
    pub fn all_states(&self) -> impl Iterator<Item = &StateInfo> {
        std::iter::once(&self.primary_state).chain(self.nearby_states.iter())
    }
}
