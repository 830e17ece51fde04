//! Audience Resolver: location → home state + nearby targets via a hosted model
//!
//! The model is asked for a single JSON object under a strict response
//! schema. `validate_payload` is the safety net behind that schema.

use std::future::Future;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::types::{AudienceResponse, ResolutionError, ShowLocation, StateInfo};
use crate::config::AppConfig;
use crate::{DEFAULT_API_KEY_ENV, DEFAULT_MODEL, DEFAULT_TEMPERATURE};

/// Everything the backend needs for one generation
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub response_schema: Value,
    pub temperature: f64,
}

impl GenerationRequest {
    /// Shape the request for one location
    pub fn for_location(location: &str, model: &str, temperature: f64) -> Self {
        Self {
            model: model.to_string(),
            prompt: build_prompt(location),
            response_schema: response_schema(),
            temperature,
        }
    }

    /// Gemini `generateContent` body
    pub fn to_body(&self) -> Value {
        json!({
            "contents": [
                { "role": "user", "parts": [ { "text": self.prompt } ] }
            ],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": self.response_schema,
                "temperature": self.temperature,
            }
        })
    }
}

/// Natural-language instruction: home state plus nearby marketing targets
pub fn build_prompt(location: &str) -> String {
    format!(
        "Based on the US location \"{}\", identify:\n\
         1. The \"primaryState\": the state where this location physically sits (the home state).\n\
         2. The \"nearbyStates\": a list of adjacent or nearby states suitable for a marketing campaign.\n\
         Also give the latitude and longitude of the location as \"showLocation\".\n\
         Use full state names and two-letter postal abbreviations.\n\
         Respond ONLY with a JSON object.",
        location.trim()
    )
}

fn state_schema(description: Option<&str>) -> Value {
    let mut schema = json!({
        "type": "OBJECT",
        "properties": {
            "name": {
                "type": "STRING",
                "description": "The full name of the US state."
            },
            "abbreviation": {
                "type": "STRING",
                "description": "The two-letter postal abbreviation for the state."
            }
        },
        "required": ["name", "abbreviation"]
    });
    if let Some(desc) = description {
        schema["description"] = Value::String(desc.to_string());
    }
    schema
}

/// JSON schema the backend must answer with
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "showLocation": {
                "type": "OBJECT",
                "description": "An object containing the latitude and longitude of the event location.",
                "properties": {
                    "latitude": { "type": "NUMBER", "description": "The latitude of the location." },
                    "longitude": { "type": "NUMBER", "description": "The longitude of the location." }
                },
                "required": ["latitude", "longitude"]
            },
            "primaryState": state_schema(Some("The state where the event is physically located.")),
            "nearbyStates": {
                "type": "ARRAY",
                "description": "An array of adjacent or nearby states to target.",
                "items": state_schema(None)
            }
        },
        "required": ["showLocation", "primaryState", "nearbyStates"]
    })
}

/// Check a raw payload and turn it into an audience
pub fn validate_payload(raw: &str) -> Result<AudienceResponse, ResolutionError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ResolutionError::MalformedResponse("empty payload".into()));
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|e| ResolutionError::MalformedResponse(format!("not JSON: {}", e)))?;

    let latitude = value
        .pointer("/showLocation/latitude")
        .and_then(Value::as_f64)
        .ok_or_else(|| schema_violation("showLocation.latitude"))?;
    // Longitude is not load-bearing: without it the map just drops the marker
    let longitude = value.pointer("/showLocation/longitude").and_then(Value::as_f64);
    if longitude.is_none() {
        warn!("Reply has no numeric showLocation.longitude");
    }

    let primary_name = value
        .pointer("/primaryState/name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| schema_violation("primaryState.name"))?;
    let primary_abbr = value
        .pointer("/primaryState/abbreviation")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let nearby = value
        .get("nearbyStates")
        .and_then(Value::as_array)
        .ok_or_else(|| schema_violation("nearbyStates"))?;

    let nearby_states = nearby
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            let Some(name) = entry.get("name").and_then(Value::as_str) else {
                warn!(index = i, "Skipping nearby state without a name");
                return None;
            };
            let abbr = entry
                .get("abbreviation")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some(StateInfo::new(name, abbr))
        })
        .collect();

    let response = AudienceResponse {
        primary_state: StateInfo::new(primary_name, primary_abbr),
        nearby_states,
        show_location: ShowLocation {
            latitude,
            longitude,
        },
    };

    for state in response.all_states().filter(|s| !s.has_postal_code()) {
        warn!(state = %state.name, abbreviation = %state.abbreviation, "Unexpected postal code");
    }

    Ok(response)
}

fn schema_violation(field: &str) -> ResolutionError {
    ResolutionError::SchemaViolation(format!("missing or invalid {}", field))
}

// =============================================================================
// CREDENTIALS
// =============================================================================

/// Where the backend key comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Read this environment variable on every call
    Env(String),
    /// Fixed value (or none)
    Fixed(Option<String>),
}

impl Default for CredentialSource {
    fn default() -> Self {
        CredentialSource::Env(DEFAULT_API_KEY_ENV.to_string())
    }
}

impl CredentialSource {
    /// Current key; absence only fails this call
    pub fn api_key(&self) -> Result<String, ResolutionError> {
        let key = match self {
            CredentialSource::Env(var) => std::env::var(var).ok(),
            CredentialSource::Fixed(key) => key.clone(),
        };
        key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            ResolutionError::ConfigMissing(match self {
                CredentialSource::Env(var) => format!("{} environment variable not set", var),
                CredentialSource::Fixed(_) => "no API key configured".to_string(),
            })
        })
    }
}

// =============================================================================
// BACKEND
// =============================================================================

/// Hosted model that turns a request into raw text
pub trait AudienceBackend: Send + Sync {
    /// Run one generation and return the model's text output
    fn generate(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> impl Future<Output = Result<String, ResolutionError>> + Send;
}

/// Gemini `generateContent` over reqwest
#[derive(Clone)]
pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ResolutionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                ResolutionError::BackendUnavailable(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

impl AudienceBackend for GeminiBackend {
    async fn generate(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<String, ResolutionError> {
        let url = self.endpoint(&request.model);
        debug!(%url, temperature = request.temperature, "Calling model");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request.to_body())
            .send()
            .await
            .map_err(|e| ResolutionError::BackendUnavailable(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolutionError::BackendUnavailable(format!(
                "HTTP {} from {}",
                status, request.model
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            ResolutionError::MalformedResponse(format!("Failed to read response: {}", e))
        })?;

        Ok(extract_text(&body))
    }
}

/// Concatenated text parts of the first candidate ("" when there are none)
pub fn extract_text(body: &Value) -> String {
    body.pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Resolver settings
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub model: String,
    pub temperature: f64,
    pub credentials: CredentialSource,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            credentials: CredentialSource::default(),
        }
    }
}

/// Location → audience
pub struct AudienceResolver<B> {
    backend: B,
    config: ResolverConfig,
}

impl AudienceResolver<GeminiBackend> {
    /// Resolver against the configured Gemini endpoint
    pub fn gemini(config: &AppConfig) -> Result<Self, ResolutionError> {
        let backend = GeminiBackend::new(&config.backend_url, config.timeout_secs)?;
        Ok(Self::new(backend, config.resolver_config()))
    }
}

impl<B: AudienceBackend> AudienceResolver<B> {
    pub fn new(backend: B, config: ResolverConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// One request, one validated audience
    pub async fn resolve(&self, location: &str) -> Result<AudienceResponse, ResolutionError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(ResolutionError::InputInvalid("location is blank".into()));
        }

        let outcome = self.resolve_inner(location).await;
        match &outcome {
            Ok(response) => info!(
                %location,
                primary = %response.primary_state.name,
                nearby = response.nearby_states.len(),
                "Resolved audience"
            ),
            Err(e) => error!(%location, error = %e, "Audience resolution failed"),
        }
        outcome
    }

    async fn resolve_inner(&self, location: &str) -> Result<AudienceResponse, ResolutionError> {
        let api_key = self.config.credentials.api_key()?;
        let request =
            GenerationRequest::for_location(location, &self.config.model, self.config.temperature);
        let raw = self.backend.generate(&request, &api_key).await?;
        validate_payload(&raw)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedBackend {
        reply: Result<String, ResolutionError>,
        calls: AtomicUsize,
    }

    impl CannedBackend {
        fn ok(text: &str) -> Self {
            Self { reply: Ok(text.to_string()), calls: AtomicUsize::new(0) }
        }
    }

    impl AudienceBackend for CannedBackend {
        async fn generate(
            &self,
            _request: &GenerationRequest,
            _api_key: &str,
        ) -> Result<String, ResolutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    fn keyed() -> ResolverConfig {
        ResolverConfig {
            credentials: CredentialSource::Fixed(Some("test-key".into())),
            ..ResolverConfig::default()
        }
    }

    const MSG: &str = r#"{
        "showLocation": {"latitude": 40.75, "longitude": -73.99},
        "primaryState": {"name": "New York", "abbreviation": "NY"},
        "nearbyStates": [
            {"name": "New Jersey", "abbreviation": "NJ"},
            {"name": "Connecticut", "abbreviation": "ct"},
            {"name": "Pennsylvania", "abbreviation": "PA"}
        ]
    }"#;

    #[test]
    fn test_validate_good_payload() {
        let response = validate_payload(MSG).unwrap();
        assert_eq!(response.primary_state, StateInfo::new("New York", "NY"));
        assert_eq!(response.nearby_states.len(), 3);
        assert_eq!(response.nearby_states[1].abbreviation, "CT");
        assert_eq!(response.show_location, ShowLocation::new(40.75, -73.99));
    }

    #[test]
    fn test_validate_empty_and_malformed() {
        assert!(matches!(validate_payload("  "), Err(ResolutionError::MalformedResponse(_))));
        assert!(matches!(
            validate_payload("{not json"),
            Err(ResolutionError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_validate_missing_fields() {
        let no_lat = r#"{"showLocation": {"longitude": 1.0}, "primaryState": {"name": "Ohio"}, "nearbyStates": []}"#;
        let string_lat = r#"{"showLocation": {"latitude": "40", "longitude": 1.0}, "primaryState": {"name": "Ohio"}, "nearbyStates": []}"#;
        let blank_name = r#"{"showLocation": {"latitude": 40.0, "longitude": 1.0}, "primaryState": {"name": ""}, "nearbyStates": []}"#;
        let no_nearby = r#"{"showLocation": {"latitude": 40.0, "longitude": 1.0}, "primaryState": {"name": "Ohio"}}"#;
        let nearby_object = r#"{"showLocation": {"latitude": 40.0}, "primaryState": {"name": "Ohio"}, "nearbyStates": {}}"#;
        for payload in [no_lat, string_lat, blank_name, no_nearby, nearby_object] {
            assert!(
                matches!(validate_payload(payload), Err(ResolutionError::SchemaViolation(_))),
                "expected schema violation for {}",
                payload
            );
        }
    }

    #[test]
    fn test_validate_without_longitude() {
        for payload in [
            r#"{"showLocation": {"latitude": 40.75}, "primaryState": {"name": "New York", "abbreviation": "NY"}, "nearbyStates": []}"#,
            r#"{"showLocation": {"latitude": 40.75, "longitude": null}, "primaryState": {"name": "New York", "abbreviation": "NY"}, "nearbyStates": []}"#,
            r#"{"showLocation": {"latitude": 40.75, "longitude": "west"}, "primaryState": {"name": "New York", "abbreviation": "NY"}, "nearbyStates": []}"#,
        ] {
            let response = validate_payload(payload).unwrap();
            assert_eq!(response.show_location, ShowLocation::latitude_only(40.75));
            assert!(!response.show_location.is_valid());
        }
    }

    #[test]
    fn test_validate_skips_nameless_nearby_entries() {
        let payload = r#"{
            "showLocation": {"latitude": 40.0, "longitude": -83.0},
            "primaryState": {"name": "Ohio", "abbreviation": "OH"},
            "nearbyStates": [{"abbreviation": "IN"}, {"name": 7}, "Kentucky", {"name": "Michigan"}]
        }"#;
        let response = validate_payload(payload).unwrap();
        assert_eq!(response.nearby_states, vec![StateInfo::new("Michigan", "")]);
    }

    #[test]
    fn test_validate_empty_nearby_is_fine() {
        let payload = r#"{"showLocation": {"latitude": 21.3, "longitude": -157.8}, "primaryState": {"name": "Hawaii", "abbreviation": "HI"}, "nearbyStates": []}"#;
        let response = validate_payload(payload).unwrap();
        assert!(response.nearby_states.is_empty());
    }

    #[test]
    fn test_schema_requires_everything() {
        let schema = response_schema();
        assert_eq!(
            schema["required"],
            json!(["showLocation", "primaryState", "nearbyStates"])
        );
        assert_eq!(schema["properties"]["showLocation"]["required"], json!(["latitude", "longitude"]));
        assert_eq!(schema["properties"]["primaryState"]["required"], json!(["name", "abbreviation"]));
        assert_eq!(schema["properties"]["nearbyStates"]["type"], "ARRAY");
        assert_eq!(
            schema["properties"]["nearbyStates"]["items"]["required"],
            json!(["name", "abbreviation"])
        );
    }

    #[test]
    fn test_request_body_shape() {
        let request = GenerationRequest::for_location(" Fenway Park ", "m", 0.2);
        assert!(request.prompt.contains("\"Fenway Park\""));
        assert!(request.prompt.contains("primaryState"));
        assert!(request.prompt.contains("nearbyStates"));
        let body = request.to_body();
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["temperature"], 0.2);
        assert_eq!(body["contents"][0]["parts"][0]["text"], json!(request.prompt));
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = json!({"candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}]});
        assert_eq!(extract_text(&body), "{\"a\":1}");
        assert_eq!(extract_text(&json!({"candidates": []})), "");
    }

    #[test]
    fn test_credentials() {
        assert!(CredentialSource::Fixed(Some("k".into())).api_key().is_ok());
        assert!(matches!(
            CredentialSource::Fixed(None).api_key(),
            Err(ResolutionError::ConfigMissing(_))
        ));
        assert!(matches!(
            CredentialSource::Fixed(Some("  ".into())).api_key(),
            Err(ResolutionError::ConfigMissing(_))
        ));
        assert!(matches!(
            CredentialSource::Env("AUDIENCE_MAPPER_TEST_UNSET_KEY".into()).api_key(),
            Err(ResolutionError::ConfigMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_happy_path() {
        let resolver = AudienceResolver::new(CannedBackend::ok(MSG), keyed());
        let response = resolver.resolve("Madison Square Garden, NYC").await.unwrap();
        assert_eq!(response.primary_state.name, "New York");
    }

    #[tokio::test]
    async fn test_blank_location_never_calls_backend() {
        let resolver = AudienceResolver::new(CannedBackend::ok(MSG), keyed());
        let err = resolver.resolve("   ").await.unwrap_err();
        assert!(err.is_input_error());
        assert_eq!(resolver.backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_key_never_calls_backend() {
        let config = ResolverConfig {
            credentials: CredentialSource::Fixed(None),
            ..ResolverConfig::default()
        };
        let resolver = AudienceResolver::new(CannedBackend::ok(MSG), config);
        let err = resolver.resolve("Austin").await.unwrap_err();
        assert!(matches!(err, ResolutionError::ConfigMissing(_)));
        assert_eq!(resolver.backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_passes_through() {
        let backend = CannedBackend {
            reply: Err(ResolutionError::BackendUnavailable("HTTP 429".into())),
            calls: AtomicUsize::new(0),
        };
        let resolver = AudienceResolver::new(backend, keyed());
        let err = resolver.resolve("Austin").await.unwrap_err();
        assert!(matches!(err, ResolutionError::BackendUnavailable(_)));
    }
}
