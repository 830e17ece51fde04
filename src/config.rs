//! Runtime configuration, filled from the command line

use crate::core::geo_data::GeoSource;
use crate::core::resolver::{CredentialSource, ResolverConfig};
use crate::{
    DEFAULT_API_KEY_ENV, DEFAULT_BACKEND_URL, DEFAULT_GEO_DATA_URL, DEFAULT_MODEL,
    DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT_SECS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Listen address for serve mode
    pub addr: String,
    /// Gemini REST base URL
    pub backend_url: String,
    pub model: String,
    pub temperature: f64,
    /// Environment variable read for the API key on every call
    pub api_key_env: String,
    pub geo_source: GeoSource,
    /// Outbound HTTP timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:3000".to_string(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            geo_source: GeoSource::Url(DEFAULT_GEO_DATA_URL.to_string()),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            model: self.model.clone(),
            temperature: self.temperature,
            credentials: CredentialSource::Env(self.api_key_env.clone()),
        }
    }
}
