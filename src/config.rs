//! Process configuration: the script-writing model and the HTTP listener.

use std::time::Duration;

use derive_builder::Builder;

use crate::llm::DecodingParams;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-05-20";
pub const DEFAULT_PORT: u16 = 57103;

/// Settings for the OpenAI-compatible chat endpoint used to write scripts.
///
/// ```
/// use podcast_tts::config::ModelConfigBuilder;
///
/// let config = ModelConfigBuilder::default()
///     .api_key("secret")
///     .model("gemini-2.0-flash")
///     .build()
///     .unwrap();
/// assert_eq!(config.decoding.temperature, 0.0);
/// assert!(config.timeout.is_none());
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct ModelConfig {
    /// Bearer token for the provider.
    pub api_key: String,
    #[builder(default = "DEFAULT_BASE_URL.to_string()")]
    pub base_url: String,
    #[builder(default = "DEFAULT_MODEL.to_string()")]
    pub model: String,
    #[builder(default)]
    pub decoding: DecodingParams,
    /// Whole-request timeout. `None` waits as long as the provider takes.
    #[builder(default, setter(into, strip_option))]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_gemini_with_deterministic_decoding() {
        let config = ModelConfigBuilder::default().api_key("k").build().unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.decoding, DecodingParams::default());
        assert_eq!(config.decoding.max_tokens, 8000);
    }

    #[test]
    fn api_key_is_required() {
        assert!(ModelConfigBuilder::default().build().is_err());
    }

    #[test]
    fn timeout_is_optional() {
        let config = ModelConfigBuilder::default()
            .api_key("k")
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap();
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn server_listens_on_all_interfaces_by_default() {
        assert_eq!(ServerConfig::default().address(), "0.0.0.0:57103");
    }
}
