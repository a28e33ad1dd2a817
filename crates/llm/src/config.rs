//! Configuration for the completion client.

use crate::error::LlmError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Any OpenAI-compatible `/v1/chat/completions` endpoint
    OpenAi,
    /// Canned replies, no network
    Mock,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: Provider,

    /// Base URL of the completion API.
    pub api_url: String,

    /// Bearer key for the completion API.
    pub api_key: String,

    pub model: String,

    pub max_tokens: Option<u32>,

    /// Temperature for generation (0.0 - 2.0).
    pub temperature: Option<f32>,

    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            api_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: Some(1024),
            temperature: Some(0.7),
            timeout: Duration::from_secs(60),
        }
    }
}

impl LlmConfig {
    /// Create configuration from environment variables.
    ///
    /// Required unless `LLM_PROVIDER=mock`:
    /// - `LLM_API_KEY`
    ///
    /// Optional:
    /// - `LLM_PROVIDER` - `openai` (default) or `mock`
    /// - `LLM_API_URL` - API URL (default: https://api.openai.com)
    /// - `LLM_MODEL` - Model name (default: gpt-4o-mini)
    /// - `LLM_MAX_TOKENS` - Max tokens (default: 1024)
    /// - `LLM_TEMPERATURE` - Temperature (default: 0.7)
    /// - `LLM_TIMEOUT_SECS` - Request timeout (default: 60)
    pub fn from_env() -> Result<Self, LlmError> {
        let defaults = Self::default();

        let provider = match env::var("LLM_PROVIDER")
            .unwrap_or_else(|_| "openai".to_string())
            .to_lowercase()
            .as_str()
        {
            "openai" => Provider::OpenAi,
            "mock" => Provider::Mock,
            other => {
                return Err(LlmError::Configuration(format!(
                    "unknown LLM_PROVIDER: {}",
                    other
                )))
            }
        };

        let api_key = match (provider, env::var("LLM_API_KEY")) {
            (_, Ok(key)) => key,
            (Provider::Mock, Err(_)) => String::new(),
            (Provider::OpenAi, Err(_)) => {
                return Err(LlmError::Configuration("LLM_API_KEY not set".to_string()))
            }
        };

        let api_url = env::var("LLM_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);

        let model = env::var("LLM_MODEL").unwrap_or(defaults.model);

        let max_tokens = env::var("LLM_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(defaults.max_tokens);

        let temperature = env::var("LLM_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(defaults.temperature);

        let timeout = env::var("LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Ok(Self {
            provider,
            api_url,
            api_key,
            model,
            max_tokens,
            temperature,
            timeout,
        })
    }
}
