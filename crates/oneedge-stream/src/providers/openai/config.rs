use std::time::Duration;

use crate::errors::ClientError;

/// Configuration for the OpenAI-compatible chat-completion client.
#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    /// API key used for bearer auth.
    pub api_key: String,
    /// Base URL for the OpenAI-compatible endpoint.
    ///
    /// Useful for gateways, proxies, or local test servers.
    pub base_url: String,
    /// Default HTTP timeout for requests.
    pub timeout: Duration,
}

impl OpenAiClientConfig {
    /// Creates a config with sensible defaults and a provided API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com".to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Builds a config from the environment.
    ///
    /// Reads `OPENAI_API_KEY` (required) and `ONEEDGE_BASE_URL` (optional
    /// gateway override).
    pub fn from_env() -> Result<Self, ClientError> {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(ClientError::Config(
                "missing OPENAI_API_KEY for OpenAI provider".into(),
            ));
        }
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("ONEEDGE_BASE_URL")
            && !base_url.trim().is_empty()
        {
            config.base_url = base_url;
        }
        Ok(config)
    }

    /// Overrides the API base URL (for gateways or test servers).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the default HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn chat_completions_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}
