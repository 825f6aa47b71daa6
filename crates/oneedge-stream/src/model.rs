use std::fmt;
use std::time::Duration;

/// Stable identifier for a provider implementation (for example `openai`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ProviderId(pub String);

impl ProviderId {
    /// Creates a provider id from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the provider id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProviderId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Model selection for a turn.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ModelRef {
    /// Provider that owns the model.
    pub provider: ProviderId,
    /// Provider-specific model name (for example `gpt-4o-mini`).
    pub model: String,
}

impl ModelRef {
    /// Creates a model reference.
    pub fn new(provider: impl Into<ProviderId>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Key used by the per-conversation active-turn guard.
    pub(crate) fn slot_key(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Generic turn behavior options.
///
/// `temperature` and `max_tokens` are part of the completion request body;
/// the remaining fields control local streaming behavior only.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TurnOptions {
    /// Sampling temperature forwarded to the completion endpoint.
    pub temperature: Option<f32>,
    /// Completion token cap forwarded to the completion endpoint.
    pub max_tokens: Option<u32>,
    /// Optional overall request timeout (headers plus full stream).
    pub timeout: Option<Duration>,
    /// Optional no-data watchdog: the turn fails with a transport error when
    /// no provider event arrives within this window.
    pub idle_timeout: Option<Duration>,
    /// Bounded event buffer size used by the streaming channel.
    pub stream_buffer_capacity: usize,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            temperature: None,
            max_tokens: None,
            timeout: None,
            idle_timeout: None,
            stream_buffer_capacity: 128,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_options_default_buffer_capacity() {
        assert_eq!(TurnOptions::default().stream_buffer_capacity, 128);
    }

    #[test]
    fn slot_key_combines_provider_and_model() {
        let model = ModelRef::new("openai", "gpt-4o-mini");
        assert_eq!(model.slot_key(), "openai/gpt-4o-mini");
    }
}
