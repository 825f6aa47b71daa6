use crate::model::ProviderId;

/// Errors returned by a provider adapter before they are normalized for the
/// public turn stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Provider returned an application-level failure (HTTP status, auth, a
    /// mid-stream error frame).
    #[error("provider error ({provider}): {message}")]
    Provider {
        provider: ProviderId,
        message: String,
        status_code: Option<u16>,
    },
    /// Transport or stream I/O failed.
    #[error("transport error ({provider}): {message}")]
    Transport {
        provider: ProviderId,
        message: String,
    },
    /// Provider response shape or event sequencing was invalid.
    #[error("protocol error ({provider}): {message}")]
    Protocol {
        provider: ProviderId,
        message: String,
    },
}

impl ProviderError {
    /// Creates a provider-level error.
    pub fn provider(
        provider: impl Into<ProviderId>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Creates a transport-level error.
    pub fn transport(provider: impl Into<ProviderId>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a protocol-level error.
    pub fn protocol(provider: impl Into<ProviderId>, message: impl Into<String>) -> Self {
        Self::Protocol {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Returns the provider associated with this error.
    pub fn provider_id(&self) -> &ProviderId {
        match self {
            Self::Provider { provider, .. }
            | Self::Transport { provider, .. }
            | Self::Protocol { provider, .. } => provider,
        }
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Provider { message, .. }
            | Self::Transport { message, .. }
            | Self::Protocol { message, .. } => message,
        }
    }
}

/// Terminal turn failure carried by `StreamEvent::Error` and
/// `TurnOutcome::failure`.
///
/// Cancellation is deliberately not a failure; a cancelled turn ends in the
/// distinct `TurnStatus::Cancelled` state with no failure attached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum TurnFailure {
    /// Provider returned a non-retryable or terminal failure.
    #[error("provider failure ({provider}): {message}")]
    Provider { provider: String, message: String },
    /// Network/stream transport failed (including the no-data watchdog).
    #[error("transport failure ({provider}): {message}")]
    Transport { provider: String, message: String },
    /// The stream violated the expected framing or event sequencing.
    #[error("protocol failure: {message}")]
    Protocol { message: String },
}

/// Top-level error type for the public client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client/provider configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid user input to the builder API.
    #[error("validation error: {0}")]
    Validation(String),
    /// Requested provider is not registered in the client.
    #[error("provider not found: {provider}")]
    ProviderNotFound { provider: ProviderId },
    /// Provider startup/request error before the turn stream is established.
    #[error(transparent)]
    Provider(ProviderError),
    /// Terminal failure of a started turn, surfaced by `collect_text`.
    #[error(transparent)]
    TurnFailed(TurnFailure),
    /// The turn was cancelled before producing a complete transcript.
    #[error("turn cancelled")]
    Cancelled,
    /// Internal protocol misuse or invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

pub(crate) fn turn_failure_from_provider_error(err: &ProviderError) -> TurnFailure {
    match err {
        ProviderError::Provider {
            provider, message, ..
        } => TurnFailure::Provider {
            provider: provider.to_string(),
            message: message.clone(),
        },
        ProviderError::Transport { provider, message } => TurnFailure::Transport {
            provider: provider.to_string(),
            message: message.clone(),
        },
        ProviderError::Protocol { provider, message } => TurnFailure::Protocol {
            message: format!("provider={provider}: {message}"),
        },
    }
}
