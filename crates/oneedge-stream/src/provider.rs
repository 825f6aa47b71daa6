use std::collections::HashMap;
use std::pin::Pin;

use crate::errors::ProviderError;
use crate::message::ChatMessage;
use crate::model::{ModelRef, ProviderId, TurnOptions};

/// Fully validated request handed to a provider adapter.
#[derive(Clone, Debug)]
pub struct ProviderRequest {
    pub turn_id: uuid::Uuid,
    pub conversation_id: uuid::Uuid,
    pub model: ModelRef,
    /// Optional system prompt prepended to `messages`.
    pub system_prompt: Option<String>,
    /// Conversation messages in order, oldest first.
    pub messages: Vec<ChatMessage>,
    pub options: TurnOptions,
    /// Vendor-specific options keyed by provider id; adapters read only
    /// their own entry.
    pub vendor_options: HashMap<ProviderId, serde_json::Value>,
}

/// Raw events produced by a provider adapter, before normalization into the
/// public `StreamEvent` surface.
#[derive(Clone, Debug, PartialEq)]
pub enum ProviderEvent {
    /// Incremental assistant text.
    ContentDelta { text: String },
    /// Provider signalled end of stream (the `[DONE]` sentinel for
    /// OpenAI-compatible endpoints).
    Completed { finish_reason: Option<String> },
}

/// Boxed event stream returned by `ProviderAdapter::start_stream`.
pub type ProviderEventStream =
    Pin<Box<dyn futures::Stream<Item = Result<ProviderEvent, ProviderError>> + Send + 'static>>;

/// Response metadata captured when the stream was established.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderResponseMeta {
    /// Provider-assigned request id (`x-request-id` where available).
    pub request_id: Option<String>,
}

/// Live stream handle plus response metadata.
pub struct ProviderStreamHandle {
    pub stream: ProviderEventStream,
    pub metadata: ProviderResponseMeta,
}

/// Contract implemented by vendor integrations.
///
/// Adapters own the wire format; the turn runtime owns cancellation,
/// accumulation, and terminal-state bookkeeping.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable provider id used for registry lookup.
    fn id(&self) -> ProviderId;

    /// Opens the streaming completion request and returns the event stream.
    async fn start_stream(
        &self,
        req: ProviderRequest,
    ) -> Result<ProviderStreamHandle, ProviderError>;
}
