//! Streaming chat-completion core for the OneEdge platform, with a
//! builder-first async API.
//!
//! Provider integrations are namespaced under `providers::*`.
//!
//! # Builder-first usage (OpenAI-compatible endpoint)
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use oneedge_stream::prelude::*;
//! use oneedge_stream::providers::openai::OpenAiChatProvider;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = ChatClient::builder()
//!     .register_provider(Arc::new(OpenAiChatProvider::from_env()?))
//!     .build()?;
//!
//! let text = client
//!     .conversation(ConversationConfig::named("demo"))
//!     .turn(ModelRef::new("openai", "gpt-4o-mini"))
//!     .system_prompt("Answer briefly.")
//!     .user_text("Say hello")
//!     .collect_text()
//!     .await?;
//!
//! println!("{text}");
//! # Ok(())
//! # }
//! ```

/// Heuristic query classification for model selection.
pub mod classify;
/// Client entry point and builder.
pub mod client;
/// Side-by-side comparison runs across several models.
pub mod compare;
/// Conversation configuration and conversation handle.
pub mod conversation;
/// Public error types used by the client API.
pub mod errors;
/// Chat message and role types shared with the wire format.
pub mod message;
/// Model and provider identifiers plus generic turn options.
pub mod model;
/// Process-wide tracing/logging setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Provider adapter contracts used by vendor integrations.
pub mod provider;
/// Vendor-specific integrations and extension traits.
pub mod providers;
/// Normalized public stream events and turn lifecycle types.
pub mod stream;
/// Turn builder, streaming handle, and cancellation handle.
pub mod turn;

pub use classify::{QueryKind, classify};
pub use client::{ChatClient, ChatClientBuilder};
pub use compare::{ComparisonBuilder, ComparisonRun};
pub use conversation::{Conversation, ConversationConfig};
pub use errors::{ClientError, ProviderError, TurnFailure};
pub use message::{ChatMessage, Role};
pub use model::{ModelRef, ProviderId, TurnOptions};
pub use provider::{
    ProviderAdapter, ProviderEvent, ProviderRequest, ProviderResponseMeta, ProviderStreamHandle,
};
pub use stream::{StreamEvent, TurnOutcome, TurnStatus};
pub use turn::{CancelHandle, TurnBuilder, TurnStream};
