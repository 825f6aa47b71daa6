//! OpenAI-compatible chat-completion integration and request options.
//!
//! Vendor-specific configuration lives here so the root client API can remain
//! provider-agnostic.
mod adapter;
mod config;
mod options;
pub(crate) mod transport;

pub use adapter::OpenAiChatProvider;
pub use config::OpenAiClientConfig;
pub use options::OpenAiRequestOptions;

use crate::model::ProviderId;
use crate::turn::TurnBuilder;

/// Extension trait for attaching OpenAI-specific options to a `TurnBuilder`.
pub trait OpenAiTurnBuilderExt {
    /// Adds OpenAI request options for the current turn.
    ///
    /// These options are stored internally under the `openai` provider key
    /// and read only by `OpenAiChatProvider`.
    fn openai_options(self, options: OpenAiRequestOptions) -> Self;
}

impl OpenAiTurnBuilderExt for TurnBuilder {
    fn openai_options(self, options: OpenAiRequestOptions) -> Self {
        let value = serde_json::to_value(options)
            .expect("OpenAiRequestOptions serialization should be infallible");
        self.set_vendor_options_json(ProviderId::new("openai"), value)
    }
}
