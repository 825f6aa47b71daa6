use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::client::ClientInner;
use crate::compare::ComparisonBuilder;
use crate::model::ModelRef;
use crate::turn::TurnBuilder;

/// Configuration used to create a `Conversation`.
#[derive(Clone, Debug)]
pub struct ConversationConfig {
    /// Human-readable conversation name (useful for logs).
    pub name: String,
}

impl ConversationConfig {
    /// Creates a named conversation config.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Logical grouping for turns.
///
/// Conversations are lightweight and in-memory only; they do not persist
/// history. They do enforce the one-streaming-turn-per-model invariant:
/// starting a second turn for a model that is still streaming in the same
/// conversation is a validation error until the first reaches a terminal
/// state.
#[derive(Clone)]
pub struct Conversation {
    pub(crate) client: Arc<ClientInner>,
    pub(crate) conversation_id: uuid::Uuid,
    pub(crate) config: ConversationConfig,
    pub(crate) active_models: Arc<Mutex<HashSet<String>>>,
}

impl Conversation {
    pub(crate) fn new(client: Arc<ClientInner>, config: ConversationConfig) -> Self {
        Self {
            client,
            conversation_id: uuid::Uuid::new_v4(),
            config,
            active_models: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Returns this conversation's id.
    pub fn id(&self) -> uuid::Uuid {
        self.conversation_id
    }

    /// Starts building a streaming turn for the given model.
    pub fn turn(&self, model: ModelRef) -> TurnBuilder {
        TurnBuilder::new(
            self.client.clone(),
            self.conversation_id,
            self.config.name.clone(),
            self.active_models.clone(),
            model,
        )
    }

    /// Starts building a side-by-side comparison run across several models.
    pub fn compare(&self, models: impl IntoIterator<Item = ModelRef>) -> ComparisonBuilder {
        ComparisonBuilder::new(self.clone(), models.into_iter().collect())
    }
}
