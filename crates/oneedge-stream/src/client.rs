use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::conversation::{Conversation, ConversationConfig};
use crate::errors::ClientError;
use crate::model::ProviderId;
use crate::provider::ProviderAdapter;

pub(crate) struct ClientInner {
    providers: HashMap<ProviderId, Arc<dyn ProviderAdapter>>,
}

impl ClientInner {
    pub(crate) fn provider(&self, id: &ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        self.providers.get(id).cloned()
    }
}

/// Entry point for creating conversations and streaming turns.
#[derive(Clone)]
pub struct ChatClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl ChatClient {
    /// Starts a builder for registering providers and creating a `ChatClient`.
    pub fn builder() -> ChatClientBuilder {
        ChatClientBuilder::default()
    }

    /// Creates a logical conversation for grouping related turns.
    pub fn conversation(&self, config: ConversationConfig) -> Conversation {
        Conversation::new(self.inner.clone(), config)
    }
}

/// Builder used to register provider adapters before creating a `ChatClient`.
#[derive(Default)]
pub struct ChatClientBuilder {
    providers: Vec<Arc<dyn ProviderAdapter>>,
}

impl ChatClientBuilder {
    /// Registers a provider adapter.
    ///
    /// Register one adapter per provider id (for example one `openai` adapter).
    pub fn register_provider(mut self, provider: Arc<dyn ProviderAdapter>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Builds the client and validates provider registration (including duplicates).
    pub fn build(self) -> Result<ChatClient, ClientError> {
        let mut map: HashMap<ProviderId, Arc<dyn ProviderAdapter>> = HashMap::new();
        let mut seen: HashSet<ProviderId> = HashSet::new();
        for provider in self.providers {
            let id = provider.id();
            if !seen.insert(id.clone()) {
                return Err(ClientError::Config(format!(
                    "duplicate provider registration: {id}"
                )));
            }
            map.insert(id, provider);
        }
        Ok(ChatClient {
            inner: Arc::new(ClientInner { providers: map }),
        })
    }
}
