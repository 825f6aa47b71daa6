/// Message role as understood by chat-completion endpoints.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instruction message prepended to the conversation.
    System,
    /// End-user message.
    User,
    /// Prior assistant output replayed as history.
    Assistant,
}

/// One `{role, content}` entry of a completion request body.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let msg = ChatMessage::user("hi");
        let value = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(value.get("role").and_then(|v| v.as_str()), Some("user"));
        assert_eq!(value.get("content").and_then(|v| v.as_str()), Some("hi"));
    }
}
