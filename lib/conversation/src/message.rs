//! Message types for conversations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spectrum_compass_core::MessageId;
use std::fmt;

/// URL value meaning "this resource has no link".
pub const NO_URL_SENTINEL: &str = "N/A";

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The person asking.
    User,
    /// The guide.
    Assistant,
}

/// A resource an assistant answer drew on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    /// Human-readable resource name.
    pub display_name: String,
    /// Link to the resource, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Citation {
    /// Creates a citation. Empty URLs and the `"N/A"` sentinel mean "no link".
    #[must_use]
    pub fn new(display_name: impl Into<String>, url: Option<String>) -> Self {
        let url = url.filter(|u| !u.is_empty() && u != NO_URL_SENTINEL);
        Self {
            display_name: display_name.into(),
            url,
        }
    }

    /// Renders as `[name](url)` when linked, else just the name.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.url {
            Some(ref url) => write!(f, "[{}]({})", self.display_name, url),
            None => write!(f, "{}", self.display_name),
        }
    }
}

/// A message in a conversation. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier.
    pub id: MessageId,
    /// Message role.
    pub role: MessageRole,
    /// Message content.
    pub content: String,
    /// Resources cited by an assistant message. Always empty for users.
    #[serde(default)]
    pub sources: Vec<Citation>,
    /// When the message was created.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: MessageRole, content: impl Into<String>, sources: Vec<Citation>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            sources,
            timestamp: Utc::now(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content, Vec::new())
    }

    /// Creates an assistant message with its citations.
    #[must_use]
    pub fn assistant(content: impl Into<String>, sources: Vec<Citation>) -> Self {
        Self::new(MessageRole::Assistant, content, sources)
    }
}
