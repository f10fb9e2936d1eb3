//! Chat message domain types.
//!
//! A [`ChatMessage`] is immutable once the server accepts it. The
//! constructors and deserialization both keep `recipient_id` present
//! exactly when the kind is [`MessageKind::Private`]; the fields are public
//! for reading, and code that mutates them owns that invariant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sender identity used for server-synthesized notices.
pub const SYSTEM_SENDER: &str = "System";

/// Default maximum message length in characters.
pub const MAX_CONTENT_LENGTH: usize = 4000;

/// Delivery class of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Delivered to every connection
    Public,
    /// Delivered to the sender and one recipient
    Private,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Public => write!(f, "public"),
            MessageKind::Private => write!(f, "private"),
        }
    }
}

/// A message as stored and delivered by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "WireMessage")]
pub struct ChatMessage {
    /// Identity of the author
    pub sender_id: String,

    /// Message body as sent
    pub text: String,

    /// Public or private
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Addressee, only for private messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,

    /// Server-assigned acceptance time
    pub timestamp: DateTime<Utc>,
}

/// Unchecked wire shape, validated into a [`ChatMessage`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    sender_id: String,
    text: String,
    #[serde(rename = "type")]
    kind: MessageKind,
    #[serde(default)]
    recipient_id: Option<String>,
    timestamp: DateTime<Utc>,
}

impl TryFrom<WireMessage> for ChatMessage {
    type Error = String;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        match (wire.kind, &wire.recipient_id) {
            (MessageKind::Public, Some(_)) => {
                return Err("public message must not carry recipientId".to_string())
            }
            (MessageKind::Private, None) => {
                return Err("private message requires recipientId".to_string())
            }
            _ => {}
        }
        Ok(Self {
            sender_id: wire.sender_id,
            text: wire.text,
            kind: wire.kind,
            recipient_id: wire.recipient_id,
            timestamp: wire.timestamp,
        })
    }
}

impl ChatMessage {
    /// Create a public message stamped with the current time.
    pub fn public(sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            text: text.into(),
            kind: MessageKind::Public,
            recipient_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a private message stamped with the current time.
    pub fn private(
        sender_id: impl Into<String>,
        recipient_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            text: text.into(),
            kind: MessageKind::Private,
            recipient_id: Some(recipient_id.into()),
            timestamp: Utc::now(),
        }
    }

    /// Notice sent back to `sender` when `recipient` cannot be reached.
    pub fn recipient_unreachable(recipient: &str, sender: &str) -> Self {
        Self::private(
            SYSTEM_SENDER,
            sender,
            format!("{} is currently offline or does not exist.", recipient),
        )
    }

    pub fn is_private(&self) -> bool {
        self.kind == MessageKind::Private
    }

    /// Check if this message was authored by the server.
    pub fn is_system(&self) -> bool {
        self.sender_id == SYSTEM_SENDER
    }
}
