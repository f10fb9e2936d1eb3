//! Wire events exchanged over a client connection.
//!
//! Every frame is one JSON object tagged by `type`:
//!
//! ```text
//! -> {"type":"join","identity":"alice"}
//! -> {"type":"sendPrivate","text":"psst","recipientId":"bob"}
//! <- {"type":"deliverPrivate","message":{...}}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ChatResult;
use crate::message::ChatMessage;

/// Events a client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Claim an identity for this connection
    Join { identity: String },

    /// Send a message to everyone
    SendPublic { text: String },

    /// Send a message to one identity
    #[serde(rename_all = "camelCase")]
    SendPrivate { text: String, recipient_id: String },
}

impl ClientEvent {
    /// Decode a client event from a text frame.
    pub fn parse(frame: &str) -> ChatResult<Self> {
        Ok(serde_json::from_str(frame)?)
    }
}

/// Events the server sends to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Full message history, sent once after join
    History { messages: Vec<ChatMessage> },

    /// A public message
    BroadcastPublic { message: ChatMessage },

    /// A private message or system notice
    DeliverPrivate { message: ChatMessage },

    /// A rejected client event
    Error { message: String },
}

impl ServerEvent {
    /// Wrap a message in the event matching its kind.
    pub fn for_message(message: ChatMessage) -> Self {
        if message.is_private() {
            ServerEvent::DeliverPrivate { message }
        } else {
            ServerEvent::BroadcastPublic { message }
        }
    }

    /// Encode for a text frame.
    pub fn to_json(&self) -> String {
        // Every variant is plain data with string keys
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"type":"error","message":"encoding failed"}"#.to_string())
    }

    /// The carried message, if this event delivers one.
    pub fn message(&self) -> Option<&ChatMessage> {
        match self {
            ServerEvent::BroadcastPublic { message } | ServerEvent::DeliverPrivate { message } => {
                Some(message)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;

    #[test]
    fn test_parse_join() {
        let event = ClientEvent::parse(r#"{"type":"join","identity":"alice"}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::Join {
                identity: "alice".to_string()
            }
        );
    }

    #[test]
    fn test_parse_send_private() {
        let event =
            ClientEvent::parse(r#"{"type":"sendPrivate","text":"psst","recipientId":"bob"}"#)
                .unwrap();
        assert_eq!(
            event,
            ClientEvent::SendPrivate {
                text: "psst".to_string(),
                recipient_id: "bob".to_string()
            }
        );
    }

    #[test]
    fn test_parse_unknown_type_is_malformed() {
        let err = ClientEvent::parse(r#"{"type":"shout","text":"hi"}"#).unwrap_err();
        assert!(matches!(err, ChatError::MalformedEvent(_)));
    }

    #[test]
    fn test_parse_private_without_recipient_is_malformed() {
        let err = ClientEvent::parse(r#"{"type":"sendPrivate","text":"psst"}"#).unwrap_err();
        assert!(matches!(err, ChatError::MalformedEvent(_)));
    }

    #[test]
    fn test_server_event_tags() {
        let public = ServerEvent::for_message(ChatMessage::public("alice", "hi"));
        let json: serde_json::Value = serde_json::from_str(&public.to_json()).unwrap();
        assert_eq!(json["type"], "broadcastPublic");
        assert_eq!(json["message"]["text"], "hi");

        let private = ServerEvent::for_message(ChatMessage::private("alice", "bob", "psst"));
        let json: serde_json::Value = serde_json::from_str(&private.to_json()).unwrap();
        assert_eq!(json["type"], "deliverPrivate");

        let history = ServerEvent::History { messages: vec![] };
        let json: serde_json::Value = serde_json::from_str(&history.to_json()).unwrap();
        assert_eq!(json["type"], "history");
        assert!(json["messages"].as_array().unwrap().is_empty());
    }
}
