//! Error types for chat routing.

use thiserror::Error;

/// Errors returned to a client when an event is rejected.
///
/// None of these close the connection; the transport reports them back
/// to the offending client and keeps reading.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Join with a blank identity
    #[error("Identity must not be empty")]
    EmptyIdentity,

    /// Join with an identity the server uses for itself
    #[error("Identity '{0}' is reserved")]
    ReservedIdentity(String),

    /// Message with blank text
    #[error("Message text must not be empty")]
    EmptyText,

    /// Message longer than the configured limit
    #[error("Message is {len} characters, limit is {max}")]
    MessageTooLong {
        /// Length of the rejected text in characters
        len: usize,
        /// Configured limit
        max: usize,
    },

    /// Private message without an addressee
    #[error("Private message requires a recipient")]
    MissingRecipient,

    /// Message sent before the connection joined
    #[error("Join before sending messages")]
    NotJoined,

    /// Second join on the same connection
    #[error("Already joined as '{0}'")]
    AlreadyJoined(String),

    /// Frame could not be decoded as a client event
    #[error("Malformed event: {0}")]
    MalformedEvent(String),
}

impl ChatError {
    /// Create a new malformed event error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedEvent(msg.into())
    }

    /// Create a new reserved identity error.
    pub fn reserved(identity: impl Into<String>) -> Self {
        Self::ReservedIdentity(identity.into())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedEvent(err.to_string())
    }
}

/// Result type alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;
