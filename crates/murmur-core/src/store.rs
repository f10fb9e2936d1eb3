//! In-memory message history.

use std::collections::VecDeque;

use tokio::sync::RwLock;
use tracing::debug;

use crate::message::ChatMessage;

/// Ordered, append-only history of accepted messages.
///
/// Unbounded by default. With a capacity limit the oldest messages are
/// evicted first; nothing else ever removes a message.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: RwLock<VecDeque<ChatMessage>>,
    limit: Option<usize>,
}

impl MessageStore {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that keeps at most `limit` messages.
    ///
    /// A limit of zero means unbounded.
    pub fn with_capacity_limit(limit: usize) -> Self {
        Self {
            messages: RwLock::new(VecDeque::with_capacity(limit)),
            limit: (limit > 0).then_some(limit),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Append a message and return the stored record.
    pub async fn append(&self, message: ChatMessage) -> ChatMessage {
        let mut messages = self.messages.write().await;
        if let Some(limit) = self.limit {
            while messages.len() >= limit {
                messages.pop_front();
                debug!(limit, "Evicted oldest message from history");
            }
        }
        messages.push_back(message.clone());
        message
    }

    /// Full history in append order.
    pub async fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}
