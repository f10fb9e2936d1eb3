//! Message routing.
//!
//! The [`Router`] owns the registry and the history store and is the single
//! dispatch point for join, send and leave events. Every event handler runs
//! under one async mutex, so an append and its fan-out are atomic with
//! respect to other events, and a joining client's history snapshot can
//! neither miss nor duplicate a concurrent message.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::error::{ChatError, ChatResult};
use crate::event::ServerEvent;
use crate::message::{ChatMessage, MAX_CONTENT_LENGTH, SYSTEM_SENDER};
use crate::registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, SendResult};
use crate::store::MessageStore;

/// Outcome of routing one message.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// The stored record
    pub message: ChatMessage,
    /// Connections the record was queued on
    pub delivered_to: Vec<ConnectionId>,
    /// Connections whose queue was full or closed; the record was dropped
    pub dropped: Vec<ConnectionId>,
    /// A system notice was sent because the recipient is not connected
    pub recipient_unreachable: bool,
}

impl Delivery {
    fn new(message: ChatMessage) -> Self {
        Self {
            message,
            delivered_to: Vec::new(),
            dropped: Vec::new(),
            recipient_unreachable: false,
        }
    }
}

/// Routes messages between registered connections.
#[derive(Debug)]
pub struct Router {
    registry: Arc<ConnectionRegistry>,
    store: Arc<MessageStore>,
    dispatch: Mutex<()>,
    max_message_len: usize,
}

impl Router {
    pub fn new(registry: Arc<ConnectionRegistry>, store: Arc<MessageStore>) -> Self {
        Self {
            registry,
            store,
            dispatch: Mutex::new(()),
            max_message_len: MAX_CONTENT_LENGTH,
        }
    }

    /// Set the maximum accepted message length in characters.
    pub fn with_max_message_len(mut self, max: usize) -> Self {
        self.max_message_len = max;
        self
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Register `handle` under `identity` and replay the history to it.
    ///
    /// Returns the identity as registered (trimmed).
    #[instrument(skip(self, handle), fields(connection = %handle.id))]
    pub async fn join(&self, identity: &str, handle: &ConnectionHandle) -> ChatResult<String> {
        let identity = validate_identity(identity)?;

        let _guard = self.dispatch.lock().await;
        if let Some(displaced) = self.registry.register(&identity, handle.clone()) {
            info!(identity = %identity, displaced = %displaced, "Identity taken over by new connection");
        }

        let messages = self.store.snapshot().await;
        debug!(identity = %identity, count = messages.len(), "Replaying history");
        self.registry
            .send_to(handle, ServerEvent::History { messages });

        info!(identity = %identity, "User joined");
        Ok(identity)
    }

    /// Store a public message and broadcast it to every registered connection.
    #[instrument(skip(self, text))]
    pub async fn send_public(&self, sender: &str, text: &str) -> ChatResult<Delivery> {
        self.validate_text(text)?;

        let _guard = self.dispatch.lock().await;
        let message = self.store.append(ChatMessage::public(sender, text)).await;

        let mut delivery = Delivery::new(message);
        for handle in self.registry.handles() {
            self.deliver(&handle, &mut delivery);
        }

        debug!(
            recipients = delivery.delivered_to.len(),
            dropped = delivery.dropped.len(),
            "Broadcast public message"
        );
        Ok(delivery)
    }

    /// Store a private message and deliver it to the recipient and back to
    /// the sender's connection.
    ///
    /// If the recipient is not connected, the sender additionally receives a
    /// system notice. The notice is not stored.
    #[instrument(skip(self, origin, text), fields(connection = %origin.id))]
    pub async fn send_private(
        &self,
        sender: &str,
        origin: &ConnectionHandle,
        recipient: &str,
        text: &str,
    ) -> ChatResult<Delivery> {
        self.validate_text(text)?;
        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(ChatError::MissingRecipient);
        }

        let _guard = self.dispatch.lock().await;
        let message = self
            .store
            .append(ChatMessage::private(sender, recipient, text))
            .await;

        let mut delivery = Delivery::new(message);
        let mut reached_origin = false;

        match self.registry.resolve(recipient) {
            Some(target) => {
                reached_origin = target.id == origin.id;
                self.deliver(&target, &mut delivery);
            }
            None => {
                debug!(recipient = %recipient, "Recipient not connected");
                delivery.recipient_unreachable = true;
                let notice = ChatMessage::recipient_unreachable(recipient, sender);
                self.registry
                    .send_to(origin, ServerEvent::for_message(notice));
            }
        }

        // One attempt per connection, even when the recipient is the sender
        if !reached_origin {
            self.deliver(origin, &mut delivery);
        }

        Ok(delivery)
    }

    /// Drop the registration made by a closed connection.
    #[instrument(skip(self))]
    pub async fn leave(&self, id: ConnectionId) -> Option<String> {
        let _guard = self.dispatch.lock().await;
        let identity = self.registry.unregister_by_handle(id);
        if let Some(identity) = &identity {
            info!(identity = %identity, "User left");
        }
        identity
    }

    fn deliver(&self, handle: &ConnectionHandle, delivery: &mut Delivery) {
        let event = ServerEvent::for_message(delivery.message.clone());
        match self.registry.send_to(handle, event) {
            SendResult::Sent => delivery.delivered_to.push(handle.id),
            SendResult::ChannelFull | SendResult::ChannelClosed => {
                delivery.dropped.push(handle.id)
            }
        }
    }

    fn validate_text(&self, text: &str) -> ChatResult<()> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyText);
        }
        let len = text.chars().count();
        if len > self.max_message_len {
            return Err(ChatError::MessageTooLong {
                len,
                max: self.max_message_len,
            });
        }
        Ok(())
    }
}

/// Normalize a requested identity.
pub fn validate_identity(identity: &str) -> ChatResult<String> {
    let identity = identity.trim();
    if identity.is_empty() {
        return Err(ChatError::EmptyIdentity);
    }
    if identity == SYSTEM_SENDER {
        return Err(ChatError::reserved(identity));
    }
    Ok(identity.to_string())
}
