//! Per-connection session state.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{ChatError, ChatResult};
use crate::event::{ClientEvent, ServerEvent};
use crate::registry::{ConnectionHandle, ConnectionId};
use crate::router::Router;

/// One client connection's view of the chat.
///
/// The transport creates a session per connection, feeds it decoded frames
/// and calls [`Session::close`] when the connection ends.
#[derive(Debug)]
pub struct Session {
    router: Arc<Router>,
    handle: ConnectionHandle,
    identity: Option<String>,
}

impl Session {
    /// Create a session whose outbound events go to `sender`.
    pub fn new(router: Arc<Router>, sender: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            router,
            handle: ConnectionHandle::new(ConnectionId::new(), sender),
            identity: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.handle.id
    }

    /// Identity claimed by this connection, once joined.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Handle one raw text frame.
    ///
    /// Rejections are reported back to this connection as an `error` event
    /// and also returned to the caller.
    pub async fn handle_frame(&mut self, frame: &str) -> ChatResult<()> {
        let result = match ClientEvent::parse(frame) {
            Ok(event) => self.handle_event(event).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            warn!(connection = %self.handle.id, error = %e, "Rejected client event");
            self.router.registry().send_to(
                &self.handle,
                ServerEvent::Error {
                    message: e.to_string(),
                },
            );
        }
        result
    }

    /// Handle one decoded client event.
    pub async fn handle_event(&mut self, event: ClientEvent) -> ChatResult<()> {
        match event {
            ClientEvent::Join { identity } => {
                if let Some(current) = &self.identity {
                    return Err(ChatError::AlreadyJoined(current.clone()));
                }
                let identity = self.router.join(&identity, &self.handle).await?;
                self.identity = Some(identity);
            }
            ClientEvent::SendPublic { text } => {
                let sender = self.identity.as_deref().ok_or(ChatError::NotJoined)?;
                self.router.send_public(sender, &text).await?;
            }
            ClientEvent::SendPrivate { text, recipient_id } => {
                let sender = self.identity.as_deref().ok_or(ChatError::NotJoined)?;
                self.router
                    .send_private(sender, &self.handle, &recipient_id, &text)
                    .await?;
            }
        }
        Ok(())
    }

    /// Release this connection's registration.
    pub async fn close(self) {
        let removed = self.router.leave(self.handle.id).await;
        debug!(
            connection = %self.handle.id,
            identity = ?self.identity,
            unregistered = removed.is_some(),
            "Session closed"
        );
    }
}
