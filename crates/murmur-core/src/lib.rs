//! Murmur chat routing core.
//!
//! This crate holds everything a transport needs to run the chat:
//!
//! - [`ConnectionRegistry`]: identity to live connection, with
//!   compare-and-delete on disconnect
//! - [`MessageStore`]: in-memory history replayed to joining clients
//! - [`Router`]: public broadcast and private delivery, including the
//!   unreachable-recipient notice
//! - [`Session`]: per-connection state driving the router from wire events
//!
//! It has no network dependencies; the server crate provides the websocket
//! transport.

pub mod error;
pub mod event;
pub mod message;
pub mod registry;
pub mod router;
pub mod session;
pub mod store;

pub use error::{ChatError, ChatResult};
pub use event::{ClientEvent, ServerEvent};
pub use message::{ChatMessage, MessageKind, MAX_CONTENT_LENGTH, SYSTEM_SENDER};
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, SendResult};
pub use router::{Delivery, Router};
pub use session::Session;
pub use store::MessageStore;
