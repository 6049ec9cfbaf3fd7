//! Client core for a single shared chat room.
//!
//! The room's flat message stream is materialized into a public channel and
//! per-peer direct-message conversations, plus a contact list derived from
//! DM history. Authentication and delivery are supplied by the caller through
//! [`transport::AuthProvider`] and [`transport::Transport`].

pub mod backoff;
pub mod client;
pub mod config;
pub mod contacts;
pub mod error;
pub mod messages;
pub mod models;
pub mod room;
pub mod session;
pub mod store;
pub mod target;
pub mod transport;
pub mod view;
pub mod ws;

pub use client::{ChatClient, ChatHandle, ClientEvent, ClientSettings, Snapshot};
pub use config::Config;
pub use contacts::{contacts_for, ContactSet};
pub use error::{ChatError, TransportError, ValidationError};
pub use models::{Identity, Message};
pub use room::LocalRoom;
pub use session::{Session, SubmitState, Submission};
pub use store::MessageStore;
pub use target::ConversationTarget;
pub use transport::{AuthProvider, PushEvent, PushSink, StaticAuth, Subscription, Transport};
pub use view::{conversation_of, is_own_message, resolve, Direction, MessageView};
pub use ws::WsTransport;
