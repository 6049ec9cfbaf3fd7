//! Contracts for the collaborators the chat core depends on but does not implement.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ChatError, TransportError};
use crate::models::{Identity, Message};

/// Something delivered on a push channel.
#[derive(Debug)]
pub enum PushEvent {
    Message(Message),
    Error(TransportError),
}

/// Receiving end a transport pushes into. Cheap to clone.
#[derive(Clone)]
pub struct PushSink {
    deliver: Arc<dyn Fn(PushEvent) + Send + Sync>,
}

impl PushSink {
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(PushEvent) + Send + Sync + 'static,
    {
        PushSink {
            deliver: Arc::new(deliver),
        }
    }

    pub fn on_message(&self, message: Message) {
        (self.deliver)(PushEvent::Message(message));
    }

    pub fn on_error(&self, error: TransportError) {
        (self.deliver)(PushEvent::Error(error));
    }
}

impl fmt::Debug for PushSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushSink").finish_non_exhaustive()
    }
}

/// A live push channel. Released on `cancel` or when dropped.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Subscription {
            release: Some(Box::new(release)),
        }
    }

    pub fn cancel(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Everything already posted to the room.
    async fn fetch_history(&self, room_id: &str) -> Result<Vec<Message>, TransportError>;

    /// Opens the push channel. Delivery is at-least-once.
    async fn subscribe(&self, room_id: &str, sink: PushSink)
        -> Result<Subscription, TransportError>;

    /// Creates a message. The authoritative copy also arrives over the push channel.
    async fn submit(
        &self,
        room_id: &str,
        content: &str,
        recipient_email: Option<&str>,
        sender_email: &str,
    ) -> Result<Message, TransportError>;
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Fails with [`ChatError::NotAuthenticated`] when no user is signed in.
    async fn current_identity(&self) -> Result<Identity, ChatError>;
}

/// Identity fixed at construction, e.g. from configuration.
#[derive(Debug, Clone)]
pub struct StaticAuth {
    identity: Option<Identity>,
}

impl StaticAuth {
    pub fn new(identity: Identity) -> Self {
        StaticAuth {
            identity: Some(identity),
        }
    }

    pub fn signed_out() -> Self {
        StaticAuth { identity: None }
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn current_identity(&self) -> Result<Identity, ChatError> {
        match &self.identity {
            Some(identity) if !identity.email.trim().is_empty() => Ok(identity.clone()),
            Some(_) => Err(ChatError::NotAuthenticated("identity has no email".into())),
            None => Err(ChatError::NotAuthenticated("no user signed in".into())),
        }
    }
}
