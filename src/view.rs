//! Filters the room's message stream into the conversation a user is looking at.

use crate::models::{Identity, Message};
use crate::store::MessageStore;
use crate::target::ConversationTarget;

/// Messages belonging to `target` as seen by `identity`, oldest first.
pub fn resolve<'a>(
    target: &ConversationTarget,
    identity: &Identity,
    store: &'a MessageStore,
) -> Vec<&'a Message> {
    match target {
        ConversationTarget::Public => store.all().iter().filter(|m| m.is_public()).collect(),
        ConversationTarget::DirectMessage(peer) => store
            .all()
            .iter()
            .filter(|m| is_between(m, &identity.email, peer))
            .collect(),
        ConversationTarget::ComposingNewDirectMessage => Vec::new(),
    }
}

fn is_between(message: &Message, me: &str, peer: &str) -> bool {
    match (message.sender(), message.recipient()) {
        (Some(sender), Some(recipient)) => {
            (sender == me && recipient == peer) || (sender == peer && recipient == me)
        }
        _ => false,
    }
}

/// Messages without a sender email are never treated as our own.
pub fn is_own_message(message: &Message, identity: &Identity) -> bool {
    message.sender() == Some(identity.email.as_str())
}

/// The conversation `message` is listed under for `identity`, if any.
pub fn conversation_of(message: &Message, identity: &Identity) -> Option<ConversationTarget> {
    let Some(recipient) = message.recipient() else {
        return Some(ConversationTarget::Public);
    };
    let me = identity.email.as_str();
    match message.sender() {
        Some(sender) if sender == me => Some(ConversationTarget::direct(recipient)),
        Some(sender) if recipient == me => Some(ConversationTarget::direct(sender)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// A message oriented for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub id: String,
    pub content: String,
    pub created_at: u64,
    pub direction: Direction,
    /// Shown for incoming messages only: sender email, else the legacy display name.
    pub sender_label: Option<String>,
}

impl MessageView {
    pub fn new(message: &Message, identity: &Identity) -> Self {
        let (direction, sender_label) = if is_own_message(message, identity) {
            (Direction::Outgoing, None)
        } else {
            let label = message
                .sender()
                .or(message.sender_display.as_deref())
                .map(str::to_owned);
            (Direction::Incoming, label)
        };
        MessageView {
            id: message.id.clone(),
            content: message.content.clone(),
            created_at: message.created_at,
            direction,
            sender_label,
        }
    }
}
