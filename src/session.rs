//! Per-user chat state: the message store plus everything derived from it.

use log::debug;

use crate::contacts::{contacts_for, ContactSet};
use crate::error::{TransportError, ValidationError};
use crate::models::{Identity, Message};
use crate::store::MessageStore;
use crate::target::ConversationTarget;
use crate::view::{self, MessageView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitState {
    #[default]
    Idle,
    Submitting,
}

/// A validated outgoing message, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub room_id: String,
    pub content: String,
    pub recipient_email: Option<String>,
    pub sender_email: String,
    /// Target that was active when the message was sent.
    pub origin: ConversationTarget,
}

/// State owned by the update loop. Contacts are recomputed on every store change.
#[derive(Debug)]
pub struct Session {
    room_id: String,
    identity: Identity,
    store: MessageStore,
    contacts: ContactSet,
    target: ConversationTarget,
    pending_recipient: String,
    draft: String,
    submit_state: SubmitState,
}

impl Session {
    pub fn new(room_id: impl Into<String>, identity: Identity) -> Self {
        Session {
            room_id: room_id.into(),
            identity,
            store: MessageStore::new(),
            contacts: ContactSet::default(),
            target: ConversationTarget::Public,
            pending_recipient: String::new(),
            draft: String::new(),
            submit_state: SubmitState::Idle,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn contacts(&self) -> &ContactSet {
        &self.contacts
    }

    pub fn target(&self) -> &ConversationTarget {
        &self.target
    }

    pub fn pending_recipient(&self) -> &str {
        &self.pending_recipient
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn submit_state(&self) -> SubmitState {
        self.submit_state
    }

    /// Applies one pushed message. Returns false for redeliveries and other rooms.
    pub fn apply_message(&mut self, message: Message) -> bool {
        if message.room_id != self.room_id {
            debug!("ignoring message {} for room {}", message.id, message.room_id);
            return false;
        }
        if !self.store.append(message) {
            return false;
        }
        self.recompute();
        true
    }

    /// Applies a history batch, returning how many messages were new.
    pub fn apply_history(&mut self, messages: Vec<Message>) -> usize {
        let room_id = self.room_id.clone();
        let added = self
            .store
            .extend(messages.into_iter().filter(|m| m.room_id == room_id));
        if added > 0 {
            self.recompute();
        }
        added
    }

    /// Replaces the identity, e.g. after re-authentication.
    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = identity;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.contacts = contacts_for(&self.identity, &self.store);
    }

    pub fn select(&mut self, target: ConversationTarget) {
        if !target.is_composing() {
            self.pending_recipient.clear();
        }
        self.target = target;
    }

    pub fn start_new_direct_message(&mut self) {
        self.select(ConversationTarget::ComposingNewDirectMessage);
    }

    pub fn set_pending_recipient(&mut self, address: impl Into<String>) {
        self.pending_recipient = address.into();
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.draft = draft.into();
    }

    /// Validates the draft against the active target and enters `Submitting`.
    pub fn begin_submit(&mut self) -> Result<Submission, ValidationError> {
        if self.submit_state == SubmitState::Submitting {
            return Err(ValidationError::SubmissionInFlight);
        }
        if self.draft.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        let recipient_email = match &self.target {
            ConversationTarget::Public => None,
            ConversationTarget::DirectMessage(peer) => Some(peer.clone()),
            ConversationTarget::ComposingNewDirectMessage => {
                let address = self.pending_recipient.trim();
                if address.is_empty() {
                    return Err(ValidationError::EmptyRecipient);
                }
                Some(address.to_owned())
            }
        };

        self.submit_state = SubmitState::Submitting;
        Ok(Submission {
            room_id: self.room_id.clone(),
            content: self.draft.clone(),
            recipient_email,
            sender_email: self.identity.email.clone(),
            origin: self.target.clone(),
        })
    }

    /// Returns to `Idle`. On success a new-DM compose switches to that peer's
    /// conversation and the draft is cleared if the user has not edited it
    /// since. The store is only ever fed by the push path.
    pub fn finish_submit(
        &mut self,
        submission: &Submission,
        result: Result<Message, TransportError>,
    ) -> Result<Message, TransportError> {
        self.submit_state = SubmitState::Idle;
        let message = result?;

        if self.draft == submission.content {
            self.draft.clear();
        }
        if submission.origin.is_composing() && self.target.is_composing() {
            if let Some(peer) = &submission.recipient_email {
                self.select(ConversationTarget::direct(peer.clone()));
            }
        }
        Ok(message)
    }

    /// Messages of the active conversation, oldest first.
    pub fn current_view(&self) -> Vec<&Message> {
        view::resolve(&self.target, &self.identity, &self.store)
    }

    pub fn current_message_views(&self) -> Vec<MessageView> {
        self.current_view()
            .into_iter()
            .map(|m| MessageView::new(m, &self.identity))
            .collect()
    }

    pub fn is_own_message(&self, message: &Message) -> bool {
        view::is_own_message(message, &self.identity)
    }
}
