use std::collections::BTreeSet;

use crate::models::Identity;
use crate::store::MessageStore;

/// Peers the identity has exchanged at least one direct message with.
///
/// Iterates in lexicographic order so a contact list never reshuffles between
/// recomputations.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ContactSet {
    peers: BTreeSet<String>,
}

impl ContactSet {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.peers.iter().map(String::as_str)
    }

    pub fn contains(&self, email: &str) -> bool {
        self.peers.contains(email)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.peers.iter().cloned().collect()
    }
}

/// Derives the contact set from scratch. Holds no state between calls.
pub fn contacts_for(identity: &Identity, store: &MessageStore) -> ContactSet {
    let me = identity.email.as_str();
    let mut peers = BTreeSet::new();

    for message in store.all() {
        let Some(recipient) = message.recipient() else {
            continue;
        };
        match message.sender() {
            Some(sender) if sender == me => {
                peers.insert(recipient.to_owned());
            }
            Some(sender) if recipient == me => {
                peers.insert(sender.to_owned());
            }
            // Not ours, or no sender to reply to.
            _ => {}
        }
    }

    ContactSet { peers }
}
