use std::fmt;

/// The conversation currently shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ConversationTarget {
    #[default]
    Public,
    DirectMessage(String),
    /// Placeholder while a new peer address is being typed. Has no history.
    ComposingNewDirectMessage,
}

impl ConversationTarget {
    pub fn direct(peer: impl Into<String>) -> Self {
        ConversationTarget::DirectMessage(peer.into())
    }

    pub fn peer(&self) -> Option<&str> {
        match self {
            ConversationTarget::DirectMessage(peer) => Some(peer),
            _ => None,
        }
    }

    pub fn is_composing(&self) -> bool {
        matches!(self, ConversationTarget::ComposingNewDirectMessage)
    }
}

impl fmt::Display for ConversationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationTarget::Public => write!(f, "# General"),
            ConversationTarget::DirectMessage(peer) => write!(f, "@ {peer}"),
            ConversationTarget::ComposingNewDirectMessage => write!(f, "New Message"),
        }
    }
}
