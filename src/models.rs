use serde::{Deserialize, Serialize};

/// A chat message as assigned by the backend. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "chatRoomId")]
    pub room_id: String,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "createdAt")]
    pub created_at: u64,
    #[serde(rename = "sender", default)]
    pub sender_display: Option<String>,
    #[serde(rename = "senderEmail", default)]
    pub sender_email: Option<String>,
    #[serde(rename = "recipient", default)]
    pub recipient_email: Option<String>,
}

impl Message {
    /// Recipient of a direct message. Blank recipients count as public.
    pub fn recipient(&self) -> Option<&str> {
        self.recipient_email.as_deref().filter(|r| !r.is_empty())
    }

    pub fn sender(&self) -> Option<&str> {
        self.sender_email.as_deref().filter(|s| !s.is_empty())
    }

    pub fn is_public(&self) -> bool {
        self.recipient().is_none()
    }

    /// Display ordering: creation time, then id.
    pub fn order_key(&self) -> (u64, &str) {
        (self.created_at, self.id.as_str())
    }
}

/// The authenticated actor. `email` drives every ownership and routing decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub email: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Identity {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}
