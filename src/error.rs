use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::config::ConfigError;

/// Input rejected before anything reaches the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("message content is empty")]
    EmptyContent,
    #[error("recipient address is empty")]
    EmptyRecipient,
    #[error("a message is already being sent")]
    SubmissionInFlight,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("connection closed")]
    Closed,
    #[error("request timed out")]
    Timeout,
    #[error("malformed frame: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("websocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),
}

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        TransportError::WebSocket(Box::new(err))
    }
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),
    #[error("chat session has shut down")]
    SessionClosed,
    #[error(transparent)]
    Config(#[from] ConfigError),
}
