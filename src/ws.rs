//! WebSocket transport speaking the JSON frames in [`crate::messages`].

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::TransportError;
use crate::messages::{ClientFrame, ServerFrame};
use crate::models::Message;
use crate::transport::{PushSink, Subscription, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One-shot requests each use their own connection; a subscription keeps one
/// open until released.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        WsTransport { url: url.into() }
    }

    async fn open(&self, frame: &ClientFrame) -> Result<WsStream, TransportError> {
        let (mut stream, _) = connect_async(self.url.as_str()).await.map_err(|e| {
            error!("failed to connect to {}: {}", self.url, e);
            TransportError::from(e)
        })?;
        let text = serde_json::to_string(frame)?;
        stream.send(WsMessage::Text(text.into())).await?;
        Ok(stream)
    }

    /// Reads frames until `pick` accepts one or the server reports an error.
    async fn await_reply<T>(
        stream: &mut WsStream,
        pick: impl Fn(ServerFrame) -> Option<T>,
    ) -> Result<T, TransportError> {
        while let Some(msg) = stream.next().await {
            match msg? {
                WsMessage::Text(text) => {
                    let frame: ServerFrame = serde_json::from_str(&text)?;
                    if let ServerFrame::Error { message } = frame {
                        return Err(TransportError::Rejected(message));
                    }
                    if let Some(reply) = pick(frame) {
                        return Ok(reply);
                    }
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
        Err(TransportError::Closed)
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn fetch_history(&self, room_id: &str) -> Result<Vec<Message>, TransportError> {
        let mut stream = self
            .open(&ClientFrame::GetMessages {
                room_id: room_id.to_string(),
            })
            .await?;
        let messages = Self::await_reply(&mut stream, |frame| match frame {
            ServerFrame::Messages { messages } => Some(messages),
            _ => None,
        })
        .await?;
        let _ = stream.close(None).await;
        debug!("fetched {} messages for {}", messages.len(), room_id);
        Ok(messages)
    }

    async fn subscribe(
        &self,
        room_id: &str,
        sink: PushSink,
    ) -> Result<Subscription, TransportError> {
        let stream = self
            .open(&ClientFrame::Subscribe {
                room_id: room_id.to_string(),
            })
            .await?;
        info!("subscribed to {} at {}", room_id, self.url);

        let task = tokio::spawn(async move {
            let mut stream = stream;
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(WsMessage::Text(text)) => match serde_json::from_str::<ServerFrame>(&text) {
                        Ok(ServerFrame::OnCreateMessage { message }) => sink.on_message(message),
                        Ok(ServerFrame::Error { message }) => {
                            sink.on_error(TransportError::Rejected(message));
                            return;
                        }
                        Ok(_) => {}
                        Err(e) => warn!("skipping malformed push frame: {}", e),
                    },
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        sink.on_error(e.into());
                        return;
                    }
                }
            }
            sink.on_error(TransportError::Closed);
        });

        Ok(Subscription::new(move || task.abort()))
    }

    async fn submit(
        &self,
        room_id: &str,
        content: &str,
        recipient_email: Option<&str>,
        sender_email: &str,
    ) -> Result<Message, TransportError> {
        let mut stream = self
            .open(&ClientFrame::CreateMessage {
                room_id: room_id.to_string(),
                content: content.to_string(),
                recipient: recipient_email.map(str::to_owned),
                sender_email: sender_email.to_string(),
            })
            .await?;
        let message = Self::await_reply(&mut stream, |frame| match frame {
            ServerFrame::MessageCreated { message } => Some(message),
            _ => None,
        })
        .await?;
        let _ = stream.close(None).await;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = WsTransport::new(format!("ws://{addr}/ws"));
        let err = transport.fetch_history("general").await.unwrap_err();
        assert!(matches!(err, TransportError::WebSocket(_)));
    }

    #[tokio::test]
    async fn malformed_url_is_a_transport_error() {
        let transport = WsTransport::new("not a url");
        assert!(transport
            .submit("general", "hi", None, "a@x.com")
            .await
            .is_err());
    }
}
