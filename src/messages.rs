//! JSON frames exchanged with a WebSocket chat backend.

use serde::{Deserialize, Serialize};

use crate::models::Message;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "get_messages")]
    GetMessages {
        #[serde(rename = "chatRoomId")]
        room_id: String,
    },
    #[serde(rename = "subscribe")]
    Subscribe {
        #[serde(rename = "chatRoomId")]
        room_id: String,
    },
    #[serde(rename = "create_message")]
    CreateMessage {
        #[serde(rename = "chatRoomId")]
        room_id: String,
        content: String,
        recipient: Option<String>,
        #[serde(rename = "senderEmail")]
        sender_email: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "messages")]
    Messages { messages: Vec<Message> },
    #[serde(rename = "message_created")]
    MessageCreated { message: Message },
    #[serde(rename = "on_create_message")]
    OnCreateMessage { message: Message },
    #[serde(rename = "error")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_message_uses_backend_names() {
        let frame = ClientFrame::CreateMessage {
            room_id: "general".into(),
            content: "hey".into(),
            recipient: Some("b@y.com".into()),
            sender_email: "a@x.com".into(),
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({
                "type": "create_message",
                "chatRoomId": "general",
                "content": "hey",
                "recipient": "b@y.com",
                "senderEmail": "a@x.com"
            })
        );
    }

    #[test]
    fn public_submission_sends_null_recipient() {
        let frame = ClientFrame::CreateMessage {
            room_id: "general".into(),
            content: "hi".into(),
            recipient: None,
            sender_email: "a@x.com".into(),
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert!(value["recipient"].is_null());
    }

    #[test]
    fn decodes_push_frame() {
        let text = r#"{"type":"on_create_message","message":{
            "id":"m1","chatRoomId":"general","content":"hi","createdAt":7,
            "senderEmail":"a@x.com","recipient":null}}"#;
        match serde_json::from_str::<ServerFrame>(text).unwrap() {
            ServerFrame::OnCreateMessage { message } => {
                assert_eq!(message.id, "m1");
                assert!(message.is_public());
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn unknown_frame_type_is_an_error() {
        assert!(serde_json::from_str::<ServerFrame>(r#"{"type":"typing"}"#).is_err());
    }
}
