//! Wire protocol.
//!
//! One JSON object per line, discriminated by its `"type"` field. A client
//! sends exactly one `ClientMessage` per connection; the broker answers with
//! `ServerMessage`s.

use serde::{Deserialize, Serialize};

use crate::broker::message::{Message, StatusCode, TopicStatusEntry};
use crate::utils::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "subscribe")]
    Subscribe { topics: Vec<String> },

    #[serde(rename = "publish")]
    Publish { topic: String, payload: String },

    #[serde(rename = "list_topics")]
    ListTopics,

    #[serde(rename = "get_topic_status")]
    GetTopicStatus { topics: Vec<String> },
}

impl ClientMessage {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| {
            Error::MalformedCommand(format!(
                "{e} | {}",
                line.chars().take(100).collect::<String>()
            ))
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::Subscribe { .. } => "subscribe",
            ClientMessage::Publish { .. } => "publish",
            ClientMessage::ListTopics => "list_topics",
            ClientMessage::GetTopicStatus { .. } => "get_topic_status",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "subscribed")]
    Subscribed { topics: Vec<String> },

    #[serde(rename = "message")]
    Message {
        topic: String,
        payload: String,
        timestamp: i64,
    },

    #[serde(rename = "publish_ack")]
    PublishAck {
        status: StatusCode,
        delivered: usize,
        failed: usize,
    },

    #[serde(rename = "topic_list")]
    TopicList { topics: Vec<String> },

    #[serde(rename = "topic_status")]
    TopicStatus { topics: Vec<TopicStatusEntry> },

    #[serde(rename = "error")]
    Error { status: StatusCode, message: String },
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| Error::UnexpectedResponse(format!("{e}")))
    }
}

impl From<Message> for ServerMessage {
    fn from(message: Message) -> Self {
        ServerMessage::Message {
            topic: message.topic,
            payload: message.payload,
            timestamp: message.timestamp,
        }
    }
}

impl From<&Error> for ServerMessage {
    fn from(err: &Error) -> Self {
        ServerMessage::Error {
            status: err.status(),
            message: err.to_string(),
        }
    }
}
