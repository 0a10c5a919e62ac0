//! Message and status definitions for the broker
//!
//! `Message` is what subscribers receive: the topic it was published to, the
//! payload and the broker-assigned timestamp (milliseconds since UNIX epoch).
//! `StatusCode` is the numeric outcome carried on the wire, `0` meaning
//! success.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::client::ConnectionId;
use crate::utils::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub topic: String,
    pub payload: String,
    pub timestamp: i64,
}

impl Message {
    /// Stamp a new message with the current time.
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum StatusCode {
    Success = 0,
    PartialDeliveryFailure = 1,
    DeliveryFailed = 2,
    InvalidArgument = 3,
    MalformedCommand = 4,
    ConnectionClosed = 5,
    Backpressure = 6,
    UnknownTopic = 7,
    Unavailable = 8,
}

impl StatusCode {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_success(self) -> bool {
        self == StatusCode::Success
    }
}

impl From<StatusCode> for u8 {
    fn from(status: StatusCode) -> Self {
        status.code()
    }
}

impl TryFrom<u8> for StatusCode {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => StatusCode::Success,
            1 => StatusCode::PartialDeliveryFailure,
            2 => StatusCode::DeliveryFailed,
            3 => StatusCode::InvalidArgument,
            4 => StatusCode::MalformedCommand,
            5 => StatusCode::ConnectionClosed,
            6 => StatusCode::Backpressure,
            7 => StatusCode::UnknownTopic,
            8 => StatusCode::Unavailable,
            other => return Err(format!("unknown status code {other}")),
        })
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::Success => "success",
            StatusCode::PartialDeliveryFailure => "partial delivery failure",
            StatusCode::DeliveryFailed => "delivery failed",
            StatusCode::InvalidArgument => "invalid argument",
            StatusCode::MalformedCommand => "malformed command",
            StatusCode::ConnectionClosed => "connection closed",
            StatusCode::Backpressure => "backpressure",
            StatusCode::UnknownTopic => "unknown topic",
            StatusCode::Unavailable => "unavailable",
        };
        write!(f, "{} ({})", self.code(), name)
    }
}

/// Outcome of one fan-out.
///
/// Every subscriber present when the publish started lands in exactly one of
/// `delivered`, `dropped` (its outbox was full) or `disconnected`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: Vec<ConnectionId>,
    pub dropped: Vec<ConnectionId>,
    pub disconnected: Vec<ConnectionId>,
}

impl DeliveryReport {
    pub fn failed(&self) -> usize {
        self.dropped.len() + self.disconnected.len()
    }

    /// Aggregate status recorded on the topic.
    pub fn status(&self) -> StatusCode {
        let failed = self.failed();
        if failed == 0 {
            StatusCode::Success
        } else if failed == self.attempted {
            StatusCode::DeliveryFailed
        } else {
            StatusCode::PartialDeliveryFailure
        }
    }

    /// Status reported back to the publisher: a publish only fails when no
    /// subscriber at all could be reached.
    pub fn publisher_status(&self) -> StatusCode {
        match self.status() {
            StatusCode::PartialDeliveryFailure => StatusCode::Success,
            other => other,
        }
    }

    pub fn outcome(&self) -> Result<(), Error> {
        match self.failed() {
            0 => Ok(()),
            failed => Err(Error::PartialDeliveryFailure {
                failed,
                attempted: self.attempted,
            }),
        }
    }
}

/// Snapshot of a topic's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicStatus {
    pub name: String,
    pub subscriber_count: usize,
    pub last_timestamp: Option<i64>,
    pub last_status: Option<StatusCode>,
    pub message_count: u64,
}

/// One entry of a status batch. Unknown names never abort the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum TopicStatusEntry {
    #[serde(rename = "known")]
    Known(TopicStatus),
    #[serde(rename = "unknown")]
    Unknown { name: String },
}

impl TopicStatusEntry {
    pub fn name(&self) -> &str {
        match self {
            TopicStatusEntry::Known(status) => &status.name,
            TopicStatusEntry::Unknown { name } => name,
        }
    }
}
