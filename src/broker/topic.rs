//! Topic management
//!
//! A `Topic` holds the ids of its subscribers plus the bookkeeping reported by
//! status queries. Subscribers are stored as `ConnectionId`s pointing into the
//! broker's `ConnectionTable`; a topic never owns a connection.
//!
//! Concurrency note: each topic sits behind its own lock in the
//! `TopicRegistry`; callers hold that lock for the whole of `publish`.

use std::collections::HashSet;

use crate::broker::connections::ConnectionTable;
use crate::broker::message::{DeliveryReport, Message, StatusCode, TopicStatus};
use crate::client::ConnectionId;

pub type SubscriberId = ConnectionId;

#[derive(Debug, Default)]
pub struct Topic {
    pub name: String,
    pub subscribers: HashSet<SubscriberId>,
    last_timestamp: Option<i64>,
    last_status: Option<StatusCode>,
    message_count: u64,
}

impl Topic {
    /// Create a new topic with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Add a subscriber to the topic. Duplicate adds are ignored.
    pub fn add_subscriber(&mut self, id: SubscriberId) -> bool {
        self.subscribers.insert(id)
    }

    /// Remove a subscriber from the topic.
    pub fn remove_subscriber(&mut self, id: &SubscriberId) -> bool {
        self.subscribers.remove(id)
    }

    /// Offer `message` to every current subscriber once.
    ///
    /// A failing subscriber does not stop the others. Failed subscribers stay
    /// in the set; the caller decides what to evict from the report.
    pub fn publish(&mut self, message: &Message, connections: &ConnectionTable) -> DeliveryReport {
        let mut report = DeliveryReport {
            attempted: self.subscribers.len(),
            ..DeliveryReport::default()
        };

        for id in &self.subscribers {
            match connections.deliver(id, message) {
                StatusCode::Success => report.delivered.push(*id),
                StatusCode::Backpressure => report.dropped.push(*id),
                _ => report.disconnected.push(*id),
            }
        }

        self.last_timestamp = Some(message.timestamp);
        self.last_status = Some(report.status());
        self.message_count += 1;

        report
    }

    pub fn status(&self) -> TopicStatus {
        TopicStatus {
            name: self.name.clone(),
            subscriber_count: self.subscribers.len(),
            last_timestamp: self.last_timestamp,
            last_status: self.last_status,
            message_count: self.message_count,
        }
    }
}
