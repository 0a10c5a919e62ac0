//! Broker engine
//!
//! This module contains the in-memory broker responsible for:
//! - admitting connections into the `ConnectionTable`
//! - managing topics and subscriber sets through the `TopicRegistry`
//! - fanning published messages out to subscribers
//! - evicting subscribers whose connection is gone
//! - answering list and status queries
//!
//! Concurrency and usage notes:
//! - Every method takes `&self`; share the broker as `Arc<Broker>`.
//! - No method awaits. Fan-out only enqueues into per-connection outboxes, so
//!   a slow subscriber never stalls a publisher.

use tracing::{debug, info, warn};

use crate::broker::connections::ConnectionTable;
use crate::broker::message::{DeliveryReport, Message, TopicStatus, TopicStatusEntry};
use crate::broker::registry::TopicRegistry;
use crate::broker::topic::SubscriberId;
use crate::client::ConnectionHandle;
use crate::config::BrokerSettings;
use crate::utils::{Error, Result};

#[derive(Debug)]
pub struct Broker {
    registry: TopicRegistry,
    connections: ConnectionTable,
    settings: BrokerSettings,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(BrokerSettings::default())
    }
}

impl Broker {
    pub fn new(settings: BrokerSettings) -> Self {
        Self {
            registry: TopicRegistry::new(),
            connections: ConnectionTable::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    pub fn connections(&self) -> &ConnectionTable {
        &self.connections
    }

    /// Admit a freshly accepted connection.
    pub fn register_client(&self, handle: ConnectionHandle) -> Result<()> {
        if !self
            .connections
            .try_insert(handle, self.settings.max_connections)
        {
            return Err(Error::ConnectionLimit(self.settings.max_connections));
        }
        Ok(())
    }

    /// Check a subscribe request without touching any topic.
    pub fn validate_subscription(&self, topics: &[String]) -> Result<()> {
        if topics.is_empty() {
            return Err(Error::InvalidArgument(
                "subscribe needs at least one topic".to_string(),
            ));
        }
        topics
            .iter()
            .try_for_each(|name| self.validate_topic_name(name))
    }

    /// Subscribe `subscriber` to every topic in `topics`, creating them as needed.
    ///
    /// All names are validated before any subscription is made.
    pub fn subscribe(&self, topics: &[String], subscriber: SubscriberId) -> Result<()> {
        self.validate_subscription(topics)?;

        for name in topics {
            let topic = self.registry.get_or_create(name);
            if topic.lock().add_subscriber(subscriber) {
                info!(%subscriber, topic = %name, "subscribed");
            } else {
                debug!(%subscriber, topic = %name, "already subscribed");
            }
        }
        Ok(())
    }

    /// Publish `payload` to `topic` and evict subscribers found disconnected.
    pub fn publish(&self, topic: &str, payload: &str) -> Result<DeliveryReport> {
        self.validate_topic_name(topic)?;
        if payload.is_empty() {
            return Err(Error::InvalidArgument(
                "payload must not be empty".to_string(),
            ));
        }

        let message = Message::new(topic, payload);
        let report = {
            let shared = self.registry.get_or_create(topic);
            let mut guard = shared.lock();
            guard.publish(&message, &self.connections)
        };

        for id in &report.disconnected {
            self.cleanup_client(id);
        }

        match report.outcome() {
            Ok(()) => debug!(
                topic = %topic,
                delivered = report.delivered.len(),
                "published"
            ),
            Err(e) => warn!(
                topic = %topic,
                dropped = report.dropped.len(),
                disconnected = report.disconnected.len(),
                "{e}"
            ),
        }

        Ok(report)
    }

    pub fn list_topics(&self) -> Vec<String> {
        self.registry.list()
    }

    pub fn topic_status_of(&self, name: &str) -> Result<TopicStatus> {
        self.registry
            .status_of(name)
            .ok_or_else(|| Error::UnknownTopic(name.to_string()))
    }

    /// Status of each requested topic, in request order.
    pub fn topic_status(&self, names: &[String]) -> Vec<TopicStatusEntry> {
        names
            .iter()
            .map(|name| match self.topic_status_of(name) {
                Ok(status) => TopicStatusEntry::Known(status),
                Err(_) => TopicStatusEntry::Unknown { name: name.clone() },
            })
            .collect()
    }

    /// Forget a connection: close it and unsubscribe it from every topic.
    /// Safe to call more than once.
    pub fn cleanup_client(&self, client_id: &SubscriberId) {
        if let Some(handle) = self.connections.remove(client_id) {
            handle.close();
        }
        let topics = self.registry.remove_subscriber_everywhere(client_id);
        debug!(client = %client_id, topics, "cleaned up client");
    }

    fn validate_topic_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "topic name must not be empty".to_string(),
            ));
        }
        if name.len() > self.settings.max_topic_name_len {
            return Err(Error::InvalidArgument(format!(
                "topic name exceeds {} bytes",
                self.settings.max_topic_name_len
            )));
        }
        if name.chars().any(char::is_control) {
            return Err(Error::InvalidArgument(format!(
                "topic name {name:?} contains control characters"
            )));
        }
        Ok(())
    }
}
