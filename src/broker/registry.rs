//! Topic registry
//!
//! Maps topic names to topics. The name map has its own `RwLock`, taken for
//! writing only when a name is seen for the first time; every topic carries a
//! separate `Mutex`, so work on unrelated topics never contends.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::broker::message::TopicStatus;
use crate::broker::topic::{SubscriberId, Topic};

pub type SharedTopic = Arc<Mutex<Topic>>;

#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: RwLock<BTreeMap<String, SharedTopic>>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the topic called `name`, creating an empty one if needed.
    pub fn get_or_create(&self, name: &str) -> SharedTopic {
        if let Some(topic) = self.topics.read().get(name) {
            return Arc::clone(topic);
        }

        let mut topics = self.topics.write();
        let topic = topics.entry(name.to_string()).or_insert_with(|| {
            debug!(topic = %name, "created topic");
            Arc::new(Mutex::new(Topic::new(name)))
        });
        Arc::clone(topic)
    }

    pub fn get(&self, name: &str) -> Option<SharedTopic> {
        self.topics.read().get(name).cloned()
    }

    /// Sorted snapshot of all known topic names.
    pub fn list(&self) -> Vec<String> {
        self.topics.read().keys().cloned().collect()
    }

    /// Status of an existing topic. Does not create `name`.
    pub fn status_of(&self, name: &str) -> Option<TopicStatus> {
        self.get(name).map(|topic| topic.lock().status())
    }

    /// Drop `id` from every topic, returning how many topics it was part of.
    pub fn remove_subscriber_everywhere(&self, id: &SubscriberId) -> usize {
        let topics: Vec<SharedTopic> = self.topics.read().values().cloned().collect();
        topics
            .iter()
            .filter(|topic| topic.lock().remove_subscriber(id))
            .count()
    }

    pub fn len(&self) -> usize {
        self.topics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.read().is_empty()
    }
}
