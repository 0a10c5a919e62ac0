//! The broker core: topics, the topic registry, the live connection table and
//! the `Broker` facade that routes requests between them.

pub mod connections;
pub mod engine;
pub mod message;
pub mod registry;
pub mod topic;

pub use engine::Broker;
