//! The `client` module holds both ends of a client connection.
//!
//! - `handle`: the broker's view of a connected client, `ConnectionHandle`
//!   for pushing frames and `CommandReader` for reading its command.
//! - `pubsub_client`: the command-line client that connects to a broker and
//!   issues exactly one command.

pub mod handle;
pub mod pubsub_client;

pub use handle::{CommandReader, ConnectionHandle, ConnectionId};
pub use pubsub_client::{PubSubClient, PublishAck, Subscription};

#[cfg(test)]
mod tests;
