//! The `transport` module is responsible for network communication with
//! clients over plain TCP.
//!
//! It defines the line-delimited JSON protocol spoken between clients and the
//! broker, and implements the accept loop that turns each connection's command
//! into broker operations.

pub mod message;
pub mod server;

pub use message::{ClientMessage, ServerMessage};
pub use server::{serve, start_server};
