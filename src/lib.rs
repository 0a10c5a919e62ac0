//! # tcpsub
//!
//! `tcpsub` is a minimalist, in-memory publish/subscribe broker speaking
//! line-delimited JSON over plain IPv4 TCP.
//!
//! Each connection carries exactly one command: subscribe to topics and keep
//! receiving pushed messages, publish one message, list topics, or query topic
//! status. Delivery is best-effort and at-most-once per live subscriber.
//!
//! ## Core Modules
//!
//! - `broker`: topics, the topic registry, the live connection table and the
//!   `Broker` that routes between them.
//! - `client`: the broker-side connection handle and the command-line client.
//! - `config`: loading server, broker and logging settings.
//! - `transport`: the wire protocol and the TCP accept loop.
//! - `utils`: the error type and logging bootstrap.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;
