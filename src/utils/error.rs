//! Crate-wide error type.
//!
//! Broker-side failures never abort the process: each variant maps to a wire
//! [`StatusCode`] so the dispatcher can report it to the peer and close only
//! the affected connection.

use std::io;
use std::net::SocketAddrV4;

use tokio_util::codec::LinesCodecError;

use crate::broker::message::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
    #[error("delivery failed for {failed} of {attempted} subscribers")]
    PartialDeliveryFailure { failed: usize, attempted: usize },
    #[error("malformed command: {0}")]
    MalformedCommand(String),
    #[error("connection limit of {0} reached")]
    ConnectionLimit(usize),

    // Client side
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddrV4,
        #[source]
        source: io::Error,
    },
    #[error("broker rejected request ({status}): {message}")]
    Rejected { status: StatusCode, message: String },
    #[error("unexpected response from broker: {0}")]
    UnexpectedResponse(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Status code reported to a peer when this error ends its request.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidArgument(_) | Error::Config(_) => StatusCode::InvalidArgument,
            Error::ConnectionClosed | Error::Connect { .. } | Error::Io(_) => {
                StatusCode::ConnectionClosed
            }
            Error::UnknownTopic(_) => StatusCode::UnknownTopic,
            Error::PartialDeliveryFailure { .. } => StatusCode::PartialDeliveryFailure,
            Error::MalformedCommand(_)
            | Error::UnexpectedResponse(_)
            | Error::Serialization(_) => StatusCode::MalformedCommand,
            Error::ConnectionLimit(_) => StatusCode::Unavailable,
            Error::Rejected { status, .. } => *status,
        }
    }
}

impl From<LinesCodecError> for Error {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::MaxLineLengthExceeded => {
                Error::MalformedCommand("frame exceeds maximum length".to_string())
            }
            LinesCodecError::Io(e) => Error::Io(e),
        }
    }
}
