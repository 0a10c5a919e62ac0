//! Broker-side connection handle
//!
//! Every accepted socket is split in two. The write half is owned by a writer
//! task that drains a bounded outbox; the broker only ever enqueues into that
//! outbox through a `ConnectionHandle`, so sending never blocks. The read half
//! becomes a `CommandReader`, driven by the connection's own task.
//!
//! Frames are single-line JSON objects terminated by `\n`.

use std::fmt;
use std::net::SocketAddrV4;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::broker::message::{Message, StatusCode};
use crate::config::BrokerSettings;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::utils::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Sending side of one client connection.
///
/// Cheap to clone; all clones share the same outbox and close state.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    peer: SocketAddrV4,
    outbox: mpsc::Sender<ServerMessage>,
    closed: CancellationToken,
}

impl ConnectionHandle {
    /// Create a handle around an existing outbox. Whoever holds the receiving
    /// end is responsible for writing frames out.
    pub fn new(peer: SocketAddrV4, outbox: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id: ConnectionId::new(),
            peer,
            outbox,
            closed: CancellationToken::new(),
        }
    }

    /// Take ownership of an accepted socket and spawn its writer task.
    pub fn open(
        stream: TcpStream,
        peer: SocketAddrV4,
        settings: &BrokerSettings,
    ) -> (Self, CommandReader) {
        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::channel(settings.subscriber_queue_capacity.max(1));
        let handle = Self::new(peer, tx);

        tokio::spawn(write_loop(
            handle.id,
            write_half,
            rx,
            handle.closed.clone(),
        ));

        let reader = CommandReader {
            id: handle.id,
            frames: FramedRead::new(
                read_half,
                LinesCodec::new_with_max_length(settings.max_frame_bytes),
            ),
            closed: handle.closed.clone(),
        };

        (handle, reader)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddrV4 {
        self.peer
    }

    /// Queue one frame without waiting.
    ///
    /// `Backpressure` means the outbox is full and the frame was dropped;
    /// `ConnectionClosed` means nothing will ever be written again.
    pub fn send(&self, message: ServerMessage) -> StatusCode {
        if self.closed.is_cancelled() {
            return StatusCode::ConnectionClosed;
        }
        match self.outbox.try_send(message) {
            Ok(()) => StatusCode::Success,
            Err(TrySendError::Full(_)) => StatusCode::Backpressure,
            Err(TrySendError::Closed(_)) => StatusCode::ConnectionClosed,
        }
    }

    /// Push a published message to this subscriber.
    pub fn deliver(&self, message: &Message) -> StatusCode {
        self.send(ServerMessage::from(message.clone()))
    }

    pub fn is_alive(&self) -> bool {
        !self.closed.is_cancelled() && !self.outbox.is_closed()
    }

    /// Stop accepting frames. Frames already queued are still written.
    pub fn close(&self) {
        self.closed.cancel();
    }
}

/// Receiving side of one client connection.
#[derive(Debug)]
pub struct CommandReader {
    id: ConnectionId,
    frames: FramedRead<OwnedReadHalf, LinesCodec>,
    closed: CancellationToken,
}

impl CommandReader {
    /// Read exactly one command.
    pub async fn receive_command(&mut self) -> Result<ClientMessage> {
        loop {
            let frame = tokio::select! {
                frame = self.frames.next() => frame,
                _ = self.closed.cancelled() => return Err(Error::ConnectionClosed),
            };

            match frame {
                None => return Err(Error::ConnectionClosed),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => return ClientMessage::decode(&line),
            }
        }
    }

    /// Park until the peer goes away or the handle is closed. Anything the
    /// peer sends in the meantime is discarded.
    pub async fn wait_closed(&mut self) {
        loop {
            tokio::select! {
                frame = self.frames.next() => match frame {
                    Some(Ok(_)) => trace!(client = %self.id, "ignoring input on subscribed connection"),
                    Some(Err(e)) => {
                        debug!(client = %self.id, error = %e, "read failed");
                        break;
                    }
                    None => break,
                },
                _ = self.closed.cancelled() => break,
            }
        }
        self.closed.cancel();
    }
}

async fn write_loop(
    id: ConnectionId,
    write_half: OwnedWriteHalf,
    mut outbox: mpsc::Receiver<ServerMessage>,
    closed: CancellationToken,
) {
    let mut frames = FramedWrite::new(write_half, LinesCodec::new());

    loop {
        // queued frames go out before a pending close is honoured
        let message = tokio::select! {
            biased;
            message = outbox.recv() => match message {
                Some(message) => message,
                None => break,
            },
            _ = closed.cancelled() => break,
        };

        let line = match message.encode() {
            Ok(line) => line,
            Err(e) => {
                warn!(client = %id, error = %e, "failed to encode frame");
                continue;
            }
        };

        if let Err(e) = frames.send(line).await {
            debug!(client = %id, error = %e, "write failed");
            break;
        }
    }

    closed.cancel();
    outbox.close();
    let _ = SinkExt::<String>::close(&mut frames).await;
    debug!(client = %id, "send loop closed");
}
