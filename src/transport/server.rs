//! TCP transport
//!
//! Accepts connections and runs one task per connection. Each connection
//! carries exactly one command:
//!
//! ```text
//! Accepted -> CommandReceived -> Subscribed     (stays open, push only)
//!                             -> OneShotHandled (reply, then close)
//! ```
//!
//! A subscribed connection is only watched for disconnect; once it goes away
//! it is removed from the connection table and from every topic.

use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::broker::Broker;
use crate::client::{ConnectionHandle, ConnectionId};
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::utils::{Error, Result};

/// Pause after a failed `accept` so resource exhaustion doesn't spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// How long a rejected connection gets to send its command before we reply.
const REJECT_LINGER: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    CommandReceived,
    Subscribed,
    OneShotHandled,
}

/// Bind `addr` and serve until the process exits.
pub async fn start_server(addr: SocketAddrV4, broker: Arc<Broker>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "broker listening");
    serve(listener, broker).await;
    Ok(())
}

/// Accept loop. Never waits on per-connection work.
pub async fn serve(listener: TcpListener, broker: Arc<Broker>) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        let SocketAddr::V4(peer) = addr else {
            warn!(%addr, "rejecting non-IPv4 peer");
            continue;
        };

        let broker = Arc::clone(&broker);
        tokio::spawn(async move {
            handle_connection(stream, peer, broker).await;
        });
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddrV4, broker: Arc<Broker>) {
    let (handle, mut reader) = ConnectionHandle::open(stream, peer, broker.settings());
    let id = handle.id();

    if let Err(e) = broker.register_client(handle.clone()) {
        warn!(client = %id, %peer, error = %e, "rejecting connection");
        // unread input would turn our close into a reset that can swallow the reply
        let _ = tokio::time::timeout(REJECT_LINGER, reader.receive_command()).await;
        handle.send(ServerMessage::from(&e));
        handle.close();
        return;
    }
    let mut state = ConnectionState::Accepted;
    debug!(client = %id, %peer, ?state, "connection accepted");

    match reader.receive_command().await {
        Ok(command) => {
            state = ConnectionState::CommandReceived;
            debug!(client = %id, command = command.name(), ?state, "command received");
            state = dispatch(&broker, &handle, command);
        }
        Err(Error::ConnectionClosed) => {
            debug!(client = %id, "closed before sending a command");
        }
        Err(e) => {
            warn!(client = %id, %peer, error = %e, "rejecting command");
            handle.send(ServerMessage::from(&e));
        }
    }

    if state == ConnectionState::Subscribed {
        reader.wait_closed().await;
        info!(client = %id, %peer, "subscriber disconnected");
    }

    broker.cleanup_client(&id);
}

/// Route one command to the broker and queue its reply.
pub(crate) fn dispatch(
    broker: &Broker,
    handle: &ConnectionHandle,
    command: ClientMessage,
) -> ConnectionState {
    let id = handle.id();

    let reply = match command {
        ClientMessage::Subscribe { topics } => match broker.validate_subscription(&topics) {
            Ok(()) => {
                // the ack must be queued before any publish can reach this outbox
                handle.send(ServerMessage::Subscribed {
                    topics: topics.clone(),
                });
                match broker.subscribe(&topics, id) {
                    Ok(()) => return ConnectionState::Subscribed,
                    Err(e) => reject(id, e),
                }
            }
            Err(e) => reject(id, e),
        },
        ClientMessage::Publish { topic, payload } => match broker.publish(&topic, &payload) {
            Ok(report) => {
                info!(client = %id, topic = %topic, status = %report.status(), "published");
                ServerMessage::PublishAck {
                    status: report.publisher_status(),
                    delivered: report.delivered.len(),
                    failed: report.failed(),
                }
            }
            Err(e) => reject(id, e),
        },
        ClientMessage::ListTopics => ServerMessage::TopicList {
            topics: broker.list_topics(),
        },
        ClientMessage::GetTopicStatus { topics } => {
            if topics.is_empty() {
                reject(
                    id,
                    Error::InvalidArgument("status query needs at least one topic".to_string()),
                )
            } else {
                ServerMessage::TopicStatus {
                    topics: broker.topic_status(&topics),
                }
            }
        }
    };

    handle.send(reply);
    ConnectionState::OneShotHandled
}

fn reject(id: ConnectionId, err: Error) -> ServerMessage {
    warn!(client = %id, error = %err, "request failed");
    ServerMessage::from(&err)
}
