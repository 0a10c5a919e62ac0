//! Command-line client
//!
//! `PubSubClient` opens one connection to a broker and issues exactly one
//! command. One-shot commands consume the client and return the broker's
//! answer; `subscribe` turns it into a `Subscription` that yields pushed
//! messages until the broker closes the connection.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpSocket, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::debug;

use crate::broker::message::{Message, StatusCode, TopicStatusEntry};
use crate::config::BrokerSettings;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::utils::{Error, Result};

/// Acknowledgement of a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishAck {
    pub status: StatusCode,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct PubSubClient {
    server: SocketAddrV4,
    frames: Framed<TcpStream, LinesCodec>,
}

impl PubSubClient {
    /// Connect to `server` from local port `local_port` (`0` picks any free port).
    pub async fn connect(local_port: u16, server: SocketAddrV4) -> Result<Self> {
        let socket = TcpSocket::new_v4()?;
        socket.bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, local_port)))?;
        let stream = socket
            .connect(SocketAddr::V4(server))
            .await
            .map_err(|source| Error::Connect {
                addr: server,
                source,
            })?;
        debug!(%server, local = ?stream.local_addr().ok(), "connected");

        let max_frame = BrokerSettings::default().max_frame_bytes;
        Ok(Self {
            server,
            frames: Framed::new(stream, LinesCodec::new_with_max_length(max_frame)),
        })
    }

    pub fn server(&self) -> SocketAddrV4 {
        self.server
    }

    /// Subscribe to `topics` and keep the connection for pushed messages.
    pub async fn subscribe(mut self, topics: Vec<String>) -> Result<Subscription> {
        match self.request(ClientMessage::Subscribe { topics }).await? {
            ServerMessage::Subscribed { topics } => Ok(Subscription {
                topics,
                frames: self.frames,
            }),
            other => Err(unexpected(&other)),
        }
    }

    /// Publish `payload` to `topic`. Fails if no subscriber could be reached.
    pub async fn publish(mut self, topic: String, payload: String) -> Result<PublishAck> {
        match self.request(ClientMessage::Publish { topic, payload }).await? {
            ServerMessage::PublishAck {
                status,
                delivered,
                failed,
            } if status.is_success() => Ok(PublishAck {
                status,
                delivered,
                failed,
            }),
            ServerMessage::PublishAck { status, failed, .. } => Err(Error::Rejected {
                status,
                message: format!("message could not be delivered to any of {failed} subscribers"),
            }),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn list_topics(mut self) -> Result<Vec<String>> {
        match self.request(ClientMessage::ListTopics).await? {
            ServerMessage::TopicList { topics } => Ok(topics),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn get_topic_status(mut self, topics: Vec<String>) -> Result<Vec<TopicStatusEntry>> {
        match self.request(ClientMessage::GetTopicStatus { topics }).await? {
            ServerMessage::TopicStatus { topics } => Ok(topics),
            other => Err(unexpected(&other)),
        }
    }

    async fn request(&mut self, command: ClientMessage) -> Result<ServerMessage> {
        debug!(command = command.name(), server = %self.server, "sending command");
        self.frames.send(command.encode()?).await?;
        match read_frame(&mut self.frames).await? {
            Some(ServerMessage::Error { status, message }) => {
                Err(Error::Rejected { status, message })
            }
            Some(response) => Ok(response),
            None => Err(Error::ConnectionClosed),
        }
    }
}

/// An active subscription.
#[derive(Debug)]
pub struct Subscription {
    topics: Vec<String>,
    frames: Framed<TcpStream, LinesCodec>,
}

impl Subscription {
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Next pushed message, or `None` once the broker closed the connection.
    pub async fn next_message(&mut self) -> Result<Option<Message>> {
        match read_frame(&mut self.frames).await? {
            Some(ServerMessage::Message {
                topic,
                payload,
                timestamp,
            }) => Ok(Some(Message {
                topic,
                payload,
                timestamp,
            })),
            Some(other) => Err(unexpected(&other)),
            None => Ok(None),
        }
    }
}

async fn read_frame(frames: &mut Framed<TcpStream, LinesCodec>) -> Result<Option<ServerMessage>> {
    loop {
        match frames.next().await {
            None => return Ok(None),
            Some(Err(e)) => return Err(e.into()),
            Some(Ok(line)) if line.trim().is_empty() => continue,
            Some(Ok(line)) => return ServerMessage::decode(&line).map(Some),
        }
    }
}

fn unexpected(response: &ServerMessage) -> Error {
    Error::UnexpectedResponse(format!("{response:?}"))
}
