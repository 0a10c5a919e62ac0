use super::handle::{ConnectionHandle, ConnectionId};
use crate::broker::message::{Message, StatusCode};
use crate::config::BrokerSettings;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::utils::Error;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

fn peer() -> SocketAddrV4 {
    SocketAddrV4::new(Ipv4Addr::LOCALHOST, 40000)
}

/// Accepted server-side stream plus the client end connected to it.
async fn socket_pair() -> (TcpStream, SocketAddrV4, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).await.unwrap();
    let (server, peer) = listener.accept().await.unwrap();
    let SocketAddr::V4(peer) = peer else {
        panic!("expected an IPv4 peer");
    };
    (server, peer, client)
}

#[test]
fn test_connection_ids_are_unique() {
    let a = ConnectionId::new();
    let b = ConnectionId::new();
    assert_ne!(a, b);
    assert!(a.to_string().starts_with("client-"));
}

#[test]
fn test_send_reports_status_instead_of_failing() {
    let (tx, mut rx) = mpsc::channel(1);
    let handle = ConnectionHandle::new(peer(), tx);
    assert!(handle.is_alive());
    assert_eq!(handle.peer(), peer());

    let message = Message::new("t", "one");
    assert_eq!(handle.deliver(&message), StatusCode::Success);
    assert_eq!(handle.deliver(&message), StatusCode::Backpressure);
    assert!(matches!(rx.try_recv(), Ok(ServerMessage::Message { .. })));

    drop(rx);
    assert_eq!(handle.deliver(&message), StatusCode::ConnectionClosed);
    assert!(!handle.is_alive());
}

#[test]
fn test_close_is_idempotent() {
    let (tx, _rx) = mpsc::channel(4);
    let handle = ConnectionHandle::new(peer(), tx);
    let clone = handle.clone();

    handle.close();
    handle.close();

    assert!(!clone.is_alive());
    assert_eq!(
        clone.send(ServerMessage::TopicList { topics: vec![] }),
        StatusCode::ConnectionClosed
    );
}

#[tokio::test]
async fn test_open_writes_line_frames() {
    let (server, peer, client) = socket_pair().await;
    let (handle, _reader) = ConnectionHandle::open(server, peer, &BrokerSettings::default());

    handle.deliver(&Message {
        topic: "weather".to_string(),
        payload: "rain\nand wind".to_string(),
        timestamp: 42,
    });
    handle.close();

    let mut lines = BufReader::new(client).lines();
    let line = lines.next_line().await.unwrap().expect("one frame");
    let frame = ServerMessage::decode(&line).unwrap();
    assert_eq!(
        frame,
        ServerMessage::Message {
            topic: "weather".to_string(),
            payload: "rain\nand wind".to_string(),
            timestamp: 42,
        }
    );

    // close flushed the queue, then shut the write half down
    assert!(lines.next_line().await.unwrap().is_none());
}

#[tokio::test]
async fn test_receive_command_parses_one_frame() {
    let (server, peer, mut client) = socket_pair().await;
    let (_handle, mut reader) = ConnectionHandle::open(server, peer, &BrokerSettings::default());

    client
        .write_all(b"\n{\"type\":\"publish\",\"topic\":\"t\",\"payload\":\"p\"}\n")
        .await
        .unwrap();

    let command = reader.receive_command().await.unwrap();
    assert_eq!(
        command,
        ClientMessage::Publish {
            topic: "t".to_string(),
            payload: "p".to_string(),
        }
    );
}

#[tokio::test]
async fn test_receive_command_reports_malformed_input() {
    let (server, peer, mut client) = socket_pair().await;
    let (_handle, mut reader) = ConnectionHandle::open(server, peer, &BrokerSettings::default());

    client.write_all(b"{\"type\":\"unsubscribe\"}\n").await.unwrap();
    assert!(matches!(
        reader.receive_command().await,
        Err(Error::MalformedCommand(_))
    ));
}

#[tokio::test]
async fn test_receive_command_rejects_oversized_frame() {
    let settings = BrokerSettings {
        max_frame_bytes: 16,
        ..BrokerSettings::default()
    };
    let (server, peer, mut client) = socket_pair().await;
    let (_handle, mut reader) = ConnectionHandle::open(server, peer, &settings);

    client
        .write_all(b"{\"type\":\"list_topics\",\"padding\":\"xxxxxxxxxxxx\"}\n")
        .await
        .unwrap();
    assert!(matches!(
        reader.receive_command().await,
        Err(Error::MalformedCommand(_))
    ));
}

#[tokio::test]
async fn test_receive_command_reports_closed_connection() {
    let (server, peer, client) = socket_pair().await;
    let (_handle, mut reader) = ConnectionHandle::open(server, peer, &BrokerSettings::default());

    drop(client);
    assert!(matches!(
        reader.receive_command().await,
        Err(Error::ConnectionClosed)
    ));
}

#[tokio::test]
async fn test_wait_closed_returns_when_peer_disconnects() {
    let (server, peer, mut client) = socket_pair().await;
    let (handle, mut reader) = ConnectionHandle::open(server, peer, &BrokerSettings::default());

    client.write_all(b"ignored\n").await.unwrap();
    drop(client);

    tokio::time::timeout(Duration::from_secs(2), reader.wait_closed())
        .await
        .expect("wait_closed should return after disconnect");
    assert!(!handle.is_alive());
    assert_eq!(
        handle.deliver(&Message::new("t", "late")),
        StatusCode::ConnectionClosed
    );
}

#[tokio::test]
async fn test_wait_closed_returns_when_handle_closes() {
    let (server, peer, _client) = socket_pair().await;
    let (handle, mut reader) = ConnectionHandle::open(server, peer, &BrokerSettings::default());

    handle.close();
    tokio::time::timeout(Duration::from_secs(2), reader.wait_closed())
        .await
        .expect("wait_closed should return after close");
}
