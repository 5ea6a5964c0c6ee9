//! Integration tests for the connection lifecycle over real TCP sockets.
//!
//! Verifies:
//! 1. `connect` writes PASS, NICK, USER, JOIN in that order.
//! 2. A refused connection surfaces `ConnectionFailure` and leaves the
//!    session reusable.
//! 3. `connect` twice is `AlreadyConnected`; `disconnect` without a
//!    connection is `NotConnected`.
//! 4. `disconnect` sends PART, closes the socket, and a following `connect`
//!    performs a fresh handshake.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use tccli::session::{ConnectParams, Session, SessionError};
use tccli::transport::tcp::TcpConnector;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Server side of one accepted client connection.
struct Peer {
    lines: BufReader<OwnedReadHalf>,
    _out: OwnedWriteHalf,
}

impl Peer {
    async fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = tokio::time::timeout(STEP_TIMEOUT, listener.accept())
            .await
            .expect("accept timed out")
            .unwrap();
        let (read, out) = stream.into_split();
        Self {
            lines: BufReader::new(read),
            _out: out,
        }
    }

    /// Next raw line from the client, terminator included; "" at EOF.
    async fn recv(&mut self) -> String {
        let mut line = String::new();
        tokio::time::timeout(STEP_TIMEOUT, self.lines.read_line(&mut line))
            .await
            .expect("read timed out")
            .unwrap();
        line
    }

    async fn expect_handshake(&mut self, user: &str, credential: &str, room: &str) {
        assert_eq!(self.recv().await, format!("PASS {credential}\r\n"));
        assert_eq!(self.recv().await, format!("NICK {user}\r\n"));
        assert_eq!(self.recv().await, format!("USER {user} 127.0.0.1 : {user}\r\n"));
        assert_eq!(self.recv().await, format!("JOIN {room}\r\n"));
    }
}

async fn listen() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn params(port: u16) -> ConnectParams {
    ConnectParams::new("127.0.0.1", port, "bob", "oauth:secret", "#room")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn handshake_commands_arrive_in_order() {
    let (listener, port) = listen().await;
    let session = Session::with_connector(TcpConnector);

    session.connect(params(port)).await.unwrap();
    let mut peer = Peer::accept(&listener).await;
    peer.expect_handshake("bob", "oauth:secret", "#room").await;

    // Messages sent after connect returns follow the handshake.
    session.send_message("first").await.unwrap();
    assert_eq!(peer.recv().await, "PRIVMSG #room :first\r\n");

    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn refused_connect_is_connection_failure_and_session_stays_usable() {
    // Reserve a port, then close it so the first attempt is refused.
    let (listener, port) = listen().await;
    drop(listener);

    let session = Session::with_connector(TcpConnector);
    let result = session.connect(params(port)).await;
    assert!(matches!(
        result,
        Err(SessionError::ConnectionFailure { port: p, .. }) if p == port
    ));
    assert!(!session.is_connected());
    assert!(matches!(
        session.disconnect().await,
        Err(SessionError::NotConnected)
    ));

    let (listener, port) = listen().await;
    session.connect(params(port)).await.unwrap();
    let mut peer = Peer::accept(&listener).await;
    peer.expect_handshake("bob", "oauth:secret", "#room").await;
    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn unresolvable_host_is_connection_failure() {
    let session = Session::with_connector(TcpConnector);
    let result = session
        .connect(ConnectParams::new(
            "host.invalid",
            6697,
            "bob",
            "oauth:secret",
            "#room",
        ))
        .await;
    assert!(matches!(result, Err(SessionError::ConnectionFailure { .. })));
    assert!(!session.is_connected());
}

#[tokio::test]
async fn connect_twice_is_already_connected() {
    let (listener, port) = listen().await;
    let session = Session::with_connector(TcpConnector);

    session.connect(params(port)).await.unwrap();
    let _peer = Peer::accept(&listener).await;

    assert!(matches!(
        session.connect(params(port)).await,
        Err(SessionError::AlreadyConnected)
    ));
    assert!(session.is_connected());
    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn disconnect_without_connect_is_not_connected() {
    let session = Session::with_connector(TcpConnector);
    assert!(matches!(
        session.disconnect().await,
        Err(SessionError::NotConnected)
    ));
}

#[tokio::test]
async fn disconnect_then_connect_performs_fresh_handshake() {
    let (listener, port) = listen().await;
    let session = Session::with_connector(TcpConnector);

    session.connect(params(port)).await.unwrap();
    let mut first = Peer::accept(&listener).await;
    first.expect_handshake("bob", "oauth:secret", "#room").await;

    session.disconnect().await.unwrap();
    assert!(!session.is_connected());
    assert_eq!(first.recv().await, "PART #room\r\n");
    assert_eq!(first.recv().await, "", "socket should be closed after PART");

    assert!(matches!(
        session.disconnect().await,
        Err(SessionError::NotConnected)
    ));

    session.connect(params(port)).await.unwrap();
    let mut second = Peer::accept(&listener).await;
    second.expect_handshake("bob", "oauth:secret", "#room").await;
    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn send_after_disconnect_is_not_connected() {
    let (listener, port) = listen().await;
    let session = Session::with_connector(TcpConnector);

    session.connect(params(port)).await.unwrap();
    let _peer = Peer::accept(&listener).await;
    session.disconnect().await.unwrap();

    assert!(matches!(
        session.send_message("too late").await,
        Err(SessionError::NotConnected)
    ));
}
