//! Integration tests for inbound dispatch and outbound sends over TCP.
//!
//! Verifies:
//! 1. A room chat line reaches the handler unchanged and renders as `nick: text`.
//! 2. Keep-alive probes get exactly one matching PONG and are never dispatched.
//! 3. Server notices and self-echo lines are never dispatched.
//! 4. Lines split across TCP writes are reassembled.
//! 5. Concurrent senders produce complete, non-interleaved commands.
//! 6. No handler runs after `disconnect` returns.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;

use tccli::display::LineFormatter;
use tccli::session::{ConnectParams, Session};
use tccli::transport::tcp::TcpConnector;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

struct Peer {
    lines: BufReader<OwnedReadHalf>,
    out: OwnedWriteHalf,
}

impl Peer {
    async fn recv(&mut self) -> String {
        let mut line = String::new();
        tokio::time::timeout(STEP_TIMEOUT, self.lines.read_line(&mut line))
            .await
            .expect("read timed out")
            .unwrap();
        line
    }

    async fn send(&mut self, bytes: &[u8]) {
        self.out.write_all(bytes).await.unwrap();
        self.out.flush().await.unwrap();
    }
}

/// A connected session, the server side of its socket with the handshake
/// already consumed, and the stream of dispatched lines.
async fn connected(
    user: &str,
) -> (
    Arc<Session<TcpConnector>>,
    Peer,
    mpsc::UnboundedReceiver<String>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let session = Arc::new(Session::with_connector(TcpConnector));
    let (tx, rx) = mpsc::unbounded_channel();
    session.add_handler(move |line| {
        let _ = tx.send(line.to_owned());
    });

    let params = ConnectParams::new("127.0.0.1", port, user, "oauth:secret", "#room")
        .with_server_name("tmi.example");
    session.connect(params).await.unwrap();

    let (stream, _) = listener.accept().await.unwrap();
    let (read, out) = stream.into_split();
    let mut peer = Peer {
        lines: BufReader::new(read),
        out,
    };
    for _ in 0..4 {
        peer.recv().await;
    }
    (session, peer, rx)
}

async fn next_dispatched(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(STEP_TIMEOUT, rx.recv())
        .await
        .expect("no line dispatched")
        .unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chat_line_is_dispatched_and_rendered() {
    let (session, mut peer, mut rx) = connected("bob").await;

    peer.send(b":alice!a@a PRIVMSG #room :hi\r\n").await;
    let line = next_dispatched(&mut rx).await;
    assert_eq!(line, ":alice!a@a PRIVMSG #room :hi");

    let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
    assert_eq!(
        LineFormatter::new("#room", false).render_at(&line, noon),
        "alice: hi"
    );

    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn ping_gets_one_pong_and_no_dispatch() {
    let (session, mut peer, mut rx) = connected("bob").await;

    peer.send(b"PING :tmi.example\r\n").await;
    assert_eq!(peer.recv().await, "PONG :tmi.example\r\n");

    // A marker line sent afterwards is the first thing handlers see.
    peer.send(b":alice!a@a PRIVMSG #room :marker\r\n").await;
    assert_eq!(
        next_dispatched(&mut rx).await,
        ":alice!a@a PRIVMSG #room :marker"
    );

    session.send_message("after").await.unwrap();
    // Exactly one PONG: the next thing on the wire is the chat message.
    assert_eq!(peer.recv().await, "PRIVMSG #room :after\r\n");

    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn housekeeping_and_self_echo_are_never_dispatched() {
    let (session, mut peer, mut rx) = connected("Bob").await;

    peer.send(
        b":tmi.example 001 bob :Welcome, GLHF!\r\n\
          :tmi.example 376 bob :>\r\n\
          :bob.tmi.example 353 bob = #room :bob\r\n\
          :bob!bob@bob.tmi.example JOIN #room\r\n\
          :bob!bob@bob.tmi.example PRIVMSG #room :my own words\r\n\
          :carol!c@c PRIVMSG #room :visible\r\n",
    )
    .await;

    assert_eq!(
        next_dispatched(&mut rx).await,
        ":carol!c@c PRIVMSG #room :visible"
    );
    session.disconnect().await.unwrap();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn lines_split_across_writes_are_reassembled() {
    let (session, mut peer, mut rx) = connected("bob").await;

    peer.send(b":alice!a@a PRIVMSG #room :par").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    peer.send(b"tial\r").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    peer.send(b"\n:alice!a@a PRIVMSG #room :second\r\n").await;

    assert_eq!(
        next_dispatched(&mut rx).await,
        ":alice!a@a PRIVMSG #room :partial"
    );
    assert_eq!(
        next_dispatched(&mut rx).await,
        ":alice!a@a PRIVMSG #room :second"
    );
    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn handlers_run_in_registration_order() {
    let (session, mut peer, mut rx) = connected("bob").await;

    let (order_tx, mut order_rx) = mpsc::unbounded_channel();
    for tag in ["second", "third"] {
        let order_tx = order_tx.clone();
        session.add_handler(move |_| {
            let _ = order_tx.send(tag);
        });
    }

    peer.send(b":alice!a@a PRIVMSG #room :hi\r\n").await;
    next_dispatched(&mut rx).await;
    assert_eq!(order_rx.recv().await, Some("second"));
    assert_eq!(order_rx.recv().await, Some("third"));

    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn concurrent_senders_do_not_interleave() {
    const SENDERS: usize = 16;
    // Long enough that each command needs several socket writes.
    let filler = "x".repeat(8 * 1024);

    let (session, mut peer, _rx) = connected("bob").await;

    let mut tasks = Vec::new();
    for i in 0..SENDERS {
        let session = Arc::clone(&session);
        let text = format!("sender-{i}-{filler}");
        tasks.push(tokio::spawn(async move {
            session.send_message(&text).await.unwrap();
        }));
    }

    let mut expected: HashSet<String> = (0..SENDERS)
        .map(|i| format!("PRIVMSG #room :sender-{i}-{filler}\r\n"))
        .collect();
    for _ in 0..SENDERS {
        let line = peer.recv().await;
        assert!(
            expected.remove(&line),
            "unexpected or interleaved command of {} bytes",
            line.len()
        );
    }
    assert!(expected.is_empty());

    for task in tasks {
        task.await.unwrap();
    }
    session.disconnect().await.unwrap();
}

#[tokio::test]
async fn nothing_is_dispatched_after_disconnect() {
    let (session, mut peer, mut rx) = connected("bob").await;

    session.disconnect().await.unwrap();
    assert!(!session.is_connected());
    assert_eq!(peer.recv().await, "PART #room\r\n");

    // The client may already have closed the socket; either way nothing
    // written now may reach a handler.
    let _ = peer.out.write_all(b":alice!a@a PRIVMSG #room :late\r\n").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn wait_closed_resolves_when_server_hangs_up() {
    let (session, peer, _rx) = connected("bob").await;

    drop(peer);
    tokio::time::timeout(STEP_TIMEOUT, session.wait_closed())
        .await
        .expect("read loop did not stop");
    // The connection stays registered until disconnect releases it.
    assert!(session.is_connected());
    let _ = session.disconnect().await;
    assert!(!session.is_connected());
}
