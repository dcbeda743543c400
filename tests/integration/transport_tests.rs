//! Integration tests for the loopback transport: accept, framed
//! exchange, timeouts, cancellation, and port reuse.

use std::time::Duration;

use serial_test::serial;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use termlink::protocol::{encode_frame, Message, TerminalKind};
use termlink::transport::Transport;
use termlink::AppError;

const ACCEPT_WINDOW: Duration = Duration::from_secs(1);

/// Bind an ephemeral port and start listening.
fn listening_transport() -> Transport {
    let mut transport = Transport::bind(0).expect("bind ephemeral port");
    transport.start().expect("listen");
    transport
}

/// A client connect completes the accept, and frames flow both ways
/// byte-exact.
#[tokio::test]
async fn accept_then_exchange_frames() {
    let mut transport = listening_transport();
    let addr = transport.local_addr();

    let client = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        let mut greeting = [0u8; 12];
        stream
            .read_exact(&mut greeting)
            .await
            .expect("read greeting frame");
        stream
            .write_all(&encode_frame(Message::PlaySound { sound_id: 7 }))
            .await
            .expect("write response frame");
        greeting
    });

    let mut conn = transport.accept(ACCEPT_WINDOW).await.expect("accept");
    let greeting = Message::Initialize {
        terminal: TerminalKind::Shell,
    };
    conn.write_frame(greeting).await.expect("write greeting");

    let received = conn
        .read_frame()
        .await
        .expect("read frame")
        .expect("a whole frame");
    assert_eq!(received, Message::PlaySound { sound_id: 7 });

    let client_bytes = client.await.expect("client task");
    assert_eq!(
        client_bytes.as_slice(),
        encode_frame(greeting).as_ref(),
        "the peer must see the exact encoded frame"
    );
}

/// Without a client the accept lapses into a connect timeout.
#[tokio::test]
async fn accept_lapses_without_client() {
    let mut transport = listening_transport();

    let started = tokio::time::Instant::now();
    let result = transport.accept(Duration::from_millis(200)).await;
    let elapsed = started.elapsed();

    assert!(
        matches!(result, Err(AppError::ConnectTimeout(_))),
        "got: {result:?}"
    );
    assert!(elapsed >= Duration::from_millis(200), "window must elapse");
    assert!(elapsed < Duration::from_secs(2), "must not wait much longer");
}

/// Force-cancel unblocks a pending accept well before its window.
#[tokio::test]
async fn force_cancel_unblocks_accept() {
    let mut transport = listening_transport();
    let token = transport.canceller();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let started = tokio::time::Instant::now();
    let result = transport.accept(Duration::from_secs(5)).await;

    assert!(matches!(result, Err(AppError::Cancelled)), "got: {result:?}");
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "cancel must cut the wait short"
    );
    canceller.await.expect("canceller task");
}

/// Force-cancel unblocks a pending read on the accepted connection.
#[tokio::test]
async fn force_cancel_unblocks_read() {
    let mut transport = listening_transport();
    let addr = transport.local_addr();

    let client = tokio::spawn(async move {
        let stream = TcpStream::connect(addr).await.expect("connect");
        // Keep the socket open without sending anything.
        tokio::time::sleep(Duration::from_secs(2)).await;
        drop(stream);
    });

    let mut conn = transport.accept(ACCEPT_WINDOW).await.expect("accept");
    let token = transport.canceller();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let result = conn.read_frame().await;
    assert!(matches!(result, Err(AppError::Cancelled)), "got: {result:?}");

    canceller.await.expect("canceller task");
    client.abort();
}

/// The peer closing its end surfaces as a clean end-of-stream.
#[tokio::test]
async fn peer_close_reads_as_end_of_stream() {
    let mut transport = listening_transport();
    let addr = transport.local_addr();

    let client = tokio::spawn(async move {
        let stream = TcpStream::connect(addr).await.expect("connect");
        drop(stream);
    });

    let mut conn = transport.accept(ACCEPT_WINDOW).await.expect("accept");
    let result = conn.read_frame().await.expect("eof is not an error");
    assert!(result.is_none(), "end of stream must read as None");

    client.await.expect("client task");
}

/// Only one client is ever accepted per transport.
#[tokio::test]
async fn second_accept_is_refused() {
    let mut transport = listening_transport();
    let addr = transport.local_addr();

    let client = tokio::spawn(async move {
        let _stream = TcpStream::connect(addr).await.expect("connect");
        tokio::time::sleep(Duration::from_millis(200)).await;
    });

    let _conn = transport.accept(ACCEPT_WINDOW).await.expect("first accept");
    let result = transport.accept(ACCEPT_WINDOW).await;

    assert!(
        matches!(result, Err(AppError::Closed(_))),
        "second accept must be refused, got: {result:?}"
    );
    client.await.expect("client task");
}

/// The readiness probe reports buffered bytes without consuming them.
#[tokio::test]
async fn data_pending_tracks_inbound_bytes() {
    let mut transport = listening_transport();
    let addr = transport.local_addr();

    let (hold_tx, hold_rx) = tokio::sync::oneshot::channel::<()>();
    let client = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        // A partial frame: three header bytes only.
        stream.write_all(&[1, 0, 0]).await.expect("write partial");
        let _ = hold_rx.await;
    });

    let conn = transport.accept(ACCEPT_WINDOW).await.expect("accept");
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(
        conn.data_pending(),
        "bytes sitting in the socket must read as pending"
    );

    let _ = hold_tx.send(());
    client.await.expect("client task");
}

/// A fresh transport with no traffic reports nothing pending.
#[tokio::test]
async fn data_pending_is_quiet_without_traffic() {
    let mut transport = listening_transport();
    let addr = transport.local_addr();

    let (hold_tx, hold_rx) = tokio::sync::oneshot::channel::<()>();
    let client = tokio::spawn(async move {
        let _stream = TcpStream::connect(addr).await.expect("connect");
        let _ = hold_rx.await;
    });

    let conn = transport.accept(ACCEPT_WINDOW).await.expect("accept");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!conn.data_pending(), "no traffic means nothing pending");

    let _ = hold_tx.send(());
    client.await.expect("client task");
}

/// The fixed default port can be rebound immediately after a session's
/// connection closed, while the old socket pair still lingers.
#[tokio::test]
#[serial]
async fn fixed_port_rebinds_after_close() {
    let port = 41987;
    let mut transport = Transport::bind(port).expect("bind default port");
    transport.start().expect("listen");

    let (closed_tx, closed_rx) = tokio::sync::oneshot::channel::<()>();
    let client = tokio::spawn(async move {
        let mut stream = TcpStream::connect(("127.0.0.1", port))
            .await
            .expect("connect");
        let mut byte = [0u8; 1];
        // Wait for the host side to close first, then close after it.
        let _ = stream.read(&mut byte).await;
        drop(stream);
        let _ = closed_tx.send(());
    });

    let conn = transport.accept(ACCEPT_WINDOW).await.expect("accept");
    drop(conn);
    transport.close();
    drop(transport);

    closed_rx.await.expect("client must observe the close");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let rebound = Transport::bind(port);
    assert!(
        rebound.is_ok(),
        "rebinding the fixed port must succeed, got: {:?}",
        rebound.err()
    );
    client.await.expect("client task");
}
