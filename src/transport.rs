//! Single-client loopback TCP endpoint.
//!
//! A [`Transport`] binds `127.0.0.1:<port>` at construction, starts
//! listening on demand, and accepts exactly one peer. The accepted
//! [`Connection`] reads whole frames (partial frames stay buffered
//! between calls), writes whole frames, and can be force-cancelled
//! mid-read through the endpoint's cancellation token when the peer is
//! past cooperating.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use futures_util::future::FutureExt;
use futures_util::StreamExt;
use tokio::io::{AsyncWriteExt, Interest};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::protocol::{encode_frame, FrameCodec, Message};
use crate::{AppError, Result};

/// Loopback listening endpoint for one terminal client.
#[derive(Debug)]
pub struct Transport {
    socket: Option<TcpSocket>,
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    cancel: CancellationToken,
}

impl Transport {
    /// Bind `127.0.0.1:<port>` without listening yet.
    ///
    /// Port `0` asks the OS for an ephemeral port; [`local_addr`]
    /// reports the one actually bound. The socket carries
    /// `SO_REUSEADDR` so a follow-up session can rebind the port while
    /// the previous connection lingers in `TIME_WAIT`.
    ///
    /// [`local_addr`]: Self::local_addr
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transport` when the address is already in use
    /// or the socket cannot be created.
    pub fn bind(port: u16) -> Result<Self> {
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port));
        let socket = TcpSocket::new_v4()?;
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket: Some(socket),
            listener: None,
            local_addr,
            cancel: CancellationToken::new(),
        })
    }

    /// Begin listening with a backlog of one. This link only ever
    /// carries a single peer.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Closed` if the endpoint already listened or
    /// was closed, and `AppError::Transport` for socket errors.
    pub fn start(&mut self) -> Result<()> {
        let socket = self
            .socket
            .take()
            .ok_or_else(|| AppError::Closed("transport already started".into()))?;
        let listener = socket.listen(1)?;
        debug!(addr = %self.local_addr, "listening for terminal client");
        self.listener = Some(listener);
        Ok(())
    }

    /// Wait for the single client to connect.
    ///
    /// The listening socket is released on return regardless of
    /// outcome, so a second connection can never be accepted from the
    /// same endpoint.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConnectTimeout` when no client arrives within
    /// `timeout`, `AppError::Cancelled` when force-cancelled,
    /// `AppError::Closed` when called before [`start`](Self::start),
    /// and `AppError::Transport` for socket errors.
    pub async fn accept(&mut self, timeout: Duration) -> Result<Connection> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| AppError::Closed("transport is not listening".into()))?;

        let accepted = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(AppError::Cancelled),
            accepted = tokio::time::timeout(timeout, listener.accept()) => accepted,
        };

        match accepted {
            Ok(Ok((stream, peer))) => {
                debug!(%peer, "terminal client connected");
                Ok(Connection::new(stream, self.cancel.clone()))
            }
            Ok(Err(err)) => Err(AppError::Transport(format!("accept failed: {err}"))),
            Err(_) => Err(AppError::ConnectTimeout(format!(
                "no client within {}ms",
                timeout.as_millis()
            ))),
        }
    }

    /// Address actually bound, with the real port when `0` was asked.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Token observed by [`accept`](Self::accept) and by every read on
    /// the accepted connection.
    #[must_use]
    pub fn canceller(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Unblock any in-flight accept or read immediately. The peer may
    /// already be dead; nothing here waits for its cooperation.
    pub fn force_cancel(&self) {
        self.cancel.cancel();
    }

    /// Release the listening socket. Safe to call repeatedly; an
    /// accepted [`Connection`] closes separately when dropped.
    pub fn close(&mut self) {
        self.socket = None;
        self.listener = None;
    }
}

// ── Accepted connection ─────────────────────────────────────────────────────

/// One accepted client link carrying framed messages both ways.
///
/// Reads go through a [`FrameCodec`] so a frame split across TCP
/// segments is held in the read buffer until whole; abandoning a read
/// mid-frame loses nothing.
#[derive(Debug)]
pub struct Connection {
    framed: FramedRead<OwnedReadHalf, FrameCodec>,
    writer: Option<OwnedWriteHalf>,
    cancel: CancellationToken,
}

impl Connection {
    fn new(stream: TcpStream, cancel: CancellationToken) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            framed: FramedRead::new(read_half, FrameCodec::new()),
            writer: Some(write_half),
            cancel,
        }
    }

    /// Read the next whole frame.
    ///
    /// Suspends until a frame decodes, the peer closes the stream
    /// (`Ok(None)`), or the transport is force-cancelled. Partially
    /// received bytes stay buffered for the next call.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Cancelled` on force-cancel,
    /// `AppError::Protocol` when the peer violates the frame format,
    /// and `AppError::Transport` for socket failures.
    pub async fn read_frame(&mut self) -> Result<Option<Message>> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(AppError::Cancelled),
            frame = self.framed.next() => match frame {
                Some(result) => result.map(Some),
                None => Ok(None),
            },
        }
    }

    /// Write one whole frame.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Closed` after [`take_writer`](Self::take_writer)
    /// and `AppError::Transport` when the peer is gone.
    pub async fn write_frame(&mut self, message: Message) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| AppError::Closed("connection write half was taken".into()))?;
        write_frame_to(writer, message).await
    }

    /// Detach the write half for a dedicated writer task. Subsequent
    /// [`write_frame`](Self::write_frame) calls on the connection fail.
    pub fn take_writer(&mut self) -> Option<FrameWriter> {
        self.writer.take().map(|half| FrameWriter { half })
    }

    /// Whether inbound bytes are already buffered or readable right now.
    ///
    /// Non-blocking probe used once the peer process has exited:
    /// nothing pending means there is nothing left to drain. No bytes
    /// are consumed and no waiting happens; an error on the readiness
    /// probe counts as pending so the next read can surface it.
    #[must_use]
    pub fn data_pending(&self) -> bool {
        if !self.framed.read_buffer().is_empty() {
            return true;
        }
        self.framed
            .get_ref()
            .ready(Interest::READABLE)
            .now_or_never()
            .is_some_and(|ready| {
                ready.map_or(true, |state| state.is_readable() || state.is_read_closed())
            })
    }

    /// Shut down the write direction, signalling end-of-stream to the
    /// peer. Idempotent; errors are ignored because the peer may
    /// already be gone. The read half closes when the connection drops.
    pub async fn close(&mut self) {
        if let Some(mut half) = self.writer.take() {
            let _ = half.shutdown().await;
        }
    }
}

/// Detached write half wrapped with frame encoding.
#[derive(Debug)]
pub struct FrameWriter {
    half: OwnedWriteHalf,
}

impl FrameWriter {
    /// Write one whole frame.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transport` when the peer is gone.
    pub async fn write_frame(&mut self, message: Message) -> Result<()> {
        write_frame_to(&mut self.half, message).await
    }

    /// Signal end-of-stream to the peer. Errors are ignored because the
    /// peer may already be gone.
    pub async fn shutdown(&mut self) {
        let _ = self.half.shutdown().await;
    }
}

async fn write_frame_to(half: &mut OwnedWriteHalf, message: Message) -> Result<()> {
    let frame = encode_frame(message);
    half.write_all(&frame).await?;
    half.flush().await?;
    Ok(())
}
