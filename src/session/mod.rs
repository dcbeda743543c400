//! Session lifecycle: one spawned terminal client, one connection, one
//! lifetime.
//!
//! [`Session::start`] binds and listens before spawning the client, so
//! the client can never connect-back faster than the listener is
//! ready, then hands everything to a background task (accept,
//! handshake, read loop). The host polls the [`Inbox`] once per update
//! tick and may [`send`](Session::send) follow-up frames,
//! [`stop`](Session::stop) the session, or just drop the handle, which
//! also stops it.
//!
//! A session is one-shot. Starting the client again after termination
//! means a fresh [`Session`]; the listening socket's `SO_REUSEADDR`
//! makes the fixed port immediately rebindable.

pub mod events;
pub mod launcher;
mod monitor;
mod reader;
mod writer;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::protocol::Message;
use crate::transport::Transport;
use crate::{AppError, Result};

pub use events::{EndReason, Inbox};
pub use launcher::{CommandPresenter, Presenter};

/// Outbound queue depth; sends block briefly if the writer falls
/// behind.
const OUTBOUND_CAPACITY: usize = 16;

/// Observable lifecycle of a session. The absence of a session is the
/// host's own idle state, not a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Child spawned and listener bound; the task has not started
    /// waiting yet.
    Starting,
    /// Waiting for the client to connect back.
    Connecting,
    /// Connected, handshake sent, frames flowing.
    Active,
    /// Ending; in-flight frames may still be delivered.
    Draining,
    /// Everything released and the termination notice queued.
    Terminated,
}

/// Handle to one running (or finished) terminal client session.
#[derive(Debug)]
pub struct Session {
    session_id: String,
    inbox: Arc<Inbox>,
    outbound_tx: mpsc::Sender<Message>,
    state_rx: watch::Receiver<SessionState>,
    stop: CancellationToken,
    cancel: CancellationToken,
    local_addr: SocketAddr,
}

impl Session {
    /// Start a session: bind and listen, spawn the client, hand off to
    /// the background task, and return at once with the handle.
    ///
    /// Connecting completes (or times out) in the background; watch the
    /// [`Inbox`] for the connected and termination notices. `handshake`
    /// is the first frame written after the client connects.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transport` when the port cannot be bound and
    /// `AppError::Launch` when the client cannot be spawned. Failures
    /// after that surface as a termination notice instead.
    pub fn start(
        config: &Config,
        presenter: Arc<dyn Presenter>,
        handshake: Message,
    ) -> Result<Self> {
        let session_id = Uuid::new_v4().to_string();
        let span = info_span!("session", %session_id);
        let _entered = span.clone().entered();

        // Listener before child: the client must never beat it.
        let mut transport = Transport::bind(config.port)?;
        transport.start()?;
        let local_addr = transport.local_addr();

        let child = match presenter.launch(&config.client_path) {
            Ok(child) => child,
            Err(err) => {
                transport.close();
                return Err(err);
            }
        };
        presenter.set_host_visible(false);
        info!(
            addr = %local_addr,
            client = %config.client_path.display(),
            "session starting"
        );

        let stop = CancellationToken::new();
        let cancel = transport.canceller();
        let (exit_tx, exit_rx) = watch::channel(None);
        let _monitor = monitor::spawn_monitor(
            &session_id,
            child,
            stop.clone(),
            config.stop_grace(),
            exit_tx,
        );

        let (inbox_tx, inbox) = events::inbox_channel();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SessionState::Starting);

        let task = reader::SessionTask {
            session_id: session_id.clone(),
            transport,
            handshake,
            accept_timeout: config.accept_timeout(),
            drain_grace: config.drain_grace(),
            inbox: inbox_tx,
            presenter,
            outbound_rx: Some(outbound_rx),
            exit_rx,
            stop: stop.clone(),
            state_tx,
            writer_task: None,
        };
        let _session_task = tokio::spawn(reader::run(task).instrument(span));

        Ok(Self {
            session_id,
            inbox,
            outbound_tx,
            state_rx,
            stop,
            cancel,
            local_addr,
        })
    }

    /// Identifier carried by every log record of this session.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.session_id
    }

    /// Event surface for the host's update tick.
    #[must_use]
    pub fn inbox(&self) -> Arc<Inbox> {
        Arc::clone(&self.inbox)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Endpoint actually bound, with the real port when the
    /// configuration asked for port `0`.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Queue one frame for the client, to go out after the handshake.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Closed` once the session has terminated.
    pub async fn send(&self, message: Message) -> Result<()> {
        self.outbound_tx
            .send(message)
            .await
            .map_err(|_| AppError::Closed("session outbound queue is closed".into()))
    }

    /// Stop the session: the client is asked to close, killed after the
    /// stop grace if it refuses, and the link torn down. Returns once
    /// the state is [`SessionState::Terminated`] and the termination
    /// notice is queued.
    pub async fn stop(&mut self) {
        info!(session_id = %self.session_id, "session stop requested");
        self.stop.cancel();
        let _ = self
            .state_rx
            .wait_for(|state| *state == SessionState::Terminated)
            .await;
    }
}

impl Drop for Session {
    /// Backstop: a dropped handle must not leak the client process or
    /// leave the background task waiting on a peer.
    fn drop(&mut self) {
        self.stop.cancel();
        self.cancel.cancel();
    }
}
