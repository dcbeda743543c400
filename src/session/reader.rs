//! The per-session background task: accept, handshake, read loop, and
//! the reconciliation of process exit against in-flight frames.
//!
//! The task observes exit through a watch channel instead of touching
//! the child handle, and it is the only code that closes the
//! connection, so an exit notice can never yank the socket out from
//! under a read. The read branch of the loop comes before the exit
//! branch; a frame that is already decodable always beats the notice.
//!
//! Stop requests race the accept and the inbox pushes directly; a
//! client that never connects, or a host that never drains, cannot
//! hold the task past a stop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::protocol::Message;
use crate::session::events::{EndReason, InboxSender};
use crate::session::launcher::Presenter;
use crate::session::monitor::ProcessExit;
use crate::session::{writer, SessionState};
use crate::transport::{Connection, Transport};
use crate::AppError;

/// Everything the session task owns while it runs.
pub(crate) struct SessionTask {
    pub(crate) session_id: String,
    pub(crate) transport: Transport,
    pub(crate) handshake: Message,
    pub(crate) accept_timeout: Duration,
    pub(crate) drain_grace: Duration,
    pub(crate) inbox: InboxSender,
    pub(crate) presenter: Arc<dyn Presenter>,
    pub(crate) outbound_rx: Option<mpsc::Receiver<Message>>,
    pub(crate) exit_rx: watch::Receiver<Option<ProcessExit>>,
    pub(crate) stop: CancellationToken,
    pub(crate) state_tx: watch::Sender<SessionState>,
    pub(crate) writer_task: Option<JoinHandle<()>>,
}

impl SessionTask {
    fn set_state(&self, state: SessionState) {
        self.state_tx.send_replace(state);
    }

    fn stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }
}

/// Drive one session from `Connecting` to `Terminated`.
pub(crate) async fn run(mut task: SessionTask) {
    task.set_state(SessionState::Connecting);

    let reason = session_loop(&mut task).await;

    // ── Teardown ────────────────────────────────────────────────────────────
    task.set_state(SessionState::Draining);

    // Unblock the writer and release the sockets before anything else;
    // a peer that is still alive sees end-of-stream now.
    task.transport.force_cancel();
    if let Some(writer_task) = task.writer_task.take() {
        let _ = writer_task.await;
    }
    task.transport.close();

    // The child must be gone before the termination notice is queued.
    if task.exit_rx.borrow().is_none() {
        task.stop.cancel();
    }
    if task.exit_rx.wait_for(Option::is_some).await.is_err() {
        warn!("exit monitor dropped without publishing an exit");
    }

    task.presenter.set_host_visible(true);

    info!(?reason, "session ended");
    task.inbox.set_ended(reason);
    task.set_state(SessionState::Terminated);
}

/// Accept, handshake, and read until something ends the session.
async fn session_loop(task: &mut SessionTask) -> EndReason {
    // A stop while nobody has connected must not wait out the window.
    let accepted = tokio::select! {
        biased;
        () = task.stop.cancelled() => {
            debug!("stop requested before the client connected");
            return EndReason::Stopped;
        }
        accepted = task.transport.accept(task.accept_timeout) => accepted,
    };
    let mut conn = match accepted {
        Ok(conn) => conn,
        Err(AppError::ConnectTimeout(msg)) => {
            if task.stop_requested() {
                return EndReason::Stopped;
            }
            warn!(%msg, "client never connected");
            return EndReason::ConnectTimeout;
        }
        Err(AppError::Cancelled) => return EndReason::Stopped,
        Err(err) => {
            warn!(%err, "accept failed");
            return EndReason::Transport(err.to_string());
        }
    };

    // The handshake is always the first frame on the wire.
    if let Err(err) = conn.write_frame(task.handshake).await {
        warn!(%err, "handshake write failed");
        return EndReason::Transport(err.to_string());
    }

    // Outbound writes get their own task so reads never wait on them.
    if let Some(outbound_rx) = task.outbound_rx.take() {
        if let Some(frame_writer) = conn.take_writer() {
            task.writer_task = Some(writer::spawn(
                &task.session_id,
                frame_writer,
                outbound_rx,
                task.transport.canceller(),
            ));
        }
    }

    task.inbox.set_connected();
    task.set_state(SessionState::Active);
    info!(kind = ?task.handshake.kind(), "client connected, handshake sent");

    let mut exit_seen: Option<ProcessExit> = *task.exit_rx.borrow();
    loop {
        if let Some(exit) = exit_seen {
            debug!(?exit, "client exit observed by the read loop");
            return drain_after_exit(task, &mut conn).await;
        }

        let frame = tokio::select! {
            biased;
            frame = conn.read_frame() => Some(frame),
            changed = task.exit_rx.changed() => {
                exit_seen = if changed.is_ok() {
                    *task.exit_rx.borrow()
                } else {
                    // Monitor gone without publishing; assume the child died.
                    Some(ProcessExit::Exited(None))
                };
                None
            }
        };

        let Some(frame) = frame else { continue };
        match frame {
            Ok(Some(message)) => {
                debug!(kind = ?message.kind(), "frame received");
                // A stop request must not wait on a full inbox.
                tokio::select! {
                    biased;
                    pushed = task.inbox.push(message) => {
                        if pushed.is_err() {
                            return EndReason::Stopped;
                        }
                    }
                    () = task.stop.cancelled() => {
                        debug!("stop requested while the inbox was full");
                        return EndReason::Stopped;
                    }
                }
            }
            Ok(None) => {
                info!("peer closed the stream");
                return if task.stop_requested() {
                    EndReason::Stopped
                } else {
                    EndReason::Disconnected
                };
            }
            Err(AppError::Cancelled) => return EndReason::Stopped,
            Err(AppError::Protocol(violation)) => {
                warn!(%violation, "protocol violation, severing the link");
                return EndReason::Protocol(violation);
            }
            Err(err) => {
                warn!(%err, "read failed");
                return EndReason::Transport(err.to_string());
            }
        }
    }
}

/// The client process is gone; deliver whatever already made it onto
/// the wire.
///
/// Nothing pending means nothing to drain and the session ends at
/// once. Otherwise frames are read under a single deadline; a partial
/// frame that never completes is abandoned there by force-cancelling
/// the transport.
async fn drain_after_exit(task: &mut SessionTask, conn: &mut Connection) -> EndReason {
    if !conn.data_pending() {
        debug!("no bytes pending at exit, skipping the drain grace");
        return exit_reason(task);
    }

    task.set_state(SessionState::Draining);
    let deadline = tokio::time::Instant::now() + task.drain_grace;

    loop {
        match tokio::time::timeout_at(deadline, conn.read_frame()).await {
            Ok(Ok(Some(message))) => {
                debug!(kind = ?message.kind(), "frame drained after exit");
                tokio::select! {
                    biased;
                    pushed = task.inbox.push(message) => {
                        if pushed.is_err() {
                            break;
                        }
                    }
                    () = task.stop.cancelled() => {
                        debug!("stop requested while draining");
                        break;
                    }
                }
            }
            Ok(Ok(None)) => break,
            Ok(Err(err)) => {
                debug!(%err, "drain ended");
                break;
            }
            Err(_) => {
                warn!("drain grace elapsed, force-cancelling the link");
                task.transport.force_cancel();
                break;
            }
        }
    }

    exit_reason(task)
}

fn exit_reason(task: &SessionTask) -> EndReason {
    if task.stop_requested() {
        EndReason::Stopped
    } else {
        EndReason::ProcessExited
    }
}
