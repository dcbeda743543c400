//! Client process exit observation and host-initiated stop.
//!
//! The monitor task is the only owner of the [`Child`] handle. It
//! resolves exactly once, either because the process exited on its own
//! or because the stop token fired, and publishes the outcome on a
//! watch channel. It never touches the transport or the inbox; the
//! session task reconciles the published exit against in-flight reads.

use std::time::Duration;

use tokio::process::Child;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

/// Terminal state of the client process as observed by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// The process ended; the code is the exit status when known.
    Exited(Option<i32>),
    /// The process ignored the close request and was force-killed.
    Killed,
}

/// Spawn the exit monitor for `child`.
///
/// On `stop`: ask for a graceful close, wait `stop_grace`, then kill.
pub(crate) fn spawn_monitor(
    session_id: &str,
    mut child: Child,
    stop: CancellationToken,
    stop_grace: Duration,
    exit_tx: watch::Sender<Option<ProcessExit>>,
) -> JoinHandle<()> {
    let span = info_span!("exit_monitor", %session_id);
    tokio::spawn(
        async move {
            let outcome = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => {
                        info!(code = ?status.code(), "client process exited");
                        ProcessExit::Exited(status.code())
                    }
                    Err(err) => {
                        warn!(%err, "wait on client process failed");
                        ProcessExit::Exited(None)
                    }
                },
                () = stop.cancelled() => stop_child(&mut child, stop_grace).await,
            };
            let _ = exit_tx.send(Some(outcome));
        }
        .instrument(span),
    )
}

/// Ask the child to close, then kill it if the grace window lapses.
async fn stop_child(child: &mut Child, grace: Duration) -> ProcessExit {
    request_close(child);

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            info!(code = ?status.code(), "client closed after stop request");
            ProcessExit::Exited(status.code())
        }
        Ok(Err(err)) => {
            warn!(%err, "wait on client process failed during stop");
            ProcessExit::Exited(None)
        }
        Err(_) => {
            warn!(?grace, "client ignored the close request; killing");
            if let Err(err) = child.kill().await {
                warn!(%err, "kill failed");
            }
            ProcessExit::Killed
        }
    }
}

/// Ask the child to shut down: `SIGTERM` where signals exist, the
/// platform kill otherwise.
#[cfg(unix)]
fn request_close(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|raw| i32::try_from(raw).ok()) else {
        return;
    };
    if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        warn!(%err, "graceful close signal failed");
    }
}

#[cfg(not(unix))]
fn request_close(child: &mut Child) {
    if let Err(err) = child.start_kill() {
        warn!(%err, "close request failed");
    }
}
