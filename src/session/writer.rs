//! Outbound frame writer task.
//!
//! Writes never share a task with reads: a peer that stops consuming
//! cannot stall the read loop, it stalls only this task and, through
//! the bounded queue, the senders.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

use crate::protocol::Message;
use crate::transport::FrameWriter;

/// Spawn the writer: forwards queued frames onto the wire until the
/// queue closes, a write fails, or the transport is cancelled.
pub(crate) fn spawn(
    session_id: &str,
    mut writer: FrameWriter,
    mut outbound: mpsc::Receiver<Message>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let span = info_span!("frame_writer", %session_id);
    tokio::spawn(
        async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        debug!("writer cancelled");
                        break;
                    }
                    queued = outbound.recv() => match queued {
                        Some(message) => {
                            let kind = message.kind();
                            // A peer that stops reading stalls the write;
                            // cancellation must still get through.
                            tokio::select! {
                                biased;
                                written = writer.write_frame(message) => {
                                    if let Err(err) = written {
                                        warn!(%err, ?kind, "outbound write failed");
                                        break;
                                    }
                                    debug!(?kind, "frame written");
                                }
                                () = cancel.cancelled() => {
                                    debug!("writer cancelled mid-frame");
                                    break;
                                }
                            }
                        }
                        None => break,
                    },
                }
            }
            writer.shutdown().await;
        }
        .instrument(span),
    )
}
