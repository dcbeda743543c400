//! Per-tick event surface between the session's background tasks and
//! the host update loop.
//!
//! The host never awaits anything here. It calls [`Inbox::drain`],
//! [`Inbox::take_connected`], and [`Inbox::take_termination`] once per
//! tick from ordinary synchronous code, in that order, so that every
//! message delivered before the session ended is observed before the
//! termination notice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::warn;

use crate::protocol::Message;
use crate::{AppError, Result};

/// Queue depth for decoded inbound messages.
///
/// The reader task blocks on a full queue, so a flooding peer stalls
/// its own stream instead of growing host memory.
pub const INBOX_CAPACITY: usize = 256;

/// Why a session reached its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The client process exited; in-flight frames were drained first.
    ProcessExited,
    /// The peer closed the stream while its process kept running.
    Disconnected,
    /// The host asked for the session to stop.
    Stopped,
    /// No client connected within the accept window.
    ConnectTimeout,
    /// The peer violated the frame protocol.
    Protocol(crate::protocol::ProtocolError),
    /// Socket failure on the loopback link.
    Transport(String),
}

/// One-shot notices shared between both ends of the inbox.
#[derive(Debug, Default)]
struct Notices {
    connected: AtomicBool,
    ended: Mutex<Option<EndReason>>,
}

/// Host-facing notice surface, drained once per update tick.
///
/// Dropping the last `Arc<Inbox>` drops the message receiver with it,
/// which fails any in-flight [`InboxSender::push`] and lets the session
/// task wind down instead of blocking on a queue nobody reads.
#[derive(Debug)]
pub struct Inbox {
    messages: Mutex<mpsc::Receiver<Message>>,
    notices: Arc<Notices>,
}

impl Inbox {
    /// Move every queued message out, in arrival order. Returns empty
    /// when nothing arrived since the last tick.
    #[must_use]
    pub fn drain(&self) -> Vec<Message> {
        let mut receiver = self
            .messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut drained = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            drained.push(message);
        }
        drained
    }

    /// One-shot connected notice: `true` exactly once per session, on
    /// the first tick after the handshake went out.
    #[must_use]
    pub fn take_connected(&self) -> bool {
        self.notices.connected.swap(false, Ordering::AcqRel)
    }

    /// One-shot termination notice with its classification.
    ///
    /// `Some` exactly once per session, and only after every message
    /// that preceded the end was queued. Call [`drain`](Self::drain)
    /// first within the same tick to keep that ordering observable.
    #[must_use]
    pub fn take_termination(&self) -> Option<EndReason> {
        self.notices
            .ended
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Producer side held by the session task.
///
/// Holds only the send half and the shared notices, never the inbox
/// itself, so the host side can go away independently.
#[derive(Debug)]
pub(crate) struct InboxSender {
    messages: mpsc::Sender<Message>,
    notices: Arc<Notices>,
}

impl InboxSender {
    /// Queue one inbound message, waiting if the host is behind.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Closed` when the inbox was dropped and nobody
    /// is left to deliver to.
    pub(crate) async fn push(&self, message: Message) -> Result<()> {
        self.messages
            .send(message)
            .await
            .map_err(|_| AppError::Closed("inbox receiver dropped".into()))
    }

    /// Record that the client connected and the handshake went out.
    pub(crate) fn set_connected(&self) {
        self.notices.connected.store(true, Ordering::Release);
    }

    /// Record the session end. The session task calls this once; a
    /// second call is a bug and is logged rather than overwriting the
    /// first classification.
    pub(crate) fn set_ended(&self, reason: EndReason) {
        let mut slot = self
            .notices
            .ended
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            warn!(?reason, "session end already recorded");
            return;
        }
        *slot = Some(reason);
    }
}

/// Create the inbox pair: the producer for the session task and the
/// shared consumer for the host.
pub(crate) fn inbox_channel() -> (InboxSender, Arc<Inbox>) {
    let (messages, receiver) = mpsc::channel(INBOX_CAPACITY);
    let notices = Arc::new(Notices::default());
    let inbox = Arc::new(Inbox {
        messages: Mutex::new(receiver),
        notices: Arc::clone(&notices),
    });
    (InboxSender { messages, notices }, inbox)
}
