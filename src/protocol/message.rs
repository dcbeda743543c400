//! The closed set of messages exchanged with the terminal client.

/// Numeric wire tag identifying a payload shape.
///
/// Tags are stable: a value is never reused for a different shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageKind {
    /// Handshake written by the host as the first frame.
    Initialize = 0,
    /// Pinpad code entry from the peer.
    UnlockAttempt = 1,
    /// Peer asks to present a different workstation session.
    SwitchTarget = 2,
    /// Peer asks the host to play a sound cue.
    PlaySound = 3,
    /// Which workstation session a shell terminal presents first.
    InitializeSession = 4,
}

impl MessageKind {
    /// Checked constructor from a wire tag.
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Initialize),
            1 => Some(Self::UnlockAttempt),
            2 => Some(Self::SwitchTarget),
            3 => Some(Self::PlaySound),
            4 => Some(Self::InitializeSession),
            _ => None,
        }
    }
}

/// Which program the spawned terminal boots into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TerminalKind {
    /// Interactive shell presenting a workstation session.
    Shell = 0,
    /// Door-lock pinpad.
    Pinpad = 1,
}

impl TerminalKind {
    /// Checked constructor from a wire discriminant.
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Shell),
            1 => Some(Self::Pinpad),
            _ => None,
        }
    }
}

/// One decoded frame payload.
///
/// Every variant is a fixed-layout record; its wire size is registered in
/// [`crate::protocol::registry`] and its byte layout lives in
/// [`crate::protocol::codec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// Handshake: which mode the terminal should initialize into.
    Initialize {
        /// Terminal program to boot.
        terminal: TerminalKind,
    },
    /// Code entered on the pinpad.
    UnlockAttempt {
        /// Raw 4-byte code, compared as typed bytes with no re-validation.
        code: [u8; 4],
    },
    /// Present a different workstation session.
    SwitchTarget {
        /// Identifier of the workstation session to present.
        session_id: u32,
    },
    /// Play a sound cue on the host.
    PlaySound {
        /// Host-side sound identifier.
        sound_id: u32,
    },
    /// Workstation session a shell terminal should present initially.
    InitializeSession {
        /// Identifier of the workstation session to present.
        session_id: u32,
    },
}

impl Message {
    /// Wire tag for this payload shape.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Initialize { .. } => MessageKind::Initialize,
            Self::UnlockAttempt { .. } => MessageKind::UnlockAttempt,
            Self::SwitchTarget { .. } => MessageKind::SwitchTarget,
            Self::PlaySound { .. } => MessageKind::PlaySound,
            Self::InitializeSession { .. } => MessageKind::InitializeSession,
        }
    }
}

impl From<TerminalKind> for Message {
    /// Shorthand for building the handshake frame.
    fn from(terminal: TerminalKind) -> Self {
        Self::Initialize { terminal }
    }
}
