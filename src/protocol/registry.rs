//! Tag registry: the single mapping from wire tags to payload sizes and
//! decoders.
//!
//! The registry never trusts the header's claimed length: it is supplied
//! by an external process and only ever compared against the statically
//! known size for the tag. An unknown tag fails immediately rather than
//! skipping `length` bytes.

use std::fmt::{Display, Formatter};

use crate::protocol::codec::{self, MessageHeader};
use crate::protocol::message::{Message, MessageKind};

/// Frame-level violation by the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Tag outside the known message set.
    UnknownKind(u32),
    /// Claimed payload length differs from the static size for the tag.
    SizeMismatch {
        /// Message kind resolved from the tag.
        kind: MessageKind,
        /// Statically known payload size.
        expected: u32,
        /// Size claimed by the header (or carried by the buffer).
        actual: u32,
    },
    /// A fixed-width field carried an out-of-range value.
    InvalidValue {
        /// Field that failed validation.
        field: &'static str,
        /// Offending wire value.
        value: u32,
    },
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownKind(tag) => write!(f, "unknown message tag {tag:#010x}"),
            Self::SizeMismatch {
                kind,
                expected,
                actual,
            } => write!(f, "{kind:?} payload is {expected} bytes, got {actual}"),
            Self::InvalidValue { field, value } => write!(f, "invalid {field} value {value}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Exact encoded payload size for `kind`, in wire width.
#[must_use]
#[allow(clippy::match_same_arms)] // One row per tag; adding a message adds a row.
pub const fn payload_len(kind: MessageKind) -> u32 {
    match kind {
        MessageKind::Initialize => 4,
        MessageKind::UnlockAttempt => 4,
        MessageKind::SwitchTarget => 4,
        MessageKind::PlaySound => 4,
        MessageKind::InitializeSession => 4,
    }
}

/// [`payload_len`] as a buffer size.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Registered sizes are single-digit byte counts.
pub const fn payload_bytes(kind: MessageKind) -> usize {
    payload_len(kind) as usize
}

/// Validate a header's tag and claimed length against the registry.
///
/// # Errors
///
/// [`ProtocolError::UnknownKind`] when the tag is outside the known set;
/// [`ProtocolError::SizeMismatch`] when the claimed length differs from
/// the registered size for the tag.
pub fn check_header(header: &MessageHeader) -> Result<MessageKind, ProtocolError> {
    let kind =
        MessageKind::from_u32(header.kind).ok_or(ProtocolError::UnknownKind(header.kind))?;
    let expected = payload_len(kind);
    if header.length != expected {
        return Err(ProtocolError::SizeMismatch {
            kind,
            expected,
            actual: header.length,
        });
    }
    Ok(kind)
}

/// Decode one message from its header and exact payload bytes.
///
/// # Errors
///
/// Everything [`check_header`] rejects, plus
/// [`ProtocolError::SizeMismatch`] when `payload` is not exactly the
/// registered size and [`ProtocolError::InvalidValue`] for out-of-range
/// field values.
pub fn decode_message(header: &MessageHeader, payload: &[u8]) -> Result<Message, ProtocolError> {
    let kind = check_header(header)?;
    if payload.len() != payload_bytes(kind) {
        let actual = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        return Err(ProtocolError::SizeMismatch {
            kind,
            expected: payload_len(kind),
            actual,
        });
    }
    codec::read_payload(kind, payload)
}
