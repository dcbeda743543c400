//! Fixed-layout binary encoding for frames.
//!
//! Headers and payloads are written field by field in little-endian order
//! over [`bytes`] buffers; in-memory struct layout never touches the wire.
//! [`FrameCodec`] adapts the format to [`tokio_util::codec`] so a
//! connection can be driven as a frame stream.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::message::{Message, MessageKind, TerminalKind};
use crate::protocol::registry::{self, ProtocolError};
use crate::{AppError, Result};

/// Frame header preceding every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Wire tag of the payload that follows.
    pub kind: u32,
    /// Payload byte count claimed by the sender.
    pub length: u32,
}

impl MessageHeader {
    /// Encoded header size in bytes.
    pub const SIZE: usize = 8;

    /// Read a header from the front of `src` without consuming bytes.
    ///
    /// Returns `None` until `src` holds at least [`Self::SIZE`] bytes.
    #[must_use]
    pub fn peek(src: &[u8]) -> Option<Self> {
        if src.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            kind: u32::from_le_bytes([src[0], src[1], src[2], src[3]]),
            length: u32::from_le_bytes([src[4], src[5], src[6], src[7]]),
        })
    }

    /// Append this header to `dst`.
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.kind);
        dst.put_u32_le(self.length);
    }
}

/// Encode `message` as one complete frame (header plus payload).
#[must_use]
pub fn encode_frame(message: Message) -> BytesMut {
    let kind = message.kind();
    let length = registry::payload_len(kind);
    let mut dst = BytesMut::with_capacity(MessageHeader::SIZE + registry::payload_bytes(kind));
    MessageHeader {
        kind: kind as u32,
        length,
    }
    .write_to(&mut dst);
    write_payload(message, &mut dst);
    dst
}

/// Append the payload fields of `message` to `dst` (header excluded).
pub(crate) fn write_payload(message: Message, dst: &mut BytesMut) {
    match message {
        Message::Initialize { terminal } => dst.put_u32_le(terminal as u32),
        Message::UnlockAttempt { code } => dst.put_slice(&code),
        Message::SwitchTarget { session_id } | Message::InitializeSession { session_id } => {
            dst.put_u32_le(session_id);
        }
        Message::PlaySound { sound_id } => dst.put_u32_le(sound_id),
    }
}

/// Decode the payload fields for `kind`.
///
/// `payload` must be exactly `registry::payload_bytes(kind)` long; callers
/// size it from the registry before handing it over.
pub(crate) fn read_payload(
    kind: MessageKind,
    payload: &[u8],
) -> std::result::Result<Message, ProtocolError> {
    let mut bytes = payload;
    match kind {
        MessageKind::Initialize => {
            let raw = bytes.get_u32_le();
            let terminal = TerminalKind::from_u32(raw).ok_or(ProtocolError::InvalidValue {
                field: "terminal_kind",
                value: raw,
            })?;
            Ok(Message::Initialize { terminal })
        }
        MessageKind::UnlockAttempt => {
            let mut code = [0u8; 4];
            bytes.copy_to_slice(&mut code);
            Ok(Message::UnlockAttempt { code })
        }
        MessageKind::SwitchTarget => Ok(Message::SwitchTarget {
            session_id: bytes.get_u32_le(),
        }),
        MessageKind::PlaySound => Ok(Message::PlaySound {
            sound_id: bytes.get_u32_le(),
        }),
        MessageKind::InitializeSession => Ok(Message::InitializeSession {
            session_id: bytes.get_u32_le(),
        }),
    }
}

/// Frame codec for [`tokio_util::codec::FramedRead`] and `FramedWrite`.
///
/// # Decoder
///
/// Buffers until a full header is present, validates tag and claimed
/// length against the registry before anything else (a bogus header must
/// fail without waiting for payload bytes that may never arrive), then
/// buffers until exactly the registered payload size is available.
/// Returns `Ok(None)` while a frame is incomplete; partial bytes stay in
/// the internal buffer and are never exposed.
///
/// # Encoder
///
/// Writes the header and fixed-layout payload for one [`Message`].
#[derive(Debug, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Create a new frame codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for FrameCodec {
    type Item = Message;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        let Some(header) = MessageHeader::peek(src) else {
            return Ok(None);
        };

        let kind = registry::check_header(&header)?;
        let payload_len = registry::payload_bytes(kind);

        if src.len() < MessageHeader::SIZE + payload_len {
            src.reserve(MessageHeader::SIZE + payload_len - src.len());
            return Ok(None);
        }

        src.advance(MessageHeader::SIZE);
        let payload = src.split_to(payload_len);
        let message = read_payload(kind, payload.as_ref())?;
        Ok(Some(message))
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = AppError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        let kind = item.kind();
        MessageHeader {
            kind: kind as u32,
            length: registry::payload_len(kind),
        }
        .write_to(dst);
        write_payload(item, dst);
        Ok(())
    }
}
