//! Length-delimited typed-message wire protocol.
//!
//! Every frame is `[MessageHeader][payload]` with no inter-frame
//! delimiter. The header is two fixed-width fields:
//!
//! ```text
//! ┌───────────────┬───────────────┐
//! │ kind          │ length        │
//! │ u32, LE       │ u32, LE       │
//! └───────────────┴───────────────┘
//! ```
//!
//! `length` is not a variable body size: it must equal the statically
//! known encoded size of the payload for `kind`, and any mismatch is a
//! protocol violation.
//!
//! # Message set
//!
//! | Tag | Message             | Payload           | Direction   |
//! |-----|---------------------|-------------------|-------------|
//! | 0   | `Initialize`        | terminal kind u32 | host → peer |
//! | 1   | `UnlockAttempt`     | 4 code bytes      | peer → host |
//! | 2   | `SwitchTarget`      | session id u32    | peer → host |
//! | 3   | `PlaySound`         | sound id u32      | peer → host |
//! | 4   | `InitializeSession` | session id u32    | host → peer |
//!
//! Byte order is little-endian throughout. Both ends of the link run on
//! the same machine, so interop is not a concern; the order is still
//! fixed rather than native so the format has exactly one definition.

pub mod codec;
pub mod message;
pub mod registry;

pub use codec::{encode_frame, FrameCodec, MessageHeader};
pub use message::{Message, MessageKind, TerminalKind};
pub use registry::ProtocolError;
