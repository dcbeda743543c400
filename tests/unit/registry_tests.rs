//! Unit tests for the message registry: tag mapping, static payload
//! sizes, and header validation.

use termlink::protocol::registry::{check_header, decode_message, payload_bytes, payload_len};
use termlink::protocol::{Message, MessageHeader, MessageKind, ProtocolError, TerminalKind};

/// Every registered tag maps back to its kind, and unregistered tags
/// map to nothing.
#[test]
fn tags_round_trip_through_from_u32() {
    let kinds = [
        MessageKind::Initialize,
        MessageKind::UnlockAttempt,
        MessageKind::SwitchTarget,
        MessageKind::PlaySound,
        MessageKind::InitializeSession,
    ];

    for kind in kinds {
        assert_eq!(
            MessageKind::from_u32(kind as u32),
            Some(kind),
            "tag {} must map back to {kind:?}",
            kind as u32
        );
    }

    assert_eq!(MessageKind::from_u32(5), None, "tag 5 is unassigned");
    assert_eq!(MessageKind::from_u32(u32::MAX), None);
}

/// Terminal kinds map from their wire values, and out-of-range values
/// map to nothing.
#[test]
fn terminal_kinds_map_from_u32() {
    assert_eq!(TerminalKind::from_u32(0), Some(TerminalKind::Shell));
    assert_eq!(TerminalKind::from_u32(1), Some(TerminalKind::Pinpad));
    assert_eq!(TerminalKind::from_u32(2), None);
}

/// Every message currently in the set carries a four-byte payload.
#[test]
fn registered_payload_sizes() {
    let kinds = [
        MessageKind::Initialize,
        MessageKind::UnlockAttempt,
        MessageKind::SwitchTarget,
        MessageKind::PlaySound,
        MessageKind::InitializeSession,
    ];

    for kind in kinds {
        assert_eq!(payload_len(kind), 4, "{kind:?} payload length");
        assert_eq!(payload_bytes(kind), 4, "{kind:?} payload byte count");
    }
}

/// A header with a known tag and the registered length passes.
#[test]
fn check_header_accepts_registered_shape() {
    let header = MessageHeader { kind: 4, length: 4 };
    let kind = check_header(&header).expect("registered header must pass");
    assert_eq!(kind, MessageKind::InitializeSession);
}

/// A header with an unknown tag is rejected, and the claimed length is
/// never trusted.
#[test]
fn check_header_rejects_unknown_tag() {
    let header = MessageHeader {
        kind: 0xFFFF_FFFF,
        length: 4,
    };
    let result = check_header(&header);
    assert_eq!(result, Err(ProtocolError::UnknownKind(0xFFFF_FFFF)));
}

/// A known tag with the wrong length is rejected with both sizes.
#[test]
fn check_header_rejects_length_mismatch() {
    let header = MessageHeader { kind: 3, length: 8 };
    let result = check_header(&header);
    assert_eq!(
        result,
        Err(ProtocolError::SizeMismatch {
            kind: MessageKind::PlaySound,
            expected: 4,
            actual: 8,
        })
    );
}

/// `decode_message` turns a validated header and payload into the
/// typed message.
#[test]
fn decode_message_builds_typed_message() {
    let header = MessageHeader { kind: 1, length: 4 };
    let message = decode_message(&header, &[9, 9, 9, 9]).expect("decode must succeed");
    assert_eq!(message, Message::UnlockAttempt { code: [9, 9, 9, 9] });
}

/// A payload buffer shorter than the registered size is rejected, even
/// when the header itself claims the right length.
#[test]
fn decode_message_rejects_short_payload() {
    let header = MessageHeader { kind: 1, length: 4 };
    let result = decode_message(&header, &[9, 9]);
    assert_eq!(
        result,
        Err(ProtocolError::SizeMismatch {
            kind: MessageKind::UnlockAttempt,
            expected: 4,
            actual: 2,
        })
    );
}

/// Violation messages carry the values a log reader needs.
#[test]
fn violation_display_formats() {
    let unknown = ProtocolError::UnknownKind(99);
    assert!(unknown.to_string().contains("unknown message tag"));

    let mismatch = ProtocolError::SizeMismatch {
        kind: MessageKind::PlaySound,
        expected: 4,
        actual: 7,
    };
    let text = mismatch.to_string();
    assert!(text.contains('4') && text.contains('7'), "both sizes: {text}");

    let invalid = ProtocolError::InvalidValue {
        field: "terminal_kind",
        value: 9,
    };
    assert!(invalid.to_string().contains("terminal_kind"));
}
