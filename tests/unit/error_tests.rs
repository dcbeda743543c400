//! Unit tests for error display formats and conversions.

use termlink::protocol::{MessageKind, ProtocolError};
use termlink::{AppError, Config};

/// Display strings carry a stable prefix per failure class.
#[test]
fn display_prefixes_are_stable() {
    let cases = [
        (AppError::Config("bad port".into()), "config: bad port"),
        (AppError::Launch("no binary".into()), "launch: no binary"),
        (
            AppError::ConnectTimeout("no client within 1000ms".into()),
            "connect timeout: no client within 1000ms",
        ),
        (
            AppError::Transport("peer reset".into()),
            "transport: peer reset",
        ),
        (AppError::Cancelled, "cancelled"),
        (AppError::Closed("inbox gone".into()), "closed: inbox gone"),
    ];

    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

/// Protocol violations keep their own wording under the outer prefix.
#[test]
fn protocol_errors_nest_their_detail() {
    let err = AppError::Protocol(ProtocolError::SizeMismatch {
        kind: MessageKind::UnlockAttempt,
        expected: 4,
        actual: 2,
    });

    let text = err.to_string();
    assert!(text.starts_with("protocol: "), "got: {text}");
    assert!(text.contains("UnlockAttempt"), "got: {text}");
}

/// IO errors convert into the transport class.
#[test]
fn io_error_converts_to_transport() {
    let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
    let err = AppError::from(io);

    assert!(
        matches!(err, AppError::Transport(ref msg) if msg.contains("reset by peer")),
        "got: {err:?}"
    );
}

/// Protocol errors convert into the protocol class unchanged.
#[test]
fn protocol_error_converts_losslessly() {
    let violation = ProtocolError::UnknownKind(77);
    let err = AppError::from(violation);

    assert!(
        matches!(err, AppError::Protocol(ProtocolError::UnknownKind(77))),
        "got: {err:?}"
    );
}

/// TOML deserialization failures convert into the config class.
#[test]
fn toml_error_converts_to_config() {
    let toml_err = toml::from_str::<Config>("port = []").expect_err("must not parse");
    let err = AppError::from(toml_err);

    assert!(
        matches!(err, AppError::Config(ref msg) if msg.contains("invalid config")),
        "got: {err:?}"
    );
}

/// The error type plugs into `std::error::Error` consumers.
#[test]
fn implements_std_error() {
    let err: Box<dyn std::error::Error> = Box::new(AppError::Cancelled);
    assert_eq!(err.to_string(), "cancelled");
}
