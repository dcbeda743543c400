//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

use crate::protocol::ProtocolError;

/// Shared crate result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all session failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Subprocess executable missing or unstartable.
    Launch(String),
    /// No client connected within the accept window.
    ConnectTimeout(String),
    /// Frame-level violation from the peer (unknown tag, bad length).
    Protocol(ProtocolError),
    /// Socket-level failure on the loopback link.
    Transport(String),
    /// In-flight operation abandoned by a cancellation request.
    Cancelled,
    /// The endpoint or session is already closed.
    Closed(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Launch(msg) => write!(f, "launch: {msg}"),
            Self::ConnectTimeout(msg) => write!(f, "connect timeout: {msg}"),
            Self::Protocol(err) => write!(f, "protocol: {err}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Closed(msg) => write!(f, "closed: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<ProtocolError> for AppError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
