#![forbid(unsafe_code)]

//! Host-side IPC for spawned terminal-emulator clients: spawn the
//! client, accept its single loopback TCP connection, and exchange
//! length-delimited typed messages until one side ends the session.

pub mod config;
pub mod errors;
pub mod protocol;
pub mod session;
pub mod transport;

pub use config::Config;
pub use errors::{AppError, Result};
