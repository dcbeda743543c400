#![forbid(unsafe_code)]

//! `termlink`: demo host for terminal client sessions.
//!
//! Starts one session (shell or pinpad), drains the event surface once
//! per tick the way an embedding host would, and applies the sample
//! collaborator behavior: door-code checks, workstation switches, and
//! sound cues. Ctrl-C stops the session gracefully.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use termlink::protocol::{Message, TerminalKind};
use termlink::session::{CommandPresenter, Session};
use termlink::{AppError, Config, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum TerminalArg {
    Shell,
    Pinpad,
}

impl From<TerminalArg> for TerminalKind {
    fn from(arg: TerminalArg) -> Self {
        match arg {
            TerminalArg::Shell => Self::Shell,
            TerminalArg::Pinpad => Self::Pinpad,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "termlink", about = "Terminal client session host", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Terminal program the client should boot into.
    #[arg(long, value_enum, default_value_t = TerminalArg::Pinpad)]
    kind: TerminalArg,

    /// Override the client executable path.
    #[arg(long)]
    client: Option<PathBuf>,

    /// Override the loopback port.
    #[arg(long)]
    port: Option<u16>,

    /// Workstation id sent to shell terminals after connect.
    #[arg(long, default_value_t = 0)]
    workstation: u32,

    /// Door code a pinpad terminal must match.
    #[arg(long, default_value = "1,2,3,4", value_delimiter = ',')]
    code: Vec<u8>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("termlink host bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::default(),
    };
    if let Some(client) = args.client {
        config.client_path = client;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let door_code: [u8; 4] = args
        .code
        .try_into()
        .map_err(|_| AppError::Config("door code must be exactly 4 values".into()))?;
    info!("configuration loaded");

    // ── Start the session ───────────────────────────────
    let presenter = Arc::new(CommandPresenter::new(
        config.launcher.terminal_emulators.clone(),
    ));
    let terminal = TerminalKind::from(args.kind);
    let mut session = Session::start(&config, presenter, Message::Initialize { terminal })?;
    info!(
        session_id = %session.id(),
        addr = %session.local_addr(),
        ?terminal,
        "session started"
    );

    let inbox = session.inbox();
    let mut tick = tokio::time::interval(config.tick_interval());

    // ── Host update loop ────────────────────────────────
    let reason = loop {
        tokio::select! {
            _ = tick.tick() => {
                for message in inbox.drain() {
                    handle_message(door_code, message);
                }
                if inbox.take_connected() {
                    info!("terminal client connected");
                    if terminal == TerminalKind::Shell {
                        // Shell terminals are told which workstation to present.
                        let frame = Message::InitializeSession {
                            session_id: args.workstation,
                        };
                        if let Err(err) = session.send(frame).await {
                            warn!(%err, "failed to queue the workstation frame");
                        }
                    }
                }
                if let Some(reason) = inbox.take_termination() {
                    break reason;
                }
            }
            () = shutdown_signal() => {
                info!("shutdown signal received, stopping session");
                session.stop().await;
            }
        }
    };

    info!(?reason, "session over, termlink exiting");
    Ok(())
}

/// What the host does with one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostAction {
    Unlock,
    Reject([u8; 4]),
    SwitchWorkstation(u32),
    SoundCue(u32),
    Ignore,
}

/// Decide the host's reaction to a frame. The door code is a typed
/// four-byte comparison; the registry already guarantees the length.
fn host_action(door_code: [u8; 4], message: Message) -> HostAction {
    match message {
        Message::UnlockAttempt { code } if code == door_code => HostAction::Unlock,
        Message::UnlockAttempt { code } => HostAction::Reject(code),
        Message::SwitchTarget { session_id } => HostAction::SwitchWorkstation(session_id),
        Message::PlaySound { sound_id } => HostAction::SoundCue(sound_id),
        Message::Initialize { .. } | Message::InitializeSession { .. } => HostAction::Ignore,
    }
}

/// Sample collaborator behavior on the host side of the wire.
fn handle_message(door_code: [u8; 4], message: Message) {
    match host_action(door_code, message) {
        HostAction::Unlock => info!("door code accepted, unlocking"),
        HostAction::Reject(code) => info!(?code, "door code rejected"),
        HostAction::SwitchWorkstation(session_id) => {
            info!(session_id, "client switched workstation");
        }
        HostAction::SoundCue(sound_id) => info!(sound_id, "sound cue from client"),
        HostAction::Ignore => warn!(kind = ?message.kind(), "unexpected frame from client"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
