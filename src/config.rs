//! Configuration parsing, validation, and duration accessors.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Launch settings for the spawned terminal client.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LauncherConfig {
    /// Terminal emulators probed on PATH, highest priority first (Linux only;
    /// Windows runs the client binary directly).
    #[serde(default = "default_terminal_emulators")]
    pub terminal_emulators: Vec<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            terminal_emulators: default_terminal_emulators(),
        }
    }
}

fn default_terminal_emulators() -> Vec<String> {
    [
        "x-terminal-emulator",
        "konsole",
        "xfce4-terminal",
        "gnome-terminal",
        "alacritty",
        "kitty",
        "xterm",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn default_client_path() -> PathBuf {
    PathBuf::from("terminal-client")
}

fn default_port() -> u16 {
    41987
}

fn default_accept_timeout_ms() -> u64 {
    1000
}

fn default_drain_grace_ms() -> u64 {
    1000
}

fn default_stop_grace_ms() -> u64 {
    1000
}

fn default_tick_interval_ms() -> u64 {
    50
}

/// Session configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Path to the terminal client executable.
    #[serde(default = "default_client_path")]
    pub client_path: PathBuf,
    /// Loopback TCP port the client connects back on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// How long to wait for the client to connect after spawn.
    #[serde(default = "default_accept_timeout_ms")]
    pub accept_timeout_ms: u64,
    /// Post-exit window for delivering frames still on the wire.
    #[serde(default = "default_drain_grace_ms")]
    pub drain_grace_ms: u64,
    /// Wait after a graceful close request before force-killing the client.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
    /// Host update-cycle interval used by the demo binary.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Client launch settings.
    #[serde(default)]
    pub launcher: LauncherConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_path: default_client_path(),
            port: default_port(),
            accept_timeout_ms: default_accept_timeout_ms(),
            drain_grace_ms: default_drain_grace_ms(),
            stop_grace_ms: default_stop_grace_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            launcher: LauncherConfig::default(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Accept window for the client's connect-back.
    #[must_use]
    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }

    /// Post-exit drain window for in-flight frames.
    #[must_use]
    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }

    /// Graceful-close wait before force-kill.
    #[must_use]
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// Host update-cycle interval.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.client_path.as_os_str().is_empty() {
            return Err(AppError::Config("client_path must not be empty".into()));
        }

        if self.accept_timeout_ms == 0 {
            return Err(AppError::Config(
                "accept_timeout_ms must be greater than zero".into(),
            ));
        }

        if self.launcher.terminal_emulators.is_empty() {
            return Err(AppError::Config(
                "launcher.terminal_emulators must not be empty".into(),
            ));
        }

        Ok(())
    }
}
