//! Client launch and host-window presentation seam.
//!
//! Spawning the terminal client is platform-specific: Windows runs the
//! executable directly in its own console, while Linux has to wrap it
//! in whatever terminal emulator the machine actually has. Window
//! visibility belongs to the embedding host. Both sit behind
//! [`Presenter`] so the session logic stays platform-neutral and tests
//! can substitute a stub.

use std::env;
use std::path::{Path, PathBuf};

use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::{AppError, Result};

/// Environment side effects a session performs outside the wire.
pub trait Presenter: Send + Sync {
    /// Show or hide the host's own window for the session's duration.
    fn set_host_visible(&self, visible: bool);

    /// Launch the terminal client executable and return its handle.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Launch` when the executable (or, on Linux, a
    /// usable terminal emulator) cannot be started.
    fn launch(&self, executable: &Path) -> Result<Child>;
}

/// Stock presenter: spawns the client per platform rules and leaves
/// window control to the embedding host.
#[derive(Debug, Clone)]
pub struct CommandPresenter {
    emulators: Vec<String>,
}

impl CommandPresenter {
    /// Presenter using `emulators` as the terminal priority list on
    /// Linux. The list is ignored on platforms that run the client
    /// directly.
    #[must_use]
    pub fn new(emulators: Vec<String>) -> Self {
        Self { emulators }
    }
}

impl Presenter for CommandPresenter {
    fn set_host_visible(&self, visible: bool) {
        debug!(visible, "host window toggle requested");
    }

    fn launch(&self, executable: &Path) -> Result<Child> {
        spawn_client(executable, &self.emulators)
    }
}

#[cfg(unix)]
fn spawn_client(executable: &Path, emulators: &[String]) -> Result<Child> {
    let (emulator, args) = emulators
        .iter()
        .find_map(|name| find_on_path(name).map(|path| (path, emulator_args(name))))
        .ok_or_else(|| AppError::Launch("no terminal emulator found on PATH".into()))?;

    info!(
        emulator = %emulator.display(),
        client = %executable.display(),
        "spawning terminal client"
    );

    let mut command = Command::new(&emulator);
    command.args(args).arg(executable).kill_on_drop(true);
    command
        .spawn()
        .map_err(|err| AppError::Launch(format!("failed to spawn {}: {err}", emulator.display())))
}

#[cfg(not(unix))]
fn spawn_client(executable: &Path, _emulators: &[String]) -> Result<Child> {
    info!(client = %executable.display(), "spawning terminal client");

    let mut command = Command::new(executable);
    command.kill_on_drop(true);
    command
        .spawn()
        .map_err(|err| AppError::Launch(format!("failed to spawn {}: {err}", executable.display())))
}

/// Arguments placed before the client path for each known emulator.
///
/// Emulators disagree on how "run this program" is spelled, and
/// `gnome-terminal` forks away from its parent unless told to wait,
/// which would break exit observation.
fn emulator_args(name: &str) -> &'static [&'static str] {
    match name {
        "gnome-terminal" => &["--wait", "--"],
        "kitty" => &["--"],
        _ => &["-e"],
    }
}

/// Locate `name` in the `PATH` directories, honoring the execute bit.
#[must_use]
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.is_file()
        && path
            .metadata()
            .is_ok_and(|meta| meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
