//! Process supervision
//!
//! In background mode the first invocation re-executes itself with a marker
//! variable and returns at once; the marked copy runs the loop. There is no
//! session detachment and the launcher never waits on the worker.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::info;

/// Set to "1" in the environment of the background worker.
pub const WORKER_ENV: &str = "SYMBION_WATCHDOG_WORKER";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorMode {
    /// Run the loop in the invoking process.
    Foreground,
    /// Spawn a detached copy of ourselves and exit.
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Runs the watchdog loop.
    Worker,
    /// Starts the worker and returns.
    Launcher,
}

impl SupervisorMode {
    pub fn role(self, marker: Option<&str>) -> Role {
        match self {
            SupervisorMode::Foreground => Role::Worker,
            SupervisorMode::Background if marker == Some("1") => Role::Worker,
            SupervisorMode::Background => Role::Launcher,
        }
    }

    /// Role of the current process, read from the environment.
    pub fn current_role(self) -> Role {
        let marker = std::env::var(WORKER_ENV).ok();
        self.role(marker.as_deref())
    }
}

/// Command re-running `exe` with `args`, marked as the worker.
pub fn worker_command<I>(exe: &Path, args: I) -> Command
where
    I: IntoIterator<Item = OsString>,
{
    let mut cmd = Command::new(exe);
    cmd.args(args)
        .env(WORKER_ENV, "1")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}

/// Start the background worker with our own arguments; returns its pid.
pub fn spawn_worker() -> Result<u32> {
    let exe = std::env::current_exe().context("Error getting executable file path")?;
    let child = worker_command(&exe, std::env::args_os().skip(1))
        .spawn()
        .context("Error starting background worker")?;

    info!("Background worker started (pid {})", child.id());
    Ok(child.id())
}
