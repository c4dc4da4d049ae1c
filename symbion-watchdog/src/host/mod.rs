//! Host control for the watchdog
//!
//! Handles:
//! - Short hostname detection (persistence key)
//! - Reboot requests behind `HostController`, platform specific
//! - Dry-run controller that only logs

use anyhow::{anyhow, Context, Result};
use std::future::Future;
use tokio::process::Command as AsyncCommand;
use tracing::{info, warn};

/// Something able to reboot the machine we run on.
///
/// A successful return only means the request was accepted; the process is
/// expected to be killed by the reboot itself.
pub trait HostController {
    fn reboot(&self) -> impl Future<Output = Result<String>>;
}

/// Reboots through the platform `shutdown` command.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl SystemHost {
    fn reboot_command() -> Result<AsyncCommand> {
        if cfg!(target_os = "windows") {
            let mut cmd = AsyncCommand::new("shutdown");
            cmd.args(["/r", "/t", "0"]);
            Ok(cmd)
        } else if cfg!(any(target_os = "linux", target_os = "macos", target_os = "freebsd")) {
            let mut cmd = AsyncCommand::new("shutdown");
            cmd.args(["-r", "now"]);
            Ok(cmd)
        } else {
            Err(anyhow!("Reboot not supported on this platform"))
        }
    }
}

impl HostController for SystemHost {
    async fn reboot(&self) -> Result<String> {
        let output = Self::reboot_command()?
            .output()
            .await
            .context("Failed to execute reboot command")?;

        if output.status.success() {
            info!("Reboot command accepted ({})", output.status);
            Ok("Reboot initiated".to_string())
        } else {
            Err(anyhow!(
                "Reboot failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }
}

/// Logs instead of rebooting.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunHost;

impl HostController for DryRunHost {
    async fn reboot(&self) -> Result<String> {
        warn!("Dry run: reboot skipped");
        Ok("Reboot skipped (dry run)".to_string())
    }
}

/// First label of the machine hostname.
pub fn short_hostname() -> Result<String> {
    let raw = gethostname::gethostname().to_string_lossy().to_string();
    shorten(&raw)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Error getting hostname: {:?} has no usable label", raw))
}

fn shorten(raw: &str) -> Option<&str> {
    let label = raw.trim().split('.').next()?;
    (!label.is_empty()).then_some(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorten_hostname() {
        assert_eq!(shorten("web01.prod.example.org"), Some("web01"));
        assert_eq!(shorten("web01"), Some("web01"));
        assert_eq!(shorten(" db2.local\n"), Some("db2"));
        assert_eq!(shorten(""), None);
        assert_eq!(shorten(".example.org"), None);
    }

    #[test]
    fn test_short_hostname_detection() {
        let host = short_hostname().unwrap();
        assert!(!host.is_empty());
        assert!(!host.contains('.'));
    }

    #[tokio::test]
    async fn test_dry_run_never_fails() {
        let output = DryRunHost.reboot().await.unwrap();
        assert!(output.contains("dry run"));
    }
}
