//! Symbion Watchdog - host-level TCP watchdog
//!
//! Periodically probes a TCP endpoint and reboots the host when a probe fails:
//! - Bounded connect probe on a fixed interval for a fixed duration
//! - Per-host reboot counter persisted next to the executable, capped
//! - Runs detached in the background unless asked to stay in the foreground

mod config;
mod counter;
mod host;
mod logging;
mod policy;
mod probe;
mod supervisor;
mod watchdog;

use anyhow::{Context, Result};
use config::{Cli, FileConfig, WatchdogConfig};
use counter::RebootCounter;
use host::{DryRunHost, HostController, SystemHost};
use policy::RebootPolicy;
use supervisor::Role;
use tracing::{info, warn};
use watchdog::Watchdog;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let exe = std::env::current_exe().context("Error getting executable file path")?;
    let exe_dir = exe
        .parent()
        .context("Executable path has no parent directory")?
        .to_path_buf();

    let file = FileConfig::discover(cli.config.as_deref())?;
    let config = WatchdogConfig::resolve(cli, file, &exe_dir)?;

    std::fs::create_dir_all(&config.state_dir).with_context(|| {
        format!("Error creating state directory {}", config.state_dir.display())
    })?;
    logging::init(&logging::log_file_path(&config.state_dir, &exe))?;

    match config.supervisor.current_role() {
        Role::Launcher => {
            let pid = supervisor::spawn_worker()?;
            println!("Watchdog running in the background (pid {})...", pid);
            Ok(())
        }
        Role::Worker => {
            let hostname = host::short_hostname()?;
            info!("Symbion Watchdog v{} starting on {}", env!("CARGO_PKG_VERSION"), hostname);
            let counter = RebootCounter::new(&config.state_dir, &hostname);
            if config.dry_run {
                run_worker(&config, counter, DryRunHost).await;
            } else {
                run_worker(&config, counter, SystemHost).await;
            }
            Ok(())
        }
    }
}

async fn run_worker<H: HostController>(config: &WatchdogConfig, counter: RebootCounter, host: H) {
    info!("Reboot counter at {}", counter.path().display());
    let watchdog = Watchdog::new(config, RebootPolicy::new(config.max_reboots, counter, host));

    if watchdog.policy().cap_reached() {
        warn!("Maximum reboot count of {} reached. Exiting...", config.max_reboots);
        return;
    }

    let summary = watchdog.run().await;
    info!(
        "Run finished: {} probes, {} failures, {} reboots requested, {} skipped",
        summary.probes, summary.failures, summary.reboots_requested, summary.reboots_skipped
    );
}
