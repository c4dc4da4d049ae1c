//! Watchdog loop
//!
//! Probe, hand failures to the reboot policy, sleep for the interval, repeat
//! until the configured duration has elapsed. The elapsed check only happens
//! between iterations, so the effective period is probe time plus interval.

use crate::config::WatchdogConfig;
use crate::host::HostController;
use crate::policy::{RebootDecision, RebootPolicy};
use crate::probe::{self, target};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

/// What one run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub probes: u32,
    pub failures: u32,
    pub reboots_requested: u32,
    pub reboots_skipped: u32,
}

pub struct Watchdog<'a, H> {
    config: &'a WatchdogConfig,
    policy: RebootPolicy<H>,
}

impl<'a, H: HostController> Watchdog<'a, H> {
    pub fn new(config: &'a WatchdogConfig, policy: RebootPolicy<H>) -> Self {
        Self { config, policy }
    }

    pub fn policy(&self) -> &RebootPolicy<H> {
        &self.policy
    }

    pub async fn run(&self) -> RunSummary {
        let config = self.config;
        let target = target(&config.address, config.port);
        let started = Instant::now();
        let mut summary = RunSummary::default();

        info!(
            "Watching {} every {} for {} (timeout {}s, max reboots {})",
            target,
            humantime::format_duration(config.interval),
            humantime::format_duration(config.duration),
            config.probe_timeout.as_secs(),
            config.max_reboots
        );

        while started.elapsed() < config.duration {
            summary.probes += 1;

            match probe::probe(&config.address, config.port, config.probe_timeout).await {
                Ok(_) => info!("Ping successful for {}", target),
                Err(e) => {
                    summary.failures += 1;
                    warn!("Ping failed for {}: {}", target, e);

                    match self.policy.on_probe_failure().await {
                        RebootDecision::CapReached { .. } => summary.reboots_skipped += 1,
                        RebootDecision::Rebooted { .. } | RebootDecision::RebootFailed { .. } => {
                            summary.reboots_requested += 1
                        }
                    }
                }
            }

            sleep(config.interval).await;
        }

        info!(
            "Duration of {} reached. Exiting...",
            humantime::format_duration(config.duration)
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::RebootCounter;
    use crate::policy::tests::{RecordingHost, SharedBuf};
    use crate::supervisor::SupervisorMode;
    use std::path::Path;
    use std::time::Duration;

    fn config(port: u16, interval_ms: u64, duration_ms: u64, max: u32, dir: &Path) -> WatchdogConfig {
        WatchdogConfig {
            address: "127.0.0.1".to_string(),
            port,
            interval: Duration::from_millis(interval_ms),
            duration: Duration::from_millis(duration_ms),
            probe_timeout: Duration::from_secs(1),
            max_reboots: max,
            state_dir: dir.to_path_buf(),
            supervisor: SupervisorMode::Foreground,
            dry_run: true,
        }
    }

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn watchdog<'a>(config: &'a WatchdogConfig, host: RecordingHost) -> Watchdog<'a, RecordingHost> {
        let counter = RebootCounter::new(&config.state_dir, "host");
        Watchdog::new(config, RebootPolicy::new(config.max_reboots, counter, host))
    }

    #[tokio::test]
    async fn test_duration_shorter_than_interval_probes_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(closed_port(), 300, 50, 5, dir.path());

        let started = std::time::Instant::now();
        let summary = watchdog(&config, RecordingHost::default()).run().await;

        assert_eq!(summary.probes, 1);
        assert!(started.elapsed() < Duration::from_millis(600 + 1000));
    }

    #[tokio::test]
    async fn test_zero_duration_never_probes() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(closed_port(), 10, 0, 5, dir.path());

        let summary = watchdog(&config, RecordingHost::default()).run().await;
        assert_eq!(summary, RunSummary::default());
    }

    #[tokio::test]
    async fn test_reachable_target_never_reboots() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let dir = tempfile::tempdir().unwrap();
        let config = config(port, 20, 100, 5, dir.path());
        let host = RecordingHost::default();
        let calls = host.calls.clone();

        let summary = watchdog(&config, host).run().await;

        assert!(summary.probes >= 1);
        assert_eq!(summary.failures, 0);
        assert_eq!(calls.get(), 0);
        assert!(!dir.path().join("host_reboot_count.txt").exists());
    }

    #[tokio::test]
    async fn test_refused_target_counts_up_to_cap() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(closed_port(), 20, 250, 2, dir.path());
        let host = RecordingHost::default();
        let calls = host.calls.clone();

        let watchdog = watchdog(&config, host);
        let summary = watchdog.run().await;

        assert!(summary.probes >= 3, "{:?}", summary);
        assert_eq!(summary.failures, summary.probes);
        assert_eq!(summary.reboots_requested, 2);
        assert_eq!(summary.reboots_skipped, summary.probes - 2);
        assert_eq!(calls.get(), 2);
        assert_eq!(watchdog.policy().current_count(), 2);
    }

    #[tokio::test]
    async fn test_refused_target_below_cap_counts_every_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(closed_port(), 20, 120, 1000, dir.path());

        let watchdog = watchdog(&config, RecordingHost::default());
        let summary = watchdog.run().await;

        assert!(summary.probes >= 1);
        assert_eq!(watchdog.policy().current_count(), summary.probes);
        assert_eq!(summary.reboots_requested, summary.probes);
    }

    #[tokio::test]
    async fn test_zero_cap_never_reboots() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(closed_port(), 10, 60, 0, dir.path());
        let host = RecordingHost::default();
        let calls = host.calls.clone();

        let summary = watchdog(&config, host).run().await;

        assert!(summary.failures >= 1);
        assert_eq!(summary.reboots_requested, 0);
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test]
    async fn test_log_has_one_line_per_failure_and_reboot() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(closed_port(), 20, 150, 5, dir.path());
        let buf = SharedBuf::default();
        let _guard = buf.capture();

        let watchdog = watchdog(&config, RecordingHost::default());
        let summary = watchdog.run().await;
        let log = buf.contents();

        let failed = log.matches("Ping failed").count() as u32;
        let initiated = log.matches("System reboot initiated").count() as u32;
        assert_eq!(failed, summary.probes);
        assert_eq!(initiated, watchdog.policy().current_count());
        assert_eq!(initiated, summary.probes.min(5));
        assert!(log.contains("Duration of 150ms reached. Exiting..."));
    }
}
