//! Reboot policy
//!
//! Every failed probe asks for a reboot; the only brake is the cumulative cap
//! stored in the reboot counter. Counter and reboot errors are logged and never
//! stop the caller.

use crate::counter::RebootCounter;
use crate::host::HostController;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebootDecision {
    /// Counter already at the cap, nothing done.
    CapReached { count: u32 },
    /// Counter bumped to `count` and the host accepted the reboot request.
    Rebooted { count: u32 },
    /// Counter bumped to `count` but the reboot request failed.
    RebootFailed { count: u32, reason: String },
}

pub struct RebootPolicy<H> {
    max_reboots: u32,
    counter: RebootCounter,
    host: H,
}

impl<H: HostController> RebootPolicy<H> {
    pub fn new(max_reboots: u32, counter: RebootCounter, host: H) -> Self {
        Self {
            max_reboots,
            counter,
            host,
        }
    }

    /// Persisted count, zero if the file cannot be read or parsed.
    pub fn current_count(&self) -> u32 {
        self.counter.read().unwrap_or_else(|e| {
            error!("{}", e);
            0
        })
    }

    pub fn cap_reached(&self) -> bool {
        self.current_count() >= self.max_reboots
    }

    pub async fn on_probe_failure(&self) -> RebootDecision {
        let count = self.current_count();
        if count >= self.max_reboots {
            warn!(
                "Maximum reboot count of {} reached, reboot skipped",
                self.max_reboots
            );
            return RebootDecision::CapReached { count };
        }

        let count = count + 1;
        if let Err(e) = self.counter.write(count) {
            error!("{}", e);
        }
        warn!("System reboot initiated. Reboot count: {}", count);

        match self.host.reboot().await {
            Ok(output) => {
                info!("{}", output);
                RebootDecision::Rebooted { count }
            }
            Err(e) => {
                error!("Error rebooting system: {:#}", e);
                RebootDecision::RebootFailed {
                    count,
                    reason: format!("{:#}", e),
                }
            }
        }
    }
}
