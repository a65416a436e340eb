//! PermissionMonitor: keeps the event tap in step with Accessibility trust.
//!
//! macOS only lets a process install an event tap that can modify events
//! once the user has granted it Accessibility access, and the user can
//! revoke that access at any time.  The monitor polls the trust state and:
//!
//! - stops the tap as soon as trust is lost;
//! - starts it once trust is granted (and retries on every poll if starting
//!   fails, e.g. because the grant has not propagated to the window server
//!   yet).
//!
//! Polling is adaptive: every `fast` interval while untrusted or while the
//! tap is not running, every `slow` interval once both are fine.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::infrastructure::input_capture::EventTap;
use crate::infrastructure::permission::PermissionProbe;

/// Poll cadence, usually taken from `[permission]` in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub fast: Duration,
    pub slow: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            fast: Duration::from_secs(1),
            slow: Duration::from_secs(10),
        }
    }
}

/// Trust and tap state as last observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionStatus {
    pub trusted: bool,
    pub running: bool,
}

/// Polls a [`PermissionProbe`] and starts/stops an [`EventTap`].
pub struct PermissionMonitor<P: PermissionProbe, T: EventTap> {
    probe: P,
    tap: T,
    intervals: PollIntervals,
    trusted: AtomicBool,
    /// Consecutive failed start attempts; only the first is logged at warn.
    start_failures: AtomicU32,
}

impl<P: PermissionProbe, T: EventTap> PermissionMonitor<P, T> {
    pub fn new(probe: P, tap: T, intervals: PollIntervals) -> Self {
        Self {
            probe,
            tap,
            intervals,
            trusted: AtomicBool::new(false),
            start_failures: AtomicU32::new(0),
        }
    }

    /// Queries trust once and reconciles the tap with it.
    pub fn check_once(&self) -> PermissionStatus {
        let trusted = self.probe.is_trusted();
        if self.trusted.swap(trusted, Ordering::AcqRel) != trusted {
            info!(trusted, "accessibility trust changed");
        }

        if !trusted {
            if self.tap.is_running() {
                warn!("accessibility access revoked; stopping event tap");
                self.tap.stop();
            }
        } else if !self.tap.is_running() {
            match self.tap.start(trusted) {
                Ok(()) => {
                    self.start_failures.store(0, Ordering::Relaxed);
                    info!("event tap running");
                }
                Err(e) => {
                    if self.start_failures.fetch_add(1, Ordering::Relaxed) == 0 {
                        warn!("could not start event tap, will retry: {e}");
                    } else {
                        debug!("event tap start retry failed: {e}");
                    }
                }
            }
        }

        self.status()
    }

    /// Returns the delay before the next [`check_once`](Self::check_once).
    pub fn next_interval(&self) -> Duration {
        let status = self.status();
        if status.trusted && status.running {
            self.intervals.slow
        } else {
            self.intervals.fast
        }
    }

    pub fn status(&self) -> PermissionStatus {
        PermissionStatus {
            trusted: self.trusted.load(Ordering::Acquire),
            running: self.tap.is_running(),
        }
    }

    /// Polls until `shutdown` becomes `true` (or its sender is dropped), then
    /// stops the tap.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            fast_ms = self.intervals.fast.as_millis() as u64,
            slow_ms = self.intervals.slow.as_millis() as u64,
            "permission monitor started"
        );

        while !*shutdown.borrow() {
            self.check_once();
            tokio::select! {
                _ = tokio::time::sleep(self.next_interval()) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        if self.tap.is_running() {
            self.tap.stop();
        }
        info!("permission monitor stopped");
    }
}

/// Read access to the monitor's last observation, for status reporting.
pub trait PermissionView: Send + Sync {
    fn status(&self) -> PermissionStatus;
}

impl<P: PermissionProbe, T: EventTap> PermissionView for PermissionMonitor<P, T> {
    fn status(&self) -> PermissionStatus {
        PermissionMonitor::status(self)
    }
}
