//! Frontmost-application tracking.
//!
//! On macOS the agent registers for `NSWorkspaceDidActivateApplicationNotification`
//! and forwards each activated bundle identifier to the
//! [`AppContextTracker`](crate::application::app_context::AppContextTracker).
//! Workspace notifications are delivered on the main thread's run loop, so
//! the binary parks its main thread in [`pump_main_thread`] while tokio
//! drives everything else.
//!
//! Other platforms have no source; the tracker then stays at "unknown" and
//! app-filtered rules behave as documented for an unknown frontmost app.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::application::app_context::AppContextTracker;

#[cfg(target_os = "macos")]
pub mod macos;

/// Maximum time between checks of the stop flag while pumping.
const PUMP_SLICE: Duration = Duration::from_millis(250);

#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error("activation observer already installed")]
    AlreadyInstalled,

    #[error("failed to register the activation observer class")]
    ClassRegistration,
}

/// Seeds `tracker` with the current frontmost app and keeps it updated.
pub fn observe(tracker: Arc<AppContextTracker>) -> Result<(), ActivationError> {
    #[cfg(target_os = "macos")]
    {
        macos::install(tracker)
    }
    #[cfg(not(target_os = "macos"))]
    {
        tracing::debug!("no frontmost-application source on this platform");
        drop(tracker);
        Ok(())
    }
}

/// Services main-thread callbacks until `stop` becomes `true`.
///
/// Must be called from the process's main thread.
pub fn pump_main_thread(stop: &AtomicBool) {
    while !stop.load(Ordering::Acquire) {
        #[cfg(target_os = "macos")]
        macos::run_main_loop_for(PUMP_SLICE);
        #[cfg(not(target_os = "macos"))]
        std::thread::sleep(PUMP_SLICE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pump_returns_immediately_when_already_stopped() {
        // Arrange
        let stop = AtomicBool::new(true);

        // Act
        pump_main_thread(&stop);

        // Assert: reaching this line is the assertion.
        assert!(stop.load(Ordering::Acquire));
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_observe_leaves_tracker_unknown_without_a_source() {
        let tracker = Arc::new(AppContextTracker::new());

        observe(Arc::clone(&tracker)).expect("observe should succeed");

        assert_eq!(tracker.current(), None);
    }
}
