//! Mock event tap for unit testing.
//!
//! Records start/stop calls and can be told to refuse starting, so the
//! permission monitor can be exercised without a real `CGEventTap`.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;

use super::{CaptureError, EventTap};

/// A mock implementation of [`EventTap`].
#[derive(Debug, Default)]
pub struct MockEventTap {
    running: AtomicBool,
    start_calls: AtomicU32,
    stop_calls: AtomicU32,
    deny_permission: AtomicBool,
    next_start_error: Mutex<Option<CaptureError>>,
}

impl MockEventTap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `start` fail with `PermissionDenied` while
    /// `deny` is `true`.
    pub fn deny_permission(&self, deny: bool) {
        self.deny_permission.store(deny, Ordering::SeqCst);
    }

    /// Makes the next `start` fail with `error`.
    pub fn fail_next_start(&self, error: CaptureError) {
        *self.next_start_error.lock() = Some(error);
    }

    /// Number of times `start` was called, successful or not.
    pub fn start_calls(&self) -> u32 {
        self.start_calls.load(Ordering::SeqCst)
    }

    /// Number of times `stop` actually stopped a running tap.
    pub fn stop_calls(&self) -> u32 {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl EventTap for MockEventTap {
    fn start(&self, trusted: bool) -> Result<(), CaptureError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if !trusted || self.deny_permission.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied);
        }
        if let Some(error) = self.next_start_error.lock().take() {
            return Err(error);
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_tap_starts_and_stops() {
        // Arrange
        let tap = MockEventTap::new();

        // Act
        tap.start(true).expect("start should succeed");
        let running = tap.is_running();
        tap.stop();

        // Assert
        assert!(running);
        assert!(!tap.is_running());
    }

    #[test]
    fn test_mock_tap_stop_is_idempotent() {
        let tap = MockEventTap::new();
        tap.start(true).unwrap();

        tap.stop();
        tap.stop();

        assert_eq!(tap.stop_calls(), 1);
    }

    #[test]
    fn test_denied_permission_has_no_side_effects() {
        let tap = MockEventTap::new();
        tap.deny_permission(true);

        let result = tap.start(true);

        assert!(matches!(result, Err(CaptureError::PermissionDenied)));
        assert!(!tap.is_running());
    }

    #[test]
    fn test_untrusted_start_has_no_side_effects() {
        // Arrange
        let tap = MockEventTap::new();

        // Act
        let result = tap.start(false);

        // Assert
        assert!(matches!(result, Err(CaptureError::PermissionDenied)));
        assert!(!tap.is_running());
    }

    #[test]
    fn test_fail_next_start_fails_only_once() {
        let tap = MockEventTap::new();
        tap.fail_next_start(CaptureError::TapCreationFailed);

        assert!(tap.start(true).is_err());
        assert!(tap.start(true).is_ok());
        assert_eq!(tap.start_calls(), 2);
    }
}
