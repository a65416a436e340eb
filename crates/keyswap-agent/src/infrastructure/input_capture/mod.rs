//! Input capture infrastructure for the Keyswap agent.
//!
//! On macOS this installs a `CGEventTap` at the session level, at the head of
//! the event chain, for key-down, key-up and flags-changed events.  The tap
//! lives on a dedicated thread with its own `CFRunLoop`; every event is
//! decided synchronously on that thread by the
//! [`EventPipeline`](crate::application::handle_event::EventPipeline).
//!
//! # macOS-Specific Implementation
//!
//! The OS waits for the callback's answer before delivering the keystroke,
//! and disables the tap if the callback is too slow.  Nothing is deferred to
//! another thread: the pipeline is lock-free on its read path.
//!
//! # Testability
//!
//! The [`EventTap`] trait lets the permission monitor be unit-tested with
//! [`mock::MockEventTap`] instead of a real tap.

use std::sync::Arc;

use crate::application::handle_event::EventPipeline;

pub mod mock;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(not(target_os = "macos"))]
pub mod unsupported;

/// Error type for input capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The process is not trusted for Accessibility; nothing was installed.
    #[error("accessibility permission has not been granted")]
    PermissionDenied,

    /// `CGEventTapCreate` returned null despite trust being reported.
    #[error("the OS refused to create the event tap")]
    TapCreationFailed,

    #[error("failed to create a run loop source for the event tap")]
    RunLoopSourceFailed,

    #[error("failed to spawn the event tap thread: {0}")]
    ThreadSpawn(String),

    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}

/// A system-wide keyboard hook.
///
/// States are `Stopped → Running → Stopped`.  Implementations must make
/// `stop` synchronous and idempotent: once it returns, no callback runs.
pub trait EventTap: Send + Sync {
    /// Installs the hook and starts delivering events.  Calling `start` on a
    /// running tap is a no-op.
    ///
    /// `trusted` is the caller's current Accessibility state.  When it is
    /// `false` the tap fails with [`CaptureError::PermissionDenied`] and
    /// installs nothing.
    fn start(&self, trusted: bool) -> Result<(), CaptureError>;
    /// Removes the hook.
    fn stop(&self);
    fn is_running(&self) -> bool;
}

// ── Platform selection ────────────────────────────────────────────────────────

#[cfg(target_os = "macos")]
pub type PlatformEventFactory = macos::CgEventFactory;
#[cfg(target_os = "macos")]
pub type PlatformEventTap = macos::MacEventTap;

#[cfg(not(target_os = "macos"))]
pub type PlatformEventFactory = unsupported::DetachedEventFactory;
#[cfg(not(target_os = "macos"))]
pub type PlatformEventTap = unsupported::UnsupportedEventTap;

/// Builds the tap that drives `pipeline` on this platform.
pub fn platform_tap(pipeline: Arc<EventPipeline<PlatformEventFactory>>) -> PlatformEventTap {
    #[cfg(target_os = "macos")]
    {
        macos::MacEventTap::new(pipeline)
    }
    #[cfg(not(target_os = "macos"))]
    {
        drop(pipeline);
        unsupported::UnsupportedEventTap::new()
    }
}

impl<T: EventTap + ?Sized> EventTap for Arc<T> {
    fn start(&self, trusted: bool) -> Result<(), CaptureError> {
        (**self).start(trusted)
    }

    fn stop(&self) {
        (**self).stop()
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }
}
