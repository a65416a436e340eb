//! Accessibility trust probing.
//!
//! An event tap that may modify keystrokes needs the user to list the agent
//! under System Settings → Privacy & Security → Accessibility.  The
//! [`PermissionProbe`] trait hides the OS query so the
//! [`PermissionMonitor`](crate::application::permission_watch::PermissionMonitor)
//! can be tested with a mock.

#[cfg(target_os = "macos")]
pub mod macos;

/// Answers "is this process trusted for Accessibility right now?".
#[cfg_attr(test, mockall::automock)]
pub trait PermissionProbe: Send + Sync {
    fn is_trusted(&self) -> bool;
}

/// Probe for platforms without an Accessibility gate.
///
/// Always reports trusted, which makes the monitor attempt to start the
/// (unsupported) tap and surface that failure in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysTrusted;

impl PermissionProbe for AlwaysTrusted {
    fn is_trusted(&self) -> bool {
        true
    }
}

/// The probe for the current platform.
#[cfg(target_os = "macos")]
pub type PlatformProbe = macos::AccessibilityProbe;

/// The probe for the current platform.
#[cfg(not(target_os = "macos"))]
pub type PlatformProbe = AlwaysTrusted;

/// Asks the OS to show its Accessibility prompt if the process is not yet
/// trusted.  Returns the trust state at the time of the call.
pub fn request_access() -> bool {
    #[cfg(target_os = "macos")]
    {
        macos::AccessibilityProbe.prompt()
    }
    #[cfg(not(target_os = "macos"))]
    {
        AlwaysTrusted.is_trusted()
    }
}
