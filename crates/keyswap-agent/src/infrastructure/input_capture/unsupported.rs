//! Event tap stand-in for platforms without a Keyswap hook.
//!
//! Rules can still be listed and edited from the CLI on these platforms; only
//! remapping is unavailable.

#![cfg(not(target_os = "macos"))]

use super::{CaptureError, EventTap};
use crate::application::synthesize::{KeyEventFactory, SynthesisError, SyntheticKeyEvent};

/// Factory for a pipeline that no tap drives: the "event" is the request
/// itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedEventFactory;

impl KeyEventFactory for DetachedEventFactory {
    type Event = SyntheticKeyEvent;

    fn create_key_event(&self, event: SyntheticKeyEvent) -> Result<SyntheticKeyEvent, SynthesisError> {
        Ok(event)
    }
}

#[derive(Debug, Default)]
pub struct UnsupportedEventTap;

impl UnsupportedEventTap {
    pub fn new() -> Self {
        Self
    }
}

impl EventTap for UnsupportedEventTap {
    fn start(&self, _trusted: bool) -> Result<(), CaptureError> {
        Err(CaptureError::UnsupportedPlatform(
            std::env::consts::OS.to_string(),
        ))
    }

    fn stop(&self) {}

    fn is_running(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyswap_core::ModifierFlags;

    #[test]
    fn test_start_reports_unsupported_platform() {
        let tap = UnsupportedEventTap::new();
        assert!(matches!(tap.start(true), Err(CaptureError::UnsupportedPlatform(_))));
        assert!(!tap.is_running());
    }

    #[test]
    fn test_detached_factory_returns_request() {
        let request = SyntheticKeyEvent {
            key_code: 4,
            modifiers: ModifierFlags::SHIFT,
            is_key_down: true,
        };

        assert_eq!(DetachedEventFactory.create_key_event(request).unwrap(), request);
    }
}
