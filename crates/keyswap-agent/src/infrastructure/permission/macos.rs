//! `AXIsProcessTrusted` probe.

#![cfg(target_os = "macos")]

use std::ffi::c_void;

use core_foundation::base::TCFType;
use core_foundation::boolean::CFBoolean;
use core_foundation::dictionary::CFDictionary;
use core_foundation::string::CFString;

use super::PermissionProbe;

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrusted() -> bool;
    fn AXIsProcessTrustedWithOptions(options: *const c_void) -> bool;
}

/// Queries the Accessibility trust database for this process.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessibilityProbe;

impl AccessibilityProbe {
    /// Like [`is_trusted`](PermissionProbe::is_trusted), but asks the OS to
    /// show its "grant access" dialog when the answer is no.
    pub fn prompt(&self) -> bool {
        let options = CFDictionary::from_CFType_pairs(&[(
            CFString::new("AXTrustedCheckOptionPrompt"),
            CFBoolean::true_value(),
        )]);
        // SAFETY: `options` is a valid CFDictionary for the duration of the call.
        unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef() as *const c_void) }
    }
}

impl PermissionProbe for AccessibilityProbe {
    fn is_trusted(&self) -> bool {
        // SAFETY: no arguments; reads process-wide state.
        unsafe { AXIsProcessTrusted() }
    }
}
