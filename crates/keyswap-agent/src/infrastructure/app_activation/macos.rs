//! `NSWorkspace` activation observer.
//!
//! A tiny Objective-C class, `KeyswapActivationObserver`, is declared at
//! runtime with a single `workspaceDidActivateApp:` method.  An instance is
//! registered with the shared workspace's notification center; its method
//! reads `userInfo[NSWorkspaceApplicationKey].bundleIdentifier` and passes
//! it to the tracker stored in [`TRACKER`].

#![cfg(target_os = "macos")]

use std::ffi::{c_char, CStr};
use std::ptr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use core_foundation::runloop::{kCFRunLoopDefaultMode, CFRunLoop};
use objc::declare::ClassDecl;
use objc::rc::autoreleasepool;
use objc::runtime::{Class, Object, Sel};
use objc::{class, msg_send, sel, sel_impl};
use tracing::{debug, info};

use super::ActivationError;
use crate::application::app_context::AppContextTracker;

type Id = *mut Object;

// NSWorkspace and NSRunningApplication live in AppKit.
#[link(name = "AppKit", kind = "framework")]
extern "C" {}

const OBSERVER_CLASS: &str = "KeyswapActivationObserver";
const UTF8_ENCODING: usize = 4;

/// The tracker the Objective-C callback writes to.  Set once by [`install`].
static TRACKER: OnceLock<Arc<AppContextTracker>> = OnceLock::new();

/// Seeds the tracker and subscribes to activation notifications.
pub fn install(tracker: Arc<AppContextTracker>) -> Result<(), ActivationError> {
    TRACKER
        .set(tracker)
        .map_err(|_| ActivationError::AlreadyInstalled)?;
    let tracker = TRACKER.get().ok_or(ActivationError::AlreadyInstalled)?;

    let observer_class = declare_observer_class().ok_or(ActivationError::ClassRegistration)?;

    // SAFETY: plain Foundation/AppKit messages on objects that live for the
    // whole process (shared workspace, its notification center) or that we
    // own (observer, notification name).
    unsafe {
        let workspace: Id = msg_send![class!(NSWorkspace), sharedWorkspace];

        let frontmost = autoreleasepool(|| {
            let app: Id = msg_send![workspace, frontmostApplication];
            bundle_identifier(app)
        });
        tracker.set_frontmost(frontmost.as_deref());

        // Never released; the registration lasts until exit.
        let observer: Id = msg_send![observer_class, new];
        let center: Id = msg_send![workspace, notificationCenter];
        let name = ns_string("NSWorkspaceDidActivateApplicationNotification");
        let _: () = msg_send![center,
            addObserver: observer
            selector: sel!(workspaceDidActivateApp:)
            name: name
            object: ptr::null_mut::<Object>()
        ];
        let _: () = msg_send![name, release];
    }

    info!(frontmost = ?tracker.current(), "watching frontmost application");
    Ok(())
}

/// Runs the main thread's run loop for at most `slice`.
pub fn run_main_loop_for(slice: Duration) {
    // SAFETY: `kCFRunLoopDefaultMode` is an immutable CoreFoundation constant.
    CFRunLoop::run_in_mode(unsafe { kCFRunLoopDefaultMode }, slice, false);
}

fn declare_observer_class() -> Option<&'static Class> {
    if let Some(existing) = Class::get(OBSERVER_CLASS) {
        return Some(existing);
    }
    let mut decl = ClassDecl::new(OBSERVER_CLASS, class!(NSObject))?;
    // SAFETY: the function signature matches a one-argument selector.
    unsafe {
        decl.add_method(
            sel!(workspaceDidActivateApp:),
            workspace_did_activate_app as extern "C" fn(&Object, Sel, Id),
        );
    }
    Some(decl.register())
}

extern "C" fn workspace_did_activate_app(_this: &Object, _cmd: Sel, notification: Id) {
    let Some(tracker) = TRACKER.get() else {
        return;
    };
    let bundle_id = activated_bundle_id(notification);
    debug!(bundle_id = ?bundle_id, "application activated");
    tracker.set_frontmost(bundle_id.as_deref());
}

/// Extracts the activated app's bundle id from an activation notification.
///
/// Runs inside its own autorelease pool: the main loop is pumped without
/// AppKit, so nothing else drains the strings created here.
fn activated_bundle_id(notification: Id) -> Option<String> {
    // SAFETY: `notification` is nil or an NSNotification; every message
    // below is valid on the objects it returns.
    autoreleasepool(|| unsafe {
        if notification.is_null() {
            return None;
        }
        let user_info: Id = msg_send![notification, userInfo];
        if user_info.is_null() {
            return None;
        }
        let key = ns_string("NSWorkspaceApplicationKey");
        let app: Id = msg_send![user_info, objectForKey: key];
        let _: () = msg_send![key, release];
        bundle_identifier(app)
    })
}

/// Reads `-[NSRunningApplication bundleIdentifier]`; `None` for a nil app or
/// an app without a bundle.
///
/// # Safety
///
/// `app` must be nil or an `NSRunningApplication`.
unsafe fn bundle_identifier(app: Id) -> Option<String> {
    if app.is_null() {
        return None;
    }
    let bundle_id: Id = msg_send![app, bundleIdentifier];
    if bundle_id.is_null() {
        return None;
    }
    let utf8: *const c_char = msg_send![bundle_id, UTF8String];
    if utf8.is_null() {
        return None;
    }
    Some(CStr::from_ptr(utf8).to_string_lossy().into_owned())
}

/// Creates a +1 `NSString`; the caller releases it.
///
/// # Safety
///
/// Must be balanced with a `release` message.
unsafe fn ns_string(value: &str) -> Id {
    let alloc: Id = msg_send![class!(NSString), alloc];
    msg_send![alloc,
        initWithBytes: value.as_ptr()
        length: value.len()
        encoding: UTF8_ENCODING
    ]
}
