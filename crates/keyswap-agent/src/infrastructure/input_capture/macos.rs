//! macOS `CGEventTap` implementation.
//!
//! The tap is created with `CGEventTapCreate` at `kCGSessionEventTap` /
//! `kCGHeadInsertEventTap` with the default (filtering) option, so it sees
//! key-down, key-up and flags-changed events before any application and may
//! drop or replace them.  It runs on a dedicated thread that owns a
//! `CFRunLoop`.
//!
//! # Safety
//!
//! The only callback the OS invokes is [`tap_callback`], a bare C function
//! that receives an opaque `user_info` pointer.  That pointer is a boxed
//! [`TapContext`] owned by the tap thread, which outlives the tap itself:
//! the box is freed only after the mach port has been disabled, removed
//! from the run loop and invalidated.  The callback immediately turns it
//! back into a `&TapContext` and hands all decisions to the safe
//! [`EventPipeline`].  All `unsafe` blocks are annotated with `// SAFETY:`.

#![cfg(target_os = "macos")]

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use core_foundation::base::TCFType;
use core_foundation::mach_port::CFMachPort;
use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use foreign_types::ForeignType;
use keyswap_core::ModifierFlags;
use parking_lot::Mutex;
use tracing::{error, info, warn};

use super::{CaptureError, EventTap};
use crate::application::handle_event::{EventPipeline, TapDisableReason, TapEvent};
use crate::application::synthesize::{
    Disposition, KeyEventFactory, SynthesisError, SyntheticKeyEvent,
};

// ── CoreGraphics FFI ──────────────────────────────────────────────────────────

type TapCallback = extern "C" fn(
    proxy: *mut c_void,
    event_type: u32,
    event: *mut c_void,
    user_info: *mut c_void,
) -> *mut c_void;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapCreate(
        tap: CGEventTapLocation,
        place: u32,
        options: u32,
        events_of_interest: u64,
        callback: TapCallback,
        user_info: *mut c_void,
    ) -> *mut c_void;
    fn CGEventTapEnable(tap: *mut c_void, enable: bool);
    fn CGEventGetIntegerValueField(event: *mut c_void, field: u32) -> i64;
    fn CGEventGetFlags(event: *mut c_void) -> u64;
    fn CGEventSourceFlagsState(state_id: i32) -> u64;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFMachPortInvalidate(port: *mut c_void);
}

// CGEventType
const KEY_DOWN: u32 = 10;
const KEY_UP: u32 = 11;
const FLAGS_CHANGED: u32 = 12;
const TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;
const TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;

const EVENT_MASK: u64 = (1 << KEY_DOWN) | (1 << KEY_UP) | (1 << FLAGS_CHANGED);

// CGEventTapPlacement / CGEventTapOptions
const HEAD_INSERT_EVENT_TAP: u32 = 0;
const TAP_OPTION_DEFAULT: u32 = 0;

// CGEventField
const KEYBOARD_EVENT_KEYCODE: u32 = 9;

// CGEventSourceStateID
const HID_SYSTEM_STATE: i32 = 1;

/// Upper bound on how long a stop request can go unnoticed if it races the
/// run loop starting.
const RUN_LOOP_SLICE: Duration = Duration::from_millis(500);

// ── Event construction ────────────────────────────────────────────────────────

/// Builds keyboard `CGEvent`s from a HID-system-state event source.
#[derive(Debug, Default, Clone, Copy)]
pub struct CgEventFactory;

impl KeyEventFactory for CgEventFactory {
    type Event = CGEvent;

    fn create_key_event(&self, event: SyntheticKeyEvent) -> Result<CGEvent, SynthesisError> {
        let failed = |_| SynthesisError::EventConstructionFailed(event);
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState).map_err(failed)?;
        let cg_event =
            CGEvent::new_keyboard_event(source, event.key_code, event.is_key_down).map_err(failed)?;
        cg_event.set_flags(CGEventFlags::from_bits_truncate(event.modifiers.bits()));
        Ok(cg_event)
    }
}

/// The pipeline type the macOS tap drives.
pub type MacPipeline = EventPipeline<CgEventFactory>;

// ── Callback ──────────────────────────────────────────────────────────────────

/// State reachable from the C callback.
struct TapContext {
    pipeline: Arc<MacPipeline>,
    /// The tap's mach port, needed to re-enable it from inside the callback.
    port: AtomicPtr<c_void>,
}

extern "C" fn tap_callback(
    _proxy: *mut c_void,
    event_type: u32,
    event: *mut c_void,
    user_info: *mut c_void,
) -> *mut c_void {
    // SAFETY: `user_info` is the `TapContext` boxed in `run_tap_thread`,
    // which is freed only after this tap has been invalidated.
    let context = unsafe { &*(user_info as *const TapContext) };

    let Some(tap_event) = decode(event_type, event) else {
        return event;
    };

    match context.pipeline.handle(tap_event) {
        Disposition::Forward => event,
        Disposition::Consume => ptr::null_mut(),
        // The event system releases a returned event along with the original.
        Disposition::Replace(replacement) => ManuallyDrop::new(replacement).as_ptr() as *mut c_void,
        Disposition::ReEnableAndForward => {
            let port = context.port.load(Ordering::Acquire);
            if !port.is_null() {
                // SAFETY: `port` is the live mach port of this tap.
                unsafe { CGEventTapEnable(port, true) };
            }
            event
        }
    }
}

fn decode(event_type: u32, event: *mut c_void) -> Option<TapEvent> {
    match event_type {
        TAP_DISABLED_BY_TIMEOUT => {
            return Some(TapEvent::TapDisabled {
                reason: TapDisableReason::Timeout,
            })
        }
        TAP_DISABLED_BY_USER_INPUT => {
            return Some(TapEvent::TapDisabled {
                reason: TapDisableReason::UserInput,
            })
        }
        _ => {}
    }
    if event.is_null() {
        return None;
    }

    // SAFETY: `event` is the valid CGEventRef passed to this callback.
    let (raw_code, raw_flags) = unsafe {
        (
            CGEventGetIntegerValueField(event, KEYBOARD_EVENT_KEYCODE),
            CGEventGetFlags(event),
        )
    };
    let key_code = raw_code as u16;
    let flags = ModifierFlags::from_bits(raw_flags);

    match event_type {
        KEY_DOWN => Some(TapEvent::KeyDown { key_code, flags }),
        KEY_UP => Some(TapEvent::KeyUp { key_code, flags }),
        FLAGS_CHANGED => Some(TapEvent::FlagsChanged { key_code, flags }),
        _ => None,
    }
}

/// Reads the current hardware Caps Lock state.
fn hardware_caps_lock() -> bool {
    // SAFETY: plain query with no pointer arguments.
    let flags = unsafe { CGEventSourceFlagsState(HID_SYSTEM_STATE) };
    ModifierFlags::from_bits(flags).caps_lock()
}

// ── Tap thread ────────────────────────────────────────────────────────────────

struct TapThread {
    run_loop: CFRunLoop,
    stop_requested: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Body of the dedicated tap thread.  Reports the run loop (or the failure)
/// through `ready`, then services the tap until `stop_requested` is set.
fn run_tap_thread(
    pipeline: Arc<MacPipeline>,
    stop_requested: Arc<AtomicBool>,
    ready: mpsc::Sender<Result<CFRunLoop, CaptureError>>,
) {
    let context = Box::new(TapContext {
        pipeline,
        port: AtomicPtr::new(ptr::null_mut()),
    });
    let context_ptr = &*context as *const TapContext as *mut c_void;

    // SAFETY: `tap_callback` matches CGEventTapCallBack and `context_ptr`
    // stays valid until after the port is invalidated below.
    let port_ref = unsafe {
        CGEventTapCreate(
            CGEventTapLocation::Session,
            HEAD_INSERT_EVENT_TAP,
            TAP_OPTION_DEFAULT,
            EVENT_MASK,
            tap_callback,
            context_ptr,
        )
    };
    if port_ref.is_null() {
        let _ = ready.send(Err(CaptureError::TapCreationFailed));
        return;
    }
    // SAFETY: CGEventTapCreate follows the create rule (+1 reference).
    let port = unsafe { CFMachPort::wrap_under_create_rule(port_ref as _) };
    context.port.store(port_ref, Ordering::Release);

    let source = match port.create_runloop_source(0) {
        Ok(source) => source,
        Err(()) => {
            // SAFETY: `port_ref` is the port created above.
            unsafe { CFMachPortInvalidate(port_ref) };
            let _ = ready.send(Err(CaptureError::RunLoopSourceFailed));
            return;
        }
    };

    let run_loop = CFRunLoop::get_current();
    // SAFETY: `kCFRunLoopCommonModes` is an immutable CoreFoundation constant.
    unsafe { run_loop.add_source(&source, kCFRunLoopCommonModes) };
    // SAFETY: `port_ref` is the port created above.
    unsafe { CGEventTapEnable(port_ref, true) };

    if ready.send(Ok(run_loop.clone())).is_ok() {
        while !stop_requested.load(Ordering::Acquire) {
            // SAFETY: `kCFRunLoopDefaultMode` is an immutable CoreFoundation constant.
            CFRunLoop::run_in_mode(unsafe { kCFRunLoopDefaultMode }, RUN_LOOP_SLICE, false);
        }
    }

    // SAFETY: tear down in the reverse order of setup; after invalidation
    // the OS no longer calls `tap_callback` with `context_ptr`.
    unsafe {
        CGEventTapEnable(port_ref, false);
        run_loop.remove_source(&source, kCFRunLoopCommonModes);
        CFMachPortInvalidate(port_ref);
    }
    drop(source);
    drop(port);
    drop(context);
}

// ── EventTap ──────────────────────────────────────────────────────────────────

/// The production [`EventTap`].
pub struct MacEventTap {
    pipeline: Arc<MacPipeline>,
    thread: Mutex<Option<TapThread>>,
}

impl MacEventTap {
    pub fn new(pipeline: Arc<MacPipeline>) -> Self {
        Self {
            pipeline,
            thread: Mutex::new(None),
        }
    }
}

impl EventTap for MacEventTap {
    fn start(&self, trusted: bool) -> Result<(), CaptureError> {
        let mut slot = self.thread.lock();
        if slot.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return Ok(());
        }
        if !trusted {
            return Err(CaptureError::PermissionDenied);
        }

        self.pipeline.sync_caps_lock(hardware_caps_lock());

        let (ready_tx, ready_rx) = mpsc::channel();
        let stop_requested = Arc::new(AtomicBool::new(false));
        let handle = {
            let pipeline = Arc::clone(&self.pipeline);
            let stop_requested = Arc::clone(&stop_requested);
            thread::Builder::new()
                .name("keyswap-event-tap".to_string())
                .spawn(move || run_tap_thread(pipeline, stop_requested, ready_tx))
                .map_err(|e| CaptureError::ThreadSpawn(e.to_string()))?
        };

        // The thread always reports before entering its run loop; a closed
        // channel means it died first.
        let run_loop = match ready_rx.recv() {
            Ok(Ok(run_loop)) => run_loop,
            Ok(Err(e)) => {
                let _ = handle.join();
                error!("event tap setup failed: {e}");
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(CaptureError::TapCreationFailed);
            }
        };

        *slot = Some(TapThread {
            run_loop,
            stop_requested,
            handle,
        });
        info!("event tap installed");
        Ok(())
    }

    fn stop(&self) {
        let Some(tap_thread) = self.thread.lock().take() else {
            return;
        };
        tap_thread.stop_requested.store(true, Ordering::Release);
        tap_thread.run_loop.stop();
        if tap_thread.handle.join().is_err() {
            warn!("event tap thread panicked during shutdown");
        }
        info!("event tap removed");
    }

    fn is_running(&self) -> bool {
        self.thread
            .lock()
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }
}

impl Drop for MacEventTap {
    fn drop(&mut self) {
        self.stop();
    }
}
