//! EventPipeline: the logic run inline for every event the tap delivers.
//!
//! This is the most latency-critical code in Keyswap.  The macOS event tap
//! calls [`EventPipeline::handle`] synchronously, on its own thread, for every
//! key-down, key-up and modifier change on the system, and waits for the
//! answer before the keystroke reaches any application.  If the answer takes
//! too long the OS disables the tap.
//!
//! The pipeline therefore never blocks: it reads the published rule snapshot
//! and the cached frontmost app (a pointer copy each), runs the pure matcher,
//! and asks the synthesizer for a [`Disposition`].
//!
//! # Caps Lock (for beginners)
//!
//! macOS never sends key-down/key-up events for Caps Lock.  Pressing it only
//! produces a *flags-changed* event whose Caps Lock bit reflects the new
//! lock state.  To let Caps Lock take part in ordinary rules the pipeline
//! remembers the last lock state it saw and, whenever a flags-changed event
//! flips it, feeds exactly one virtual key-down (lock turned on) or key-up
//! (lock turned off) for key 57 through the matcher.  Flags-changed events
//! that do not flip the lock (Shift, Command, … on their own) are forwarded
//! untouched.
//!
//! # Tap disabled
//!
//! When the OS disables the tap (callback too slow, or secure input), it
//! tells the tap with a special event type.  That arrives here as
//! [`TapEvent::TapDisabled`] and is answered with
//! [`Disposition::ReEnableAndForward`]; it is never dropped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use keyswap_core::keymap::macos_cg::KEY_CAPS_LOCK;
use keyswap_core::{match_event, Action, ModifierFlags};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::app_context::AppContextTracker;
use super::manage_rules::RuleSnapshot;
use super::synthesize::{Disposition, KeyEventFactory, KeyInput, Synthesizer};

/// Why the OS disabled the tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapDisableReason {
    /// The callback took too long.
    Timeout,
    /// Secure input or a similar user-triggered sequence.
    UserInput,
}

/// One event delivered by the tap, already decoded from the OS event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapEvent {
    KeyDown { key_code: u16, flags: ModifierFlags },
    KeyUp { key_code: u16, flags: ModifierFlags },
    FlagsChanged { key_code: u16, flags: ModifierFlags },
    TapDisabled { reason: TapDisableReason },
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub events_seen: u64,
    pub events_remapped: u64,
    pub events_discarded: u64,
    pub tap_reenables: u64,
}

#[derive(Debug, Default)]
struct Counters {
    events_seen: AtomicU64,
    events_remapped: AtomicU64,
    events_discarded: AtomicU64,
    tap_reenables: AtomicU64,
}

/// Per-event decision pipeline shared between the tap thread and the agent.
pub struct EventPipeline<F: KeyEventFactory> {
    rules: Arc<RuleSnapshot>,
    app_context: Arc<AppContextTracker>,
    synthesizer: Synthesizer<F>,
    /// Last observed Caps Lock state.
    caps_lock_active: AtomicBool,
    suspended: AtomicBool,
    counters: Counters,
}

impl<F: KeyEventFactory> EventPipeline<F> {
    pub fn new(rules: Arc<RuleSnapshot>, app_context: Arc<AppContextTracker>, factory: F) -> Self {
        Self {
            rules,
            app_context,
            synthesizer: Synthesizer::new(factory),
            caps_lock_active: AtomicBool::new(false),
            suspended: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    /// Decides what the tap does with `event`.
    pub fn handle(&self, event: TapEvent) -> Disposition<F::Event> {
        match event {
            TapEvent::TapDisabled { reason } => {
                self.counters.tap_reenables.fetch_add(1, Ordering::Relaxed);
                warn!(?reason, "event tap was disabled by the OS; re-enabling");
                Disposition::ReEnableAndForward
            }
            TapEvent::FlagsChanged { key_code, flags } => {
                self.counters.events_seen.fetch_add(1, Ordering::Relaxed);
                self.handle_flags_changed(key_code, flags)
            }
            TapEvent::KeyDown { key_code, flags } => {
                self.counters.events_seen.fetch_add(1, Ordering::Relaxed);
                self.dispatch(KeyInput::physical(key_code, flags, true))
            }
            TapEvent::KeyUp { key_code, flags } => {
                self.counters.events_seen.fetch_add(1, Ordering::Relaxed);
                self.dispatch(KeyInput::physical(key_code, flags, false))
            }
        }
    }

    fn handle_flags_changed(&self, key_code: u16, flags: ModifierFlags) -> Disposition<F::Event> {
        let now_active = flags.caps_lock();
        let was_active = self.caps_lock_active.swap(now_active, Ordering::AcqRel);
        if was_active == now_active {
            return Disposition::Forward;
        }
        if self.is_suspended() {
            return Disposition::Forward;
        }
        debug!(key_code, now_active, "caps lock transition");
        // The lock bit is the state being toggled, not a held modifier.
        let input = KeyInput::virtual_edge(
            KEY_CAPS_LOCK,
            flags.without(ModifierFlags::CAPS_LOCK),
            now_active,
        );
        self.dispatch(input)
    }

    fn dispatch(&self, input: KeyInput) -> Disposition<F::Event> {
        if self.is_suspended() {
            return Disposition::Forward;
        }

        let rules = self.rules.load();
        let frontmost = self.app_context.current();
        let action = match_event(
            input.key_code,
            input.flags,
            frontmost.as_deref(),
            input.is_key_down,
            &rules,
        );

        match action {
            Action::PassThrough => {}
            Action::Discard => {
                self.counters.events_discarded.fetch_add(1, Ordering::Relaxed);
            }
            Action::Remap { .. } => {
                self.counters.events_remapped.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.synthesizer.realize(action, &input)
    }

    /// Seeds the tracked Caps Lock state, e.g. from the current hardware
    /// flags when the tap starts, so the first flag change is judged
    /// correctly.
    pub fn sync_caps_lock(&self, active: bool) {
        self.caps_lock_active.store(active, Ordering::Release);
    }

    /// Returns the tracked Caps Lock state.
    pub fn caps_lock_active(&self) -> bool {
        self.caps_lock_active.load(Ordering::Acquire)
    }

    /// Forwards every event untouched until [`resume`](Self::resume), so a
    /// key-capture UI sees raw keys.
    pub fn suspend(&self) {
        if !self.suspended.swap(true, Ordering::AcqRel) {
            info!("remapping suspended");
        }
    }

    pub fn resume(&self) {
        if self.suspended.swap(false, Ordering::AcqRel) {
            info!("remapping resumed");
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            events_seen: self.counters.events_seen.load(Ordering::Relaxed),
            events_remapped: self.counters.events_remapped.load(Ordering::Relaxed),
            events_discarded: self.counters.events_discarded.load(Ordering::Relaxed),
            tap_reenables: self.counters.tap_reenables.load(Ordering::Relaxed),
        }
    }
}

/// The pipeline operations the UI bridge needs, independent of the event
/// type the pipeline produces.
pub trait PipelineControl: Send + Sync {
    fn suspend(&self);
    fn resume(&self);
    fn is_suspended(&self) -> bool;
    fn stats(&self) -> PipelineStats;
}

impl<F: KeyEventFactory> PipelineControl for EventPipeline<F> {
    fn suspend(&self) {
        EventPipeline::suspend(self)
    }

    fn resume(&self) {
        EventPipeline::resume(self)
    }

    fn is_suspended(&self) -> bool {
        EventPipeline::is_suspended(self)
    }

    fn stats(&self) -> PipelineStats {
        EventPipeline::stats(self)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
