//! EventSynthesizer: realises a matcher [`Action`] as what the tap returns.
//!
//! The event tap gives each callback one event and expects one answer: keep
//! it, drop it, or substitute another event.  [`Synthesizer::realize`] maps
//! the three matcher outcomes onto those answers:
//!
//! | Action        | Disposition                                            |
//! |---------------|--------------------------------------------------------|
//! | `Discard`     | `Consume`                                              |
//! | `Remap`       | `Replace` with a new event of the same up/down polarity |
//! | `PassThrough` | `Replace` with a rebuilt copy of the original          |
//!
//! A virtual Caps Lock edge (see `handle_event`) has no key event of its
//! own to rebuild, so passing one through forwards the original
//! flags-changed event instead.
//!
//! If the OS refuses to construct an event, that single event is forwarded
//! untouched rather than dropped.

use keyswap_core::{Action, ModifierFlags};
use thiserror::Error;
use tracing::debug;

/// A key event to construct, independent of any OS event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticKeyEvent {
    pub key_code: u16,
    pub modifiers: ModifierFlags,
    pub is_key_down: bool,
}

/// What the event tap should do with the event it is currently holding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition<E> {
    /// Return the original event unchanged.
    Forward,
    /// Drop the event; nothing is delivered downstream.
    Consume,
    /// Deliver this event in place of the original.
    Replace(E),
    /// The OS disabled the tap: re-enable it, then return the original event.
    ReEnableAndForward,
}

/// Error type for event construction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("the OS refused to construct key event {0:?}")]
    EventConstructionFailed(SyntheticKeyEvent),
}

/// Builds OS key events.
///
/// The production implementation creates `CGEvent`s; tests record the
/// requested events.
pub trait KeyEventFactory: Send + Sync {
    /// The OS event handed back to the tap.
    type Event;

    fn create_key_event(&self, event: SyntheticKeyEvent) -> Result<Self::Event, SynthesisError>;
}

/// The key event being decided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key_code: u16,
    pub flags: ModifierFlags,
    pub is_key_down: bool,
    /// `true` for the key-down/up synthesised from a Caps Lock flag change.
    pub is_virtual: bool,
}

impl KeyInput {
    pub fn physical(key_code: u16, flags: ModifierFlags, is_key_down: bool) -> Self {
        Self {
            key_code,
            flags,
            is_key_down,
            is_virtual: false,
        }
    }

    pub fn virtual_edge(key_code: u16, flags: ModifierFlags, is_key_down: bool) -> Self {
        Self {
            key_code,
            flags,
            is_key_down,
            is_virtual: true,
        }
    }
}

/// Turns actions into dispositions using a [`KeyEventFactory`].
pub struct Synthesizer<F> {
    factory: F,
}

impl<F: KeyEventFactory> Synthesizer<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }

    /// Decides the disposition of `input` given the matcher's `action`.
    pub fn realize(&self, action: Action, input: &KeyInput) -> Disposition<F::Event> {
        match action {
            Action::Discard => Disposition::Consume,
            Action::PassThrough if input.is_virtual => Disposition::Forward,
            Action::PassThrough => self.build(SyntheticKeyEvent {
                key_code: input.key_code,
                modifiers: input.flags,
                is_key_down: input.is_key_down,
            }),
            Action::Remap {
                key_code,
                modifiers,
            } => self.build(SyntheticKeyEvent {
                key_code,
                modifiers,
                is_key_down: input.is_key_down,
            }),
        }
    }

    fn build(&self, event: SyntheticKeyEvent) -> Disposition<F::Event> {
        match self.factory.create_key_event(event) {
            Ok(built) => Disposition::Replace(built),
            Err(e) => {
                debug!("{e}; forwarding the original event");
                Disposition::Forward
            }
        }
    }
}
