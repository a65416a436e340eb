//! Domain entities for Keyswap.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain** (or "entities" layer).  Domain code:
//!
//! - Contains the core business rules of the application.
//! - Has **no** imports from OS APIs, file systems, or UI frameworks.
//! - Can be compiled and tested on any platform without any external setup.
//!
//! Here that means: what a remap rule is, how modifier flags compare, and
//! the matcher that decides, per keystroke, whether a rule fires.  The
//! event-tap plumbing that feeds it lives in `keyswap-agent`.

/// The static table of predefined navigation/editing shortcuts.
pub mod catalog;
/// First-match-wins rule matcher.
pub mod matcher;
/// `CGEventFlags`-compatible modifier bit set.
pub mod modifiers;
/// The remap rule entity and its validation.
pub mod rule;
