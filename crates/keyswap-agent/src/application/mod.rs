//! Application layer use cases for the Keyswap agent.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure business rules in `keyswap-core`) and the infrastructure (event
//! taps, files, Objective-C notifications).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects to fulfil a user goal (e.g., "turn this
//!   Home key press into ⌘←").
//! - **Depend on abstractions** (traits) rather than concrete implementations,
//!   so the macOS adapters can be swapped for test doubles.
//! - **Contain no OS calls and no file system access**.
//!
//! # Sub-modules
//!
//! - **`handle_event`** – The per-event pipeline run inline on the event-tap
//!   thread: Caps Lock edge detection, matching, and tap re-enable handling.
//!   This is the hot path; it runs on every keystroke.
//!
//! - **`synthesize`** – Turns a matcher [`Action`](keyswap_core::Action) into
//!   what the tap should do with the event (consume, replace, forward).
//!
//! - **`manage_rules`** – The ordered rule list, its persistence, and the
//!   enabled-rules snapshot the hot path reads.
//!
//! - **`app_context`** – The cached frontmost application id.
//!
//! - **`permission_watch`** – Polls Accessibility trust and starts/stops the
//!   event tap accordingly.
//!
//! - **`snapshot`** – The publish/read cell both shared values live in.

pub mod app_context;
pub mod handle_event;
pub mod manage_rules;
pub mod permission_watch;
pub mod snapshot;
pub mod synthesize;
