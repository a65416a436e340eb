//! Infrastructure layer for the Keyswap agent.
//!
//! Contains OS-facing adapters: the keyboard event tap, the frontmost-app
//! observer, the Accessibility trust probe, file-system storage, and the
//! command bridge used by the CLI.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `keyswap_core`.  The `application` layer only names the `EventTap` and
//! `PermissionProbe` seams (and their test doubles) from here; the domain
//! crate never imports it.

pub mod app_activation;
pub mod input_capture;
pub mod permission;
pub mod storage;
pub mod ui_bridge;
