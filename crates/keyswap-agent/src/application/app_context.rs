//! AppContextTracker: the cached identifier of the frontmost application.
//!
//! App filters need to know which application is in front on every
//! keystroke, but asking the OS from inside the event-tap callback is far too
//! slow.  Instead the activation observer (see
//! `infrastructure::app_activation`) pushes each new bundle id here as it
//! happens, and the callback only ever reads the cached value.

use std::sync::Arc;

use tracing::debug;

use super::snapshot::SnapshotCell;

/// Holds the bundle id of the frontmost application, if known.
#[derive(Debug, Default)]
pub struct AppContextTracker {
    frontmost: SnapshotCell<Option<Arc<str>>>,
}

impl AppContextTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached frontmost bundle id.  Never calls the OS.
    pub fn current(&self) -> Option<Arc<str>> {
        self.frontmost.load()
    }

    /// Records an activation.  An empty id (processes without a bundle) is
    /// stored as unknown.
    pub fn set_frontmost(&self, bundle_id: Option<&str>) {
        let value = bundle_id.filter(|id| !id.is_empty()).map(Arc::<str>::from);
        if self.frontmost.load() == value {
            return;
        }
        debug!(frontmost = ?value, "frontmost application changed");
        self.frontmost.publish(value);
    }
}
