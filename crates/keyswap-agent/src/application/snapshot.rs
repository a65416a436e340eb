//! Single-slot publish/read cell for values shared with the event-tap thread.
//!
//! Writers build a complete new value and [`SnapshotCell::publish`] it;
//! readers [`SnapshotCell::load`] a clone of whatever was last published.
//! `T` is meant to be pointer-sized and cheap to clone (`Arc<[Rule]>`,
//! `Option<Arc<str>>`), so the read lock is held only for a pointer copy and
//! a reader never observes a half-updated value.

use parking_lot::RwLock;

/// A value that is replaced wholesale, never mutated in place.
#[derive(Debug, Default)]
pub struct SnapshotCell<T: Clone> {
    slot: RwLock<T>,
}

impl<T: Clone> SnapshotCell<T> {
    pub fn new(initial: T) -> Self {
        Self {
            slot: RwLock::new(initial),
        }
    }

    /// Returns the most recently published value.
    pub fn load(&self) -> T {
        self.slot.read().clone()
    }

    /// Replaces the current value.  Readers that already loaded keep their
    /// old copy.
    pub fn publish(&self, value: T) {
        let previous = std::mem::replace(&mut *self.slot.write(), value);
        // Drop the old value outside the write lock.
        drop(previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_load_returns_last_published_value() {
        let cell = SnapshotCell::new(Arc::<[u32]>::from(vec![1, 2]));
        cell.publish(Arc::from(vec![3]));
        assert_eq!(&*cell.load(), &[3]);
    }

    #[test]
    fn test_earlier_load_is_unaffected_by_later_publish() {
        // Arrange
        let cell = SnapshotCell::new(Some(Arc::<str>::from("app.editor")));
        let before = cell.load();

        // Act
        cell.publish(None);

        // Assert
        assert_eq!(before.as_deref(), Some("app.editor"));
        assert_eq!(cell.load(), None);
    }

    #[test]
    fn test_concurrent_readers_see_complete_values() {
        // Arrange – every published list has all elements equal to its length
        let cell = Arc::new(SnapshotCell::new(Arc::<[usize]>::from(vec![])));
        let writer = {
            let cell = Arc::clone(&cell);
            std::thread::spawn(move || {
                for n in 1..200usize {
                    cell.publish(Arc::from(vec![n; n]));
                }
            })
        };

        // Act / Assert
        for _ in 0..1000 {
            let list = cell.load();
            assert!(list.iter().all(|&v| v == list.len()));
        }
        writer.join().unwrap();
    }
}
