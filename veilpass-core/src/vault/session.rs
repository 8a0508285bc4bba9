//! Session-scoped activity markers.
//!
//! An [`ActivityStore`] persists nothing but the last-activity Unix
//! timestamp in milliseconds. It deliberately cannot hold key material:
//! in a browser deployment the backing store is per-tab session storage,
//! which survives a page reload but not a closed tab, so a reload within
//! the timeout resumes the unlocked session while a fresh tab always
//! starts locked.

use parking_lot::Mutex;

/// Where the last-activity timestamp lives.
///
/// When a store is attached to the key manager it is authoritative: an
/// absent or stale marker means the vault is locked, whatever the
/// in-memory state says.
pub trait ActivityStore: Send + Sync {
    /// Last-activity timestamp in Unix milliseconds, if present.
    fn load(&self) -> Option<i64>;

    /// Record activity at the given timestamp.
    fn store(&self, timestamp_millis: i64);

    /// Remove the marker entirely.
    fn clear(&self);
}

/// In-memory activity store.
#[derive(Default)]
pub struct MemoryActivityStore {
    slot: Mutex<Option<i64>>,
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActivityStore for MemoryActivityStore {
    fn load(&self) -> Option<i64> {
        *self.slot.lock()
    }

    fn store(&self, timestamp_millis: i64) {
        *self.slot.lock() = Some(timestamp_millis);
    }

    fn clear(&self) {
        *self.slot.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_load_clear() {
        let store = MemoryActivityStore::new();
        assert_eq!(store.load(), None);
        store.store(1_700_000_000_000);
        assert_eq!(store.load(), Some(1_700_000_000_000));
        store.clear();
        assert_eq!(store.load(), None);
    }
}
