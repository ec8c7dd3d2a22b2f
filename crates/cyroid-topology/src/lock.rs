//! Per-range serialization for lifecycle plans (§4.4, §5).
//!
//! Mirrors the in-flight registry pattern from `cyroid-cache`'s registry:
//! a process-wide map of lightweight locks, one per range, taken for the
//! duration of a single plan so two plans on the same range never
//! interleave while plans on different ranges run fully in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cyroid_common::ids::RangeId;
use tokio::sync::Mutex as AsyncMutex;

/// Holds one [`tokio::sync::Mutex`] per range, created on first use.
#[derive(Default, Clone)]
pub struct RangeLocks {
    locks: Arc<Mutex<HashMap<RangeId, Arc<AsyncMutex<()>>>>>,
}

impl RangeLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `range_id`, creating it if this is the first
    /// reference.
    #[must_use]
    pub fn lock_for(&self, range_id: RangeId) -> Arc<AsyncMutex<()>> {
        let mut guard = self.locks.lock().expect("range lock table poisoned");
        Arc::clone(guard.entry(range_id).or_insert_with(|| Arc::new(AsyncMutex::new(()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_range_blocks_until_released() {
        let locks = RangeLocks::new();
        let range = RangeId::new();
        let first = locks.lock_for(range).lock_owned().await;
        let second_handle = locks.lock_for(range);
        let attempt = second_handle.clone().try_lock_owned();
        assert!(attempt.is_err());
        drop(first);
        assert!(second_handle.try_lock_owned().is_ok());
    }

    #[tokio::test]
    async fn distinct_ranges_use_distinct_locks() {
        let locks = RangeLocks::new();
        let a = locks.lock_for(RangeId::new());
        let b = locks.lock_for(RangeId::new());
        let _guard_a = a.lock_owned().await;
        assert!(b.try_lock_owned().is_ok());
    }
}
