//! # Latest Value Cache
//!
//! Most recent sample per wire id, plus the most recent basic info record.
//! Written only by the receive loop; read by anyone.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::protocol::PlaneInfo;

/// Latest received values.
#[derive(Default)]
pub struct LatestValueCache {
    /// id -> last sample. Absent means no data yet.
    values: Mutex<HashMap<i32, f32>>,
    /// Last basic info. `None` until the first `RPOS` reply.
    info: Mutex<Option<PlaneInfo>>,
}

impl LatestValueCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a batch of samples under one lock, in order (last write wins).
    pub fn store_all(&self, updates: &[(i32, f32)]) {
        let mut values = self.values.lock();
        for &(id, value) in updates {
            values.insert(id, value);
        }
    }

    /// Latest sample of `id`.
    #[must_use]
    pub fn value(&self, id: i32) -> Option<f32> {
        self.values.lock().get(&id).copied()
    }

    /// Reads `len` consecutive ids starting at `first`.
    ///
    /// `None` unless every one of them has a sample.
    #[must_use]
    pub fn range(&self, first: i32, len: usize) -> Option<Vec<f32>> {
        let values = self.values.lock();
        (first..).take(len).map(|id| values.get(&id).copied()).collect()
    }

    /// Replaces the basic info record.
    pub fn store_info(&self, info: PlaneInfo) {
        *self.info.lock() = Some(info);
    }

    /// Latest basic info record.
    #[must_use]
    pub fn info(&self) -> Option<PlaneInfo> {
        *self.info.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_until_stored() {
        let cache = LatestValueCache::new();
        assert_eq!(cache.value(0), None);
        cache.store_all(&[(0, 3.5)]);
        assert_eq!(cache.value(0), Some(3.5));
    }

    #[test]
    fn test_last_write_wins() {
        let cache = LatestValueCache::new();
        cache.store_all(&[(1, 1.0), (2, 2.0), (1, 4.0)]);
        assert_eq!(cache.value(1), Some(4.0));
        assert_eq!(cache.value(2), Some(2.0));
    }

    #[test]
    fn test_range_requires_every_id() {
        let cache = LatestValueCache::new();
        cache.store_all(&[(2, 0.2), (3, 0.3)]);
        assert_eq!(cache.range(2, 3), None);
        cache.store_all(&[(4, 0.4)]);
        assert_eq!(cache.range(2, 3), Some(vec![0.2, 0.3, 0.4]));
        assert_eq!(cache.range(2, 0), Some(vec![]));
    }

    #[test]
    fn test_info() {
        let cache = LatestValueCache::new();
        assert!(cache.info().is_none());
        let info = PlaneInfo { altitude: 1200.0, ..Default::default() };
        cache.store_info(info);
        assert_eq!(cache.info(), Some(info));
    }
}
