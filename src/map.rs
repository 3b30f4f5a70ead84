//! Per-holder attribute cache.
//!
//! `AttributeMap` holds the computed attribute values of one holder. Each
//! entry moves Uncomputed -> Computed -> Invalidated -> Computed... as the
//! fit changes; computation itself lives in the calculation service, which
//! owns the cross-holder context (register, tracker, data source).
//!
//! A separate volatile overlay holds per-tick override values that stat
//! trackers set while sampling; those are cleared by `clear_volatile`
//! independently of structural invalidation.

use crate::expression::AttrId;
use std::collections::HashMap;

/// Cached attribute values of one holder.
#[derive(Debug, Default)]
pub struct AttributeMap {
    values: HashMap<AttrId, f64>,
    overrides: HashMap<AttrId, f64>,
    computations: u64,
}

impl AttributeMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Cached value, if this entry is in the Computed state.
    pub fn cached(&self, attr: AttrId) -> Option<f64> {
        self.values.get(&attr).copied()
    }

    /// Volatile override, if one is set. Overrides win over computed values
    /// until the next `clear_volatile`.
    pub fn override_value(&self, attr: AttrId) -> Option<f64> {
        self.overrides.get(&attr).copied()
    }

    /// Store a freshly computed value and count the computation.
    pub(crate) fn store(&mut self, attr: AttrId, value: f64) {
        self.computations += 1;
        self.values.insert(attr, value);
    }

    /// Drop one cached entry (Invalidated state).
    pub(crate) fn invalidate(&mut self, attr: AttrId) {
        self.values.remove(&attr);
    }

    /// Drop every cached entry.
    pub(crate) fn invalidate_all(&mut self) {
        self.values.clear();
    }

    /// Attributes currently cached. Used to scope cascade invalidation.
    pub(crate) fn cached_attrs(&self) -> Vec<AttrId> {
        self.values.keys().copied().collect()
    }

    /// Set a volatile override for the next sampling tick.
    pub fn set_override(&mut self, attr: AttrId, value: f64) {
        self.overrides.insert(attr, value);
    }

    /// Attributes currently overridden. Used to invalidate their dependents
    /// when the overlay is cleared.
    pub(crate) fn overridden_attrs(&self) -> Vec<AttrId> {
        self.overrides.keys().copied().collect()
    }

    /// Clear the volatile overlay. Cached computed values survive.
    pub(crate) fn clear_volatile(&mut self) {
        self.overrides.clear();
    }

    /// How many computations this map has stored. Test observability for
    /// cache idempotence.
    pub fn calculation_count(&self) -> u64 {
        self.computations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_invalidate() {
        let mut map = AttributeMap::new();
        let attr = AttrId(37);

        assert_eq!(map.cached(attr), None);
        map.store(attr, 100.0);
        assert_eq!(map.cached(attr), Some(100.0));
        assert_eq!(map.calculation_count(), 1);

        map.invalidate(attr);
        assert_eq!(map.cached(attr), None);
        // The counter keeps history; it only moves on store.
        assert_eq!(map.calculation_count(), 1);
    }

    #[test]
    fn test_volatile_overlay_is_independent() {
        let mut map = AttributeMap::new();
        let attr = AttrId(5);

        map.store(attr, 10.0);
        map.set_override(attr, 99.0);
        assert_eq!(map.override_value(attr), Some(99.0));
        assert_eq!(map.cached(attr), Some(10.0));

        map.clear_volatile();
        assert_eq!(map.override_value(attr), None);
        assert_eq!(map.cached(attr), Some(10.0));
    }

    #[test]
    fn test_invalidate_all() {
        let mut map = AttributeMap::new();
        map.store(AttrId(1), 1.0);
        map.store(AttrId(2), 2.0);
        assert_eq!(map.cached_attrs().len(), 2);

        map.invalidate_all();
        assert!(map.cached_attrs().is_empty());
    }
}
