//! Insertion-ordered unique-key set.

use std::collections::HashMap;

/// A set of string keys that remembers first-seen order.
///
/// Re-inserting a key is a no-op that reports the key's original slot, so
/// feeding the same window twice yields the same set.
///
/// ```rust
/// use vista_adt::OrderedKeySet;
///
/// let mut ids = OrderedKeySet::new();
/// assert_eq!(ids.insert_full("77"), (0, true));
/// assert_eq!(ids.insert_full("12"), (1, true));
/// assert_eq!(ids.insert_full("77"), (0, false));
/// assert_eq!(ids.keys(), ["77", "12"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedKeySet {
    keys: Vec<String>,
    slots: HashMap<String, usize>,
}

impl OrderedKeySet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `key`; returns true if it was new.
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        self.insert_full(key).1
    }

    /// Inserts `key`; returns its slot and whether it was new.
    pub fn insert_full(&mut self, key: impl Into<String>) -> (usize, bool) {
        let key = key.into();
        if let Some(&slot) = self.slots.get(&key) {
            return (slot, false);
        }
        let slot = self.keys.len();
        self.slots.insert(key.clone(), slot);
        self.keys.push(key);
        (slot, true)
    }

    /// Slot of `key`, if present.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.slots.get(key).copied()
    }

    /// Returns true if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Keys in first-seen order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Iterates keys in first-seen order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.keys.iter()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Consumes the set, returning keys in first-seen order.
    pub fn into_keys(self) -> Vec<String> {
        self.keys
    }
}

impl<S: Into<String>> FromIterator<S> for OrderedKeySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = OrderedKeySet::new();
        set.extend(iter);
        set
    }
}

impl<S: Into<String>> Extend<S> for OrderedKeySet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl<'a> IntoIterator for &'a OrderedKeySet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_seen_order() {
        let set: OrderedKeySet = ["b", "a", "b", "c", "a"].into_iter().collect();
        assert_eq!(set.keys(), ["b", "a", "c"]);
        assert_eq!(set.position("c"), Some(2));
        assert!(set.contains("a"));
        assert!(!set.contains("z"));
    }

    #[test]
    fn test_empty() {
        let set = OrderedKeySet::new();
        assert!(set.is_empty());
        assert_eq!(set.iter().count(), 0);
    }

    proptest! {
        #[test]
        fn prop_idempotent(keys in proptest::collection::vec("[a-d]{1,2}", 0..40)) {
            let mut once = OrderedKeySet::new();
            once.extend(keys.iter().cloned());

            let mut twice = once.clone();
            twice.extend(keys.iter().cloned());

            prop_assert_eq!(once, twice);
        }
    }
}
