//! Insertion-ordered map and set.
//!
//! Entries live in a `Vec` in first-insertion order; a `HashMap` from key to
//! position gives O(1) lookup. Iteration order never depends on hashing.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

// ---------------------------------------------------------------------------
// OrderedMap
// ---------------------------------------------------------------------------

/// A map that iterates in the order keys were first inserted.
#[derive(Debug, Clone)]
pub struct OrderedMap<K, V> {
    entries: Vec<(K, V)>,
    index: HashMap<K, usize>,
}

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Hash + Eq + Clone, V> OrderedMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under `key` only if the key is new.
    ///
    /// Returns the rejected value when the key already exists, leaving the
    /// stored entry untouched.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<(), V> {
        if self.index.contains_key(&key) {
            return Err(value);
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        Ok(())
    }

    /// Return the value for `key`, inserting `V::default()` first if absent.
    pub fn entry_or_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        let pos = match self.index.get(&key) {
            Some(&pos) => pos,
            None => {
                let pos = self.entries.len();
                self.index.insert(key.clone(), pos);
                self.entries.push((key, V::default()));
                pos
            }
        };
        &mut self.entries[pos].1
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }
}

impl<K, V> IntoIterator for OrderedMap<K, V> {
    type Item = (K, V);
    type IntoIter = std::vec::IntoIter<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// ---------------------------------------------------------------------------
// OrderedSet
// ---------------------------------------------------------------------------

/// A set that iterates in first-seen order, backed by [`OrderedMap`].
#[derive(Debug, Clone)]
pub struct OrderedSet<T> {
    map: OrderedMap<T, ()>,
}

impl<T> Default for OrderedSet<T> {
    fn default() -> Self {
        Self {
            map: OrderedMap::default(),
        }
    }
}

impl<T: Hash + Eq + Clone> OrderedSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value`; returns `false` if it was already present.
    pub fn insert(&mut self, value: T) -> bool {
        self.map.try_insert(value, ()).is_ok()
    }

    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(value)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.map.keys()
    }

    /// Consume the set into a `Vec` in first-seen order.
    pub fn into_vec(self) -> Vec<T> {
        self.map.into_iter().map(|(k, ())| k).collect()
    }
}

impl<T: Hash + Eq + Clone> FromIterator<T> for OrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_keeps_first_insertion_order() {
        let mut map = OrderedMap::new();
        for key in ["zeta", "alpha", "mid"] {
            map.try_insert(key.to_string(), key.len()).unwrap();
        }
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn map_try_insert_rejects_existing_key() {
        let mut map = OrderedMap::new();
        map.try_insert("d1".to_string(), "first").unwrap();
        assert_eq!(map.try_insert("d1".to_string(), "second"), Err("second"));
        assert_eq!(map.get("d1"), Some(&"first"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn entry_or_default_accumulates_in_place() {
        let mut map: OrderedMap<String, Vec<u32>> = OrderedMap::new();
        map.entry_or_default("b".into()).push(1);
        map.entry_or_default("a".into()).push(2);
        map.entry_or_default("b".into()).push(3);

        let entries: Vec<_> = map.into_iter().collect();
        assert_eq!(entries, vec![("b".into(), vec![1, 3]), ("a".into(), vec![2])]);
    }

    #[test]
    fn set_dedups_preserving_first_seen() {
        let set: OrderedSet<&str> = ["d3", "d1", "d3", "d2", "d1"].into_iter().collect();
        assert_eq!(set.len(), 3);
        assert!(set.contains("d2"));
        assert_eq!(set.into_vec(), vec!["d3", "d1", "d2"]);
    }
}
