//! Incrementally-Resized Hash Table
//!
//! This module implements the storage core of emberkv: a chained hash
//! table that grows by *incremental migration* instead of a stop-the-world
//! rehash.
//!
//! ## Two-Table Scheme
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Dict                              │
//! │                                                             │
//! │   primary (new, 2x buckets)        secondary (old)          │
//! │  ┌────┬────┬────┬────┬────┐       ┌────┬────┬────┬────┐     │
//! │  │ b0 │ b1 │ b2 │ .. │ bN │ <──── │ b0 │ b1 │ .. │ bM │     │
//! │  └────┴────┴────┴────┴────┘  move └────┴────┴────┴────┘     │
//! │                               128        ▲                  │
//! │                             per op   migrate_pos            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! When the primary table's load factor reaches [`LOAD_FACTOR`], the
//! primary becomes the secondary and a fresh primary with double the
//! bucket count is installed. Every subsequent table operation moves up
//! to [`MIGRATION_QUOTA`] entries from the secondary into the primary
//! before doing its own work, so no single client-facing call ever pays
//! for a full rehash. While the secondary exists, every live key resides
//! in exactly one of the two tables and lookups consult both.
//!
//! Buckets are growable vectors of owned entries rather than intrusive
//! linked nodes; index = `hash & (bucket_count - 1)`, which requires the
//! bucket count to be a power of two.

use bytes::Bytes;

/// Load factor (entries per bucket) at which the primary table grows.
pub const LOAD_FACTOR: usize = 8;

/// Maximum number of entries moved from the secondary table per
/// operation while a resize is in progress.
pub const MIGRATION_QUOTA: usize = 128;

/// Bucket count of a freshly created dict.
const INITIAL_CAPACITY: usize = 4;

/// FNV-1a offset basis.
const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
/// FNV-1a prime.
const FNV_PRIME: u64 = 0x1_0000_0000_01b3;

/// Deterministic 64-bit FNV-1a hash over key bytes.
#[inline]
pub fn hash_key(key: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &byte in key {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// An owned key/value pair plus the cached hash of its key.
#[derive(Debug, Clone)]
struct Entry {
    hash: u64,
    key: Bytes,
    value: Bytes,
}

/// One chained hash table: a power-of-two array of buckets.
#[derive(Debug)]
struct Table {
    buckets: Vec<Vec<Entry>>,
    mask: u64,
    len: usize,
}

impl Table {
    /// Creates a table with `capacity` buckets.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not a strictly positive power of two.
    /// The growth policy only ever doubles, so a violation here means a
    /// broken invariant, not a client-triggerable condition.
    fn new(capacity: usize) -> Self {
        assert!(
            capacity > 0 && capacity.is_power_of_two(),
            "table capacity must be a strictly positive power of two, got {}",
            capacity
        );
        Self {
            buckets: (0..capacity).map(|_| Vec::new()).collect(),
            mask: (capacity - 1) as u64,
            len: 0,
        }
    }

    #[inline]
    fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    fn bucket_index(&self, hash: u64) -> usize {
        (hash & self.mask) as usize
    }

    fn insert(&mut self, entry: Entry) {
        let idx = self.bucket_index(entry.hash);
        self.buckets[idx].push(entry);
        self.len += 1;
    }

    fn find(&self, hash: u64, key: &[u8]) -> Option<&Entry> {
        let idx = self.bucket_index(hash);
        self.buckets[idx]
            .iter()
            .find(|e| e.hash == hash && e.key == key)
    }

    fn find_mut(&mut self, hash: u64, key: &[u8]) -> Option<&mut Entry> {
        let idx = self.bucket_index(hash);
        self.buckets[idx]
            .iter_mut()
            .find(|e| e.hash == hash && e.key == key)
    }

    /// Removes and returns the matching entry, if present.
    fn detach(&mut self, hash: u64, key: &[u8]) -> Option<Entry> {
        let idx = self.bucket_index(hash);
        let bucket = &mut self.buckets[idx];
        let pos = bucket.iter().position(|e| e.hash == hash && e.key == key)?;
        self.len -= 1;
        Some(bucket.swap_remove(pos))
    }
}

/// The key-value table: a primary hash table, an optional old table
/// being drained, and the migration cursor between them.
///
/// All operations take `&mut self`: even lookups advance the incremental
/// migration when a resize is in progress. The dict is owned by the
/// serving path and shared behind a single lock; see the commands module.
///
/// # Example
///
/// ```
/// use emberkv::storage::Dict;
/// use bytes::Bytes;
///
/// let mut dict = Dict::new();
/// dict.set(Bytes::from("name"), Bytes::from("ember"));
/// assert_eq!(dict.get(b"name"), Some(Bytes::from("ember")));
/// assert!(dict.remove(b"name"));
/// assert_eq!(dict.get(b"name"), None);
/// ```
#[derive(Debug)]
pub struct Dict {
    primary: Table,
    secondary: Option<Table>,
    migrate_pos: usize,
}

impl Default for Dict {
    fn default() -> Self {
        Self::new()
    }
}

impl Dict {
    /// Creates an empty dict with the default initial capacity.
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    /// Creates an empty dict with the given initial bucket count.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not a strictly positive power of two.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            primary: Table::new(capacity),
            secondary: None,
            migrate_pos: 0,
        }
    }

    /// Number of live entries across both tables.
    pub fn len(&self) -> usize {
        self.primary.len + self.secondary.as_ref().map_or(0, |t| t.len)
    }

    /// Returns true if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true while an incremental resize is draining the old table.
    pub fn is_migrating(&self) -> bool {
        self.secondary.is_some()
    }

    /// Looks up a key, returning a cheap clone of the stored value.
    ///
    /// Consults the primary table first, then the secondary: a key may
    /// not have been migrated yet.
    pub fn get(&mut self, key: &[u8]) -> Option<Bytes> {
        self.migrate_step();
        let hash = hash_key(key);
        self.primary
            .find(hash, key)
            .or_else(|| self.secondary.as_ref().and_then(|t| t.find(hash, key)))
            .map(|e| e.value.clone())
    }

    /// Inserts a key or replaces the value of an existing one in place.
    pub fn set(&mut self, key: Bytes, value: Bytes) {
        self.migrate_step();
        let hash = hash_key(&key);

        if let Some(entry) = self.primary.find_mut(hash, &key) {
            entry.value = value;
            return;
        }
        if let Some(entry) = self.secondary.as_mut().and_then(|t| t.find_mut(hash, &key)) {
            entry.value = value;
            return;
        }

        self.primary.insert(Entry { hash, key, value });
        self.maybe_grow();
    }

    /// Removes a key from whichever table holds it.
    ///
    /// # Returns
    ///
    /// `true` if a key was removed, `false` if it was absent.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        self.migrate_step();
        let hash = hash_key(key);
        if self.primary.detach(hash, key).is_some() {
            return true;
        }
        self.secondary
            .as_mut()
            .and_then(|t| t.detach(hash, key))
            .is_some()
    }

    /// Enumerates every live key across both tables, order unspecified.
    pub fn keys(&self) -> Vec<Bytes> {
        let mut keys = Vec::with_capacity(self.len());
        for bucket in &self.primary.buckets {
            keys.extend(bucket.iter().map(|e| e.key.clone()));
        }
        if let Some(secondary) = &self.secondary {
            for bucket in &secondary.buckets {
                keys.extend(bucket.iter().map(|e| e.key.clone()));
            }
        }
        keys
    }

    /// Starts a resize when the primary's load factor crosses the
    /// threshold and no migration is already running.
    fn maybe_grow(&mut self) {
        if self.secondary.is_some() {
            return;
        }
        if self.primary.len / self.primary.bucket_count() < LOAD_FACTOR {
            return;
        }
        let doubled = Table::new(self.primary.bucket_count() * 2);
        self.secondary = Some(std::mem::replace(&mut self.primary, doubled));
        self.migrate_pos = 0;
    }

    /// Moves up to [`MIGRATION_QUOTA`] entries from the secondary table
    /// into the primary, advancing the bucket cursor monotonically.
    /// Discards the secondary once it is fully drained.
    fn migrate_step(&mut self) {
        let Some(secondary) = self.secondary.as_mut() else {
            return;
        };

        let mut moved = 0;
        while moved < MIGRATION_QUOTA && secondary.len > 0 {
            // Buckets before the cursor are already drained; the cursor
            // never moves backwards.
            let bucket = &mut secondary.buckets[self.migrate_pos];
            match bucket.pop() {
                Some(entry) => {
                    secondary.len -= 1;
                    self.primary.insert(entry);
                    moved += 1;
                }
                None => self.migrate_pos += 1,
            }
        }

        let drained = secondary.len == 0;
        if drained {
            self.secondary = None;
            self.migrate_pos = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn test_set_get_remove() {
        let mut dict = Dict::new();
        assert_eq!(dict.get(b"name"), None);

        dict.set(b("name"), b("ember"));
        assert_eq!(dict.get(b"name"), Some(b("ember")));
        assert_eq!(dict.len(), 1);

        assert!(dict.remove(b"name"));
        assert!(!dict.remove(b"name"));
        assert_eq!(dict.get(b"name"), None);
        assert!(dict.is_empty());
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut dict = Dict::new();
        dict.set(b("k"), b("v1"));
        dict.set(b("k"), b("v2"));
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get(b"k"), Some(b("v2")));
    }

    #[test]
    fn test_empty_key_and_value() {
        let mut dict = Dict::new();
        dict.set(Bytes::new(), Bytes::new());
        assert_eq!(dict.get(b""), Some(Bytes::new()));
        assert!(dict.remove(b""));
    }

    #[test]
    fn test_binary_keys() {
        let mut dict = Dict::new();
        let key = Bytes::from(vec![0u8, 1, 2, 255]);
        dict.set(key.clone(), b("bin"));
        assert_eq!(dict.get(&key), Some(b("bin")));
    }

    #[test]
    fn test_growth_keeps_all_keys_retrievable() {
        let mut dict = Dict::with_capacity(4);
        let n = 2000;
        for i in 0..n {
            dict.set(b(&format!("key:{}", i)), b(&format!("val:{}", i)));
        }
        assert_eq!(dict.len(), n);
        // Resizes have certainly been triggered well below n entries.
        for i in 0..n {
            assert_eq!(
                dict.get(format!("key:{}", i).as_bytes()),
                Some(b(&format!("val:{}", i))),
                "key:{} lost",
                i
            );
        }
    }

    #[test]
    fn test_lookup_during_migration() {
        let mut dict = Dict::with_capacity(4);
        // Push the load factor to the threshold so the resize starts.
        let n = 4 * LOAD_FACTOR + 1;
        for i in 0..n {
            dict.set(b(&format!("k{}", i)), b(&format!("v{}", i)));
        }
        // With fewer entries than the quota the resize drains quickly,
        // but every key must be visible no matter which table holds it.
        for i in 0..n {
            assert_eq!(
                dict.get(format!("k{}", i).as_bytes()),
                Some(b(&format!("v{}", i)))
            );
        }
    }

    #[test]
    fn test_migration_completes_within_bounded_ops() {
        let mut dict = Dict::with_capacity(4);
        let mut n = 0;
        // Insert until a migration is actually in progress.
        while !dict.is_migrating() {
            dict.set(b(&format!("k{}", n)), b("v"));
            n += 1;
            assert!(n < 1_000_000, "resize never triggered");
        }
        // Each subsequent operation moves up to MIGRATION_QUOTA entries,
        // so the old table drains within len/quota calls (plus slack for
        // the call that discards the empty table).
        let bound = n / MIGRATION_QUOTA + 2;
        let mut ops = 0;
        while dict.is_migrating() {
            dict.get(b"absent");
            ops += 1;
            assert!(ops <= bound, "migration not finished after {} ops", ops);
        }
        // Nothing was lost along the way.
        for i in 0..n {
            assert!(dict.get(format!("k{}", i).as_bytes()).is_some());
        }
    }

    #[test]
    fn test_remove_during_migration() {
        let mut dict = Dict::with_capacity(4);
        let mut n = 0;
        while !dict.is_migrating() {
            dict.set(b(&format!("k{}", n)), b("v"));
            n += 1;
        }
        // Some of these still live in the secondary table.
        for i in 0..n {
            assert!(dict.remove(format!("k{}", i).as_bytes()), "k{} missing", i);
        }
        assert!(dict.is_empty());
    }

    #[test]
    fn test_keys_matches_live_set() {
        let mut dict = Dict::with_capacity(4);
        let mut expected = BTreeSet::new();
        for i in 0..500 {
            dict.set(b(&format!("k{}", i)), b("v"));
            expected.insert(format!("k{}", i).into_bytes());
        }
        for i in (0..500).step_by(3) {
            dict.remove(format!("k{}", i).as_bytes());
            expected.remove(format!("k{}", i).as_bytes());
        }
        let actual: BTreeSet<Vec<u8>> = dict.keys().iter().map(|k| k.to_vec()).collect();
        assert_eq!(actual, expected);
        assert_eq!(dict.len(), expected.len());
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_key(b"hello"), hash_key(b"hello"));
        assert_ne!(hash_key(b"hello"), hash_key(b"olleh"));
        assert_ne!(hash_key(b""), hash_key(b"\0"));
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_capacity_must_be_power_of_two() {
        let _ = Dict::with_capacity(3);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_capacity_must_be_positive() {
        let _ = Dict::with_capacity(0);
    }
}
