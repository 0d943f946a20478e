use super::entry::{clamp_increment, Generation, Slab};
use super::ring::Ring;
use super::stats::{GenerationStats, Stats};
use super::{CacheBuilder, Iter};
use crate::error::CacheError;
use crate::weigher::{constant_weigher, Weigher};
use crate::Policy;

use std::{
    borrow::Borrow,
    collections::hash_map::RandomState,
    collections::HashMap,
    fmt,
    hash::{BuildHasher, Hash},
    rc::Rc,
};

/// `age_period = age_factor * |index|`, the adaptive ageing schedule default.
pub(crate) const DEFAULT_AGE_FACTOR: u64 = 10;

/// An in-memory, size-bounded, single-threaded cache implementing the
/// W-TinyLFU family of admission/eviction policies.
///
/// Entries live in one of three generations — *eden* (small, every new entry
/// lands here), *probation* (candidates for eviction), and *protected*
/// (survived at least one probation hit) — and a per-entry frequency counter
/// arbitrates both which generation an entry is promoted/demoted to and, via
/// the TinyLFU admission contest, whether a new arrival is even worth
/// keeping over the generation's current LRU occupant.
///
/// `Cache` is not thread-safe: every mutating entry point (`set`, `delete`,
/// `get_and_touch`, the stream methods) must be externally serialized by the
/// caller, typically behind a single mutex.
pub struct Cache<K, V, S = RandomState> {
    pub(crate) limit: u64,
    pub(crate) max_value_weight: Option<u64>,
    pub(crate) key_weight: Weigher<K>,
    pub(crate) value_weight: Weigher<V>,
    pub(crate) age_factor: u64,

    pub(crate) index: HashMap<Rc<K>, usize, S>,
    pub(crate) slab: Slab<K, V>,
    pub(crate) eden: Ring,
    pub(crate) probation: Ring,
    pub(crate) protected: Ring,

    pub(crate) hits: u64,
    pub(crate) misses: u64,
    pub(crate) sets: u64,
    pub(crate) aged_at: u64,
    pub(crate) next_age_at: u64,

    pub(crate) build_hasher: S,
}

impl<K, V, S> fmt::Debug for Cache<K, V, S>
where
    K: fmt::Debug + Eq + Hash,
    V: fmt::Debug,
    S: BuildHasher + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d_map = f.debug_map();
        for (k, v) in self.iter() {
            d_map.entry(&k, &v);
        }
        d_map.finish()
    }
}

impl<K, V> Cache<K, V, RandomState>
where
    K: Hash + Eq,
{
    /// Constructs a new `Cache<K, V>` with a total byte-weight budget of
    /// `limit` and the default (count-based, weight-1-per-entry) weighers.
    ///
    /// To configure `key_weight`, `value_weight`, `max_value_weight`, or
    /// `age_factor`, use [`CacheBuilder`][builder-struct].
    ///
    /// [builder-struct]: ./struct.CacheBuilder.html
    pub fn new(limit: u64) -> Self {
        Self::with_everything(
            limit,
            None,
            constant_weigher(),
            constant_weigher(),
            DEFAULT_AGE_FACTOR,
            RandomState::default(),
        )
    }

    /// Returns a [`CacheBuilder`][builder-struct] for a cache with the given
    /// total byte-weight budget.
    ///
    /// [builder-struct]: ./struct.CacheBuilder.html
    pub fn builder(limit: u64) -> CacheBuilder<K, V, Cache<K, V, RandomState>> {
        CacheBuilder::new(limit)
    }
}

//
// public
//
impl<K, V, S> Cache<K, V, S> {
    /// Returns the read-only configuration of this cache.
    pub fn policy(&self) -> Policy {
        Policy::new(self.limit, self.max_value_weight, self.age_factor)
    }

    /// Returns the number of entries currently held across all generations.
    pub fn len(&self) -> usize {
        self.eden.len() + self.probation.len() + self.protected.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the total byte-weight currently held across all generations.
    pub fn weighted_size(&self) -> u64 {
        self.eden.size() + self.probation.size() + self.protected.size()
    }
}

impl<K, V, S> Cache<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Clone,
{
    pub(crate) fn with_everything(
        limit: u64,
        max_value_weight: Option<u64>,
        key_weight: Weigher<K>,
        value_weight: Weigher<V>,
        age_factor: u64,
        build_hasher: S,
    ) -> Self {
        let (eden_limit, probation_limit, protected_limit) = generation_limits(limit);
        Self {
            limit,
            max_value_weight,
            key_weight,
            value_weight,
            age_factor,
            index: HashMap::with_hasher(build_hasher.clone()),
            slab: Slab::new(),
            eden: Ring::new(Generation::Eden, eden_limit),
            probation: Ring::new(Generation::Probation, probation_limit),
            protected: Ring::new(Generation::Protected, protected_limit),
            hits: 0,
            misses: 0,
            sets: 0,
            aged_at: 0,
            next_age_at: 0,
            build_hasher,
        }
    }

    /// Returns `true` if the cache holds a value for `key`. Unlike
    /// `get_and_touch`, this does not bump the entry's frequency counter or
    /// move it within its ring, and it is not counted toward `stats()`.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        Rc<K>: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Inserts or updates `key` with `value`.
    ///
    /// Returns `Ok(true)` if the entry was stored, `Ok(false)` if it was
    /// silently rejected for exceeding `max_value_weight` or because `limit`
    /// is `0` (admission disabled). Returns `Err` only if an internal
    /// invariant was found broken; the cache is left in a valid state either
    /// way.
    pub fn set(&mut self, key: K, value: V) -> Result<bool, CacheError> {
        let value_w = (self.value_weight)(&value);
        if let Some(max) = self.max_value_weight {
            if value_w > max {
                return Ok(false);
            }
        }
        let key_w = (self.key_weight)(&key);
        let weight = key_w + value_w;

        if self.limit == 0 {
            self.sets += 1;
            self.maybe_age();
            return Ok(false);
        }

        if let Some(&idx) = self.index.get(&key) {
            let generation = self.slab.get(idx).generation;
            match generation {
                Generation::Eden => {
                    self.eden.remove(&mut self.slab, idx);
                    update_entry(&mut self.slab, idx, value, weight);
                    self.eden.add_mru(&mut self.slab, idx);
                }
                Generation::Probation => {
                    self.probation.remove(&mut self.slab, idx);
                    update_entry(&mut self.slab, idx, value, weight);
                    self.probation.add_mru(&mut self.slab, idx);
                }
                Generation::Protected => {
                    self.protected.remove(&mut self.slab, idx);
                    update_entry(&mut self.slab, idx, value, weight);
                    self.protected.add_mru(&mut self.slab, idx);
                }
            }
            self.sets += 1;
        } else {
            let key = Rc::new(key);
            if self.index.contains_key(&key) {
                return Err(CacheError::ProgrammerFault(
                    "admission path observed a key already present in the index",
                ));
            }
            let idx = self
                .slab
                .insert(Rc::clone(&key), value, weight, Generation::Eden);
            self.index.insert(key, idx);
            self.eden.add_mru(&mut self.slab, idx);
            self.evict_eden_overflow();
            self.sets += 1;
        }

        self.maybe_age();
        Ok(true)
    }

    /// Looks up every key in `keys` against the same conceptual lookup: a
    /// single hit anywhere in `keys` counts as one hit in `stats()`, and a
    /// total miss counts as one miss, regardless of how many keys were
    /// tried. Every hit bumps that entry's frequency counter and, if it was
    /// on probation, promotes it to protected.
    pub fn get_and_touch<I>(&mut self, keys: I) -> HashMap<K, V>
    where
        I: IntoIterator<Item = K>,
        V: Clone,
    {
        let mut found = HashMap::new();
        let mut hit_any = false;
        for key in keys {
            if let Some(&idx) = self.index.get(&key) {
                self.record_hit(idx);
                let value = self.slab.get(idx).value.clone();
                found.insert(key, value);
                hit_any = true;
            }
        }
        if hit_any {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    /// Removes any cached value for `key`. A missing key is a silent no-op.
    pub fn delete<Q>(&mut self, key: &Q)
    where
        Rc<K>: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if let Some(idx) = self.index.remove(key) {
            let generation = self.slab.get(idx).generation;
            match generation {
                Generation::Eden => self.eden.remove(&mut self.slab, idx),
                Generation::Probation => self.probation.remove(&mut self.slab, idx),
                Generation::Protected => self.protected.remove(&mut self.slab, idx),
            }
            self.slab.remove(idx);
        }
    }

    /// Discards all cached values and resets ring occupancy, but keeps
    /// `stats()` and the ageing schedule intact.
    pub fn clear(&mut self) {
        self.index.clear();
        self.slab.clear();
        self.eden.clear();
        self.probation.clear();
        self.protected.clear();
    }

    /// Returns a snapshot of hit/miss/set counters and per-generation
    /// occupancy.
    pub fn stats(&self) -> Stats {
        let total = self.hits + self.misses;
        Stats {
            hits: self.hits,
            misses: self.misses,
            sets: self.sets,
            ratio: if total == 0 {
                0.0
            } else {
                self.hits as f64 / total as f64
            },
            entry_count: self.len() as u64,
            size_bytes: self.weighted_size(),
            eden: generation_stats(&self.eden),
            probation: generation_stats(&self.probation),
            protected: generation_stats(&self.protected),
        }
    }

    /// Zeroes `hits`, `misses`, and `sets`, and resets the adaptive ageing
    /// schedule.
    pub fn reset_stats(&mut self) {
        self.hits = 0;
        self.misses = 0;
        self.sets = 0;
        self.aged_at = 0;
        self.next_age_at = 0;
    }

    /// Creates an iterator visiting all key/value pairs in arbitrary order.
    /// Unlike `get_and_touch`, iterating does not bump any frequency counter
    /// or move any entry within its ring.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self.index.iter(), &self.slab)
    }
}

//
// private: engine internals
//
impl<K, V, S> Cache<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Clone,
{
    fn record_hit(&mut self, idx: usize) {
        {
            let node = self.slab.get_mut(idx);
            node.frequency = clamp_increment(node.frequency);
        }
        let generation = self.slab.get(idx).generation;
        match generation {
            Generation::Eden => self.eden.move_to_mru(&mut self.slab, idx),
            Generation::Protected => self.protected.move_to_mru(&mut self.slab, idx),
            Generation::Probation => {
                self.probation.remove(&mut self.slab, idx);
                self.protected.add_mru(&mut self.slab, idx);
                self.demote_protected_overflow();
            }
        }
    }

    fn demote_protected_overflow(&mut self) {
        while self.protected.size() > self.protected.limit() {
            match self.protected.peek_lru() {
                Some(victim) => {
                    self.protected.remove(&mut self.slab, victim);
                    self.place_in_probation(victim);
                }
                None => break,
            }
        }
    }

    /// Evicts down to budget, but never past a single resident: a fresh
    /// admission is allowed to leave eden transiently over its own limit by
    /// at most one entry's weight (spec's admission-time allowance), which
    /// matters whenever a single entry's weight already exceeds
    /// `eden.limit()`. The next admission evicts it in turn.
    fn evict_eden_overflow(&mut self) {
        while self.eden.len() > 1 && self.eden.size() > self.eden.limit() {
            match self.eden.peek_lru() {
                Some(victim) => {
                    self.eden.remove(&mut self.slab, victim);
                    self.place_evicted_from_eden(victim);
                }
                None => break,
            }
        }
    }

    fn place_evicted_from_eden(&mut self, idx: usize) {
        let weight = self.slab.get(idx).weight;
        let fits_protected = self.protected.size() + weight <= self.protected.limit();
        if self.probation.len() == 0 && fits_protected {
            self.protected.add_mru(&mut self.slab, idx);
        } else {
            self.place_in_probation(idx);
        }
    }

    /// The TinyLFU admission contest: `idx` (already detached from its
    /// previous ring) competes for a probation slot against probation's
    /// current LRU occupant when probation is at or above budget. A
    /// challenger at least as frequent as the incumbent takes the slot; the
    /// incumbent only holds on by being strictly more frequent.
    fn place_in_probation(&mut self, idx: usize) {
        if self.probation.size() < self.probation.limit() {
            self.probation.add_mru(&mut self.slab, idx);
            return;
        }
        match self.probation.peek_lru() {
            Some(incumbent) => {
                let challenger_freq = self.slab.get(idx).frequency;
                let incumbent_freq = self.slab.get(incumbent).frequency;
                if challenger_freq >= incumbent_freq {
                    self.probation.remove(&mut self.slab, incumbent);
                    self.destroy(incumbent);
                    self.probation.add_mru(&mut self.slab, idx);
                } else {
                    // The challenger never enters the index and is
                    // destroyed outright.
                    self.destroy(idx);
                }
            }
            None => self.probation.add_mru(&mut self.slab, idx),
        }
    }

    /// Removes a detached node from the index and the slab entirely.
    fn destroy(&mut self, idx: usize) {
        let key = Rc::clone(&self.slab.get(idx).key);
        self.index.remove(&key);
        self.slab.remove(idx);
    }

    fn maybe_age(&mut self) {
        let operations = self.hits + self.sets;
        if operations > self.next_age_at {
            self.age(operations);
        }
    }

    fn age(&mut self, operations: u64) {
        let age_period = self.age_factor * self.index.len() as u64;
        if operations.saturating_sub(self.aged_at) < age_period {
            self.next_age_at = age_period;
            return;
        }
        if self.weighted_size() < self.limit {
            self.next_age_at = age_period;
            return;
        }

        self.aged_at = operations;
        log::debug!(
            "beginning frequency ageing for {} cache entries",
            self.index.len()
        );
        for node in self.slab.iter_mut() {
            node.frequency >>= 1;
        }
        log::debug!("aged {} cache entries", self.index.len());
        self.next_age_at = (1.5 * self.aged_at as f64) as u64;
    }
}

impl<K, V, S> Cache<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Clone,
{
    /// Admits a batch of `(key, value)` pairs through the same cascade rules
    /// as one-by-one `set`, in the order given (first admitted becomes the
    /// deepest LRU). Returns the number actually stored (oversized values
    /// are skipped, same as `set`).
    pub(crate) fn bulk_admit(&mut self, items: Vec<(K, V)>) -> Result<usize, CacheError> {
        let mut stored = 0;
        for (key, value) in items {
            if self.set(key, value)? {
                stored += 1;
            }
        }
        Ok(stored)
    }
}

fn update_entry<K, V>(slab: &mut Slab<K, V>, idx: usize, value: V, weight: u64) {
    let node = slab.get_mut(idx);
    node.value = value;
    node.weight = weight;
    node.frequency = clamp_increment(node.frequency);
}

fn generation_stats(ring: &Ring) -> GenerationStats {
    GenerationStats {
        limit: ring.limit(),
        size: ring.size(),
        len: ring.len(),
    }
}

/// Allocates the three generation budgets from a total `limit` following the
/// canonical 1/20/79 W-TinyLFU split (spec §4.2): eden gets ~1% (at least 1),
/// probation gets ~20% (at least 1), and protected takes the remainder.
pub(crate) fn generation_limits(limit: u64) -> (u64, u64, u64) {
    if limit == 0 {
        return (0, 0, 0);
    }
    let eden = std::cmp::max(1, limit / 100);
    let probation = std::cmp::max(1, limit / 5);
    let protected = limit.saturating_sub(eden).saturating_sub(probation);
    (eden, probation, protected)
}
