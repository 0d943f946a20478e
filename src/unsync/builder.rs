use super::cache::DEFAULT_AGE_FACTOR;
use super::Cache;
use crate::weigher::{constant_weigher, Weigher};

use std::{
    collections::hash_map::RandomState,
    hash::{BuildHasher, Hash},
    marker::PhantomData,
    rc::Rc,
};

/// Builds a [`Cache`][cache-struct] with the weight functions and tuning
/// knobs that [`Cache::new`][cache-new] leaves at their defaults.
///
/// [cache-struct]: ./struct.Cache.html
/// [cache-new]: ./struct.Cache.html#method.new
///
/// # Examples
///
/// ```rust
/// use wtlfu_cache::unsync::Cache;
///
/// let mut cache = Cache::builder(10_000)
///     .value_weight(|v: &Vec<u8>| v.len() as u64)
///     .max_value_weight(1_024)
///     .build();
///
/// cache.set(0, vec![0u8; 64]);
/// ```
#[must_use]
pub struct CacheBuilder<K, V, C> {
    limit: u64,
    max_value_weight: Option<u64>,
    key_weight: Weigher<K>,
    value_weight: Weigher<V>,
    age_factor: u64,
    cache_type: PhantomData<C>,
}

impl<K, V> CacheBuilder<K, V, Cache<K, V, RandomState>>
where
    K: Eq + Hash,
{
    /// Creates a builder for a cache with a total byte-weight budget of
    /// `limit`. Keys and values default to weight 1 each (a pure
    /// entry-count budget) until overridden with [`key_weight`] or
    /// [`value_weight`].
    ///
    /// [`key_weight`]: Self::key_weight
    /// [`value_weight`]: Self::value_weight
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            max_value_weight: None,
            key_weight: constant_weigher(),
            value_weight: constant_weigher(),
            age_factor: DEFAULT_AGE_FACTOR,
            cache_type: PhantomData,
        }
    }

    /// Builds a `Cache<K, V>` using a [`RandomState`] hasher.
    pub fn build(self) -> Cache<K, V, RandomState> {
        self.build_with_hasher(RandomState::default())
    }

    /// Builds a `Cache<K, V, S>` using the given hasher.
    pub fn build_with_hasher<S>(self, hasher: S) -> Cache<K, V, S>
    where
        S: BuildHasher + Clone,
    {
        Cache::with_everything(
            self.limit,
            self.max_value_weight,
            self.key_weight,
            self.value_weight,
            self.age_factor,
            hasher,
        )
    }
}

impl<K, V, C> CacheBuilder<K, V, C> {
    /// Overrides the key-weight function. Must not panic and must be
    /// deterministic for a given key.
    pub fn key_weight(self, f: impl Fn(&K) -> u64 + 'static) -> Self {
        Self {
            key_weight: Rc::new(f),
            ..self
        }
    }

    /// Overrides the value-weight function. Must not panic and must be
    /// deterministic for a given value.
    pub fn value_weight(self, f: impl Fn(&V) -> u64 + 'static) -> Self {
        Self {
            value_weight: Rc::new(f),
            ..self
        }
    }

    /// Sets a per-value weight ceiling: `set` calls whose value weight
    /// exceeds this are rejected without ever touching eden.
    pub fn max_value_weight(self, max_value_weight: u64) -> Self {
        Self {
            max_value_weight: Some(max_value_weight),
            ..self
        }
    }

    /// Sets the multiplier used by the adaptive ageing schedule
    /// (`age_period = age_factor * |index|`). Defaults to 10.
    pub fn age_factor(self, age_factor: u64) -> Self {
        Self { age_factor, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::super::Cache;

    #[test]
    fn builder_defaults_to_count_based_weights() {
        let mut cache: Cache<char, String> = Cache::builder(100).build();
        cache.set('a', "alice".to_string()).unwrap();
        assert_eq!(cache.weighted_size(), 2);
    }

    #[test]
    fn builder_honors_custom_weighers() {
        let mut cache = Cache::builder(1_000)
            .key_weight(|_k: &String| 2)
            .value_weight(|v: &String| v.len() as u64)
            .build();
        cache.set("k".to_string(), "01234567".to_string()).unwrap();
        assert_eq!(cache.weighted_size(), 10);
    }

    #[test]
    fn builder_honors_age_factor() {
        let cache: Cache<char, String> = Cache::builder(100).age_factor(5).build();
        assert_eq!(cache.policy().age_factor(), 5);
    }
}
