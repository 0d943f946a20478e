//! Statistics and per-generation introspection (spec §4.5).

/// Occupancy of a single generation ring at the moment [`Stats`] was taken.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GenerationStats {
    /// Configured byte-weight budget for this generation.
    pub limit: u64,
    /// Summed weight of entries currently held.
    pub size: u64,
    /// Number of entries currently held.
    pub len: usize,
}

/// A snapshot of cache-wide hit/miss/set counters and per-generation
/// occupancy. Returned by [`super::Cache::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Stats {
    /// Number of `get_and_touch` calls that found at least one requested key.
    pub hits: u64,
    /// Number of `get_and_touch` calls that found none of the requested keys.
    pub misses: u64,
    /// Number of `set` calls, including in-place updates.
    pub sets: u64,
    /// `hits / (hits + misses)`, or `0.0` when no lookups have happened yet.
    pub ratio: f64,
    /// Total number of live entries across all three generations.
    pub entry_count: u64,
    /// Total byte-weight held across all three generations.
    pub size_bytes: u64,
    /// Eden generation occupancy.
    pub eden: GenerationStats,
    /// Probation generation occupancy.
    pub probation: GenerationStats,
    /// Protected generation occupancy.
    pub protected: GenerationStats,
}
