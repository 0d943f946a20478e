#[derive(Clone, Debug)]
/// The read-only, post-construction configuration of a cache.
pub struct Policy {
    limit: u64,
    max_value_weight: Option<u64>,
    age_factor: u64,
}

impl Policy {
    pub(crate) fn new(limit: u64, max_value_weight: Option<u64>, age_factor: u64) -> Self {
        Self {
            limit,
            max_value_weight,
            age_factor,
        }
    }

    /// Returns the total byte-weight budget of the cache.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Returns the per-value weight ceiling above which `set` silently
    /// rejects a candidate, if one was configured.
    pub fn max_value_weight(&self) -> Option<u64> {
        self.max_value_weight
    }

    /// Returns the multiplier used to schedule frequency ageing.
    pub fn age_factor(&self) -> u64 {
        self.age_factor
    }
}
