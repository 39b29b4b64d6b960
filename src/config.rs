//! Construction-time tuning for `ChainHashMap`.

use crate::error::{Error, Result};

pub const DEFAULT_BUCKETS: usize = 100;
pub const DEFAULT_MAX_LOAD_FACTOR: f32 = 0.75;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TableConfig {
    /// Initial bucket count; 0 selects [`DEFAULT_BUCKETS`].
    pub initial_buckets: usize,
    pub max_load_factor: f32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            initial_buckets: DEFAULT_BUCKETS,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
        }
    }
}

impl TableConfig {
    pub fn with_initial_buckets(mut self, buckets: usize) -> Self {
        self.initial_buckets = buckets;
        self
    }

    pub fn with_max_load_factor(mut self, max: f32) -> Self {
        self.max_load_factor = max;
        self
    }

    pub(crate) fn bucket_count(&self) -> usize {
        if self.initial_buckets == 0 {
            DEFAULT_BUCKETS
        } else {
            self.initial_buckets
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_load_factor(self.max_load_factor)
    }
}

pub(crate) fn validate_load_factor(max: f32) -> Result<()> {
    if max.is_finite() && max > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidLoadFactor(max))
    }
}

/// Bucket count after an automatic rehash: `ceil(1.5 * n) + 1`.
#[inline]
pub(crate) fn grown_bucket_count(n: usize) -> usize {
    n.saturating_add(n.div_ceil(2)).saturating_add(1)
}
