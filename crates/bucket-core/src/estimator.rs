//! Bucket size estimation
//!
//! Picks a canonical bucket size that balances resolution (roughly
//! `num_buckets` buckets over the value range) against population (at least
//! `min_bucket_count` values per bucket on average). When the two goals
//! conflict the population bound wins: a data source that suppresses small
//! groups returns nothing useful for buckets that are too sparse.

use crate::sizes::{next_after, sizes_in_range, to_units, BucketSize};
use crate::{Error, Result};
use tracing::debug;

/// Default target number of buckets across the value range
pub const DEFAULT_NUM_BUCKETS: usize = 100;

/// Default minimum average number of values per bucket
pub const DEFAULT_MIN_BUCKET_COUNT: usize = 20;

/// Estimates canonical bucket sizes from range and population
///
/// For 10 000 values in the range `2042..5683` the range is 3641. A hundred
/// buckets would each be 36.4 wide, while 20 values per bucket allows 500
/// buckets of width 7.2. The canonical sizes between those bounds are 10 and
/// 20, and the estimator prefers the coarser one:
///
/// ```rust
/// use bucket_core::BucketSizeEstimator;
///
/// let size = BucketSizeEstimator::default().estimate(5683.0 - 2042.0, 10_000.0).unwrap();
/// assert_eq!(size.value(), 20.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketSizeEstimator {
    num_buckets: usize,
    min_bucket_count: usize,
}

impl Default for BucketSizeEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_BUCKETS, DEFAULT_MIN_BUCKET_COUNT)
    }
}

impl BucketSizeEstimator {
    /// Create an estimator with explicit bounds
    pub fn new(num_buckets: usize, min_bucket_count: usize) -> Self {
        assert!(num_buckets > 0, "Number of buckets must be positive");
        assert!(min_bucket_count > 0, "Minimum bucket count must be positive");
        Self {
            num_buckets,
            min_bucket_count,
        }
    }

    /// Target number of buckets
    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    /// Minimum average population per bucket
    pub fn min_bucket_count(&self) -> usize {
        self.min_bucket_count
    }

    /// Estimate a bucket size for `value_count` values spread over `value_range`
    ///
    /// Returns the largest canonical size strictly between the population
    /// bound and the precision bound, or, when there is none, the smallest
    /// canonical size above the population bound.
    pub fn estimate(&self, value_range: f64, value_count: f64) -> Result<BucketSize> {
        let precision_bound = value_range / self.num_buckets as f64;
        let size_bound = value_range / (value_count / self.min_bucket_count as f64);

        debug!(
            value_range,
            value_count,
            precision_bound,
            size_bound,
            "Estimating bucket size"
        );

        let candidates = sizes_in_range(size_bound, precision_bound);
        debug!("Bucket size candidates: {:?}", candidates);

        let result = match candidates.last() {
            Some(&largest) => Some(largest),
            None => next_after(size_bound),
        };

        result.ok_or(Error::EstimationExhausted {
            value_range,
            value_count,
            size_bound,
        })
    }
}

/// Estimate a bucket size with the default bounds
pub fn estimate_bucket_size(value_range: f64, value_count: f64) -> Result<BucketSize> {
    BucketSizeEstimator::default().estimate(value_range, value_count)
}

/// Number of canonical steps between the root size and the first level below it
///
/// Three steps down the `1, 2, 5` sequence is always a factor of ten.
pub const FIRST_LEVEL_STEPS: usize = 3;

/// Size and grid offset of a single root bucket covering `min..=max`
///
/// The root bucket is aligned to the size of the first level below it rather
/// than to its own size, so a range straddling an aligned boundary (zero in
/// particular) still fits in one bucket. Starts at the smallest canonical
/// size larger than the range and grows until the bucket covers `max`.
pub fn root_placement(min: f64, max: f64) -> Result<(BucketSize, i128)> {
    if !min.is_finite() || !max.is_finite() {
        return Err(Error::non_finite("top-level range"));
    }
    if max < min {
        return Err(Error::InvalidInput(format!(
            "top-level maximum {max} is below minimum {min}"
        )));
    }
    let (Some(min_units), Some(max_units)) = (to_units(min), to_units(max)) else {
        return Err(Error::non_finite("top-level range"));
    };

    let value_range = max - min;
    let mut candidate = next_after(value_range);
    while let Some(size) = candidate {
        let alignment = size
            .smaller_by(FIRST_LEVEL_STEPS)
            .unwrap_or_else(BucketSize::smallest);
        let offset = alignment.align(min_units);
        if offset + size.units() > max_units {
            debug!(%size, min, max, "Selected root bucket");
            return Ok((size, offset));
        }
        candidate = BucketSize::from_position(size.position() + 1);
    }

    Err(Error::EstimationExhausted {
        value_range,
        value_count: 1.0,
        size_bound: value_range,
    })
}
