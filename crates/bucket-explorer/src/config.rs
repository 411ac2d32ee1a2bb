//! Configuration for an exploration session

use bucket_core::{BucketSizeEstimator, DEFAULT_MIN_BUCKET_COUNT, DEFAULT_NUM_BUCKETS};
use serde::{Deserialize, Serialize};

/// Suppressed fraction below which bucketing is not worth the queries
pub const DEFAULT_SUPPRESSION_THRESHOLD: f64 = 0.02;

/// Levels requested in a single query
pub const DEFAULT_LEVELS_PER_ROUND: usize = 3;

/// Upper bound on query rounds after initialisation
pub const DEFAULT_MAX_ROUNDS: usize = 8;

/// Parameters of an exploration session
///
/// Missing fields take their defaults when deserialising, so a partial JSON
/// object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    /// Target number of buckets across the value range
    pub num_buckets: usize,
    /// Smallest population a bucket should have to survive suppression
    pub min_bucket_count: usize,
    /// Keep refining while this fraction of values or more is suppressed
    pub suppression_threshold: f64,
    /// Bucket sizes requested per query round
    pub levels_per_round: usize,
    /// Maximum number of query rounds
    pub max_rounds: usize,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            num_buckets: DEFAULT_NUM_BUCKETS,
            min_bucket_count: DEFAULT_MIN_BUCKET_COUNT,
            suppression_threshold: DEFAULT_SUPPRESSION_THRESHOLD,
            levels_per_round: DEFAULT_LEVELS_PER_ROUND,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

impl ExplorationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_buckets(mut self, num_buckets: usize) -> Self {
        assert!(num_buckets > 0, "Number of buckets must be positive");
        self.num_buckets = num_buckets;
        self
    }

    pub fn with_min_bucket_count(mut self, min_bucket_count: usize) -> Self {
        assert!(min_bucket_count > 0, "Minimum bucket count must be positive");
        self.min_bucket_count = min_bucket_count;
        self
    }

    pub fn with_suppression_threshold(mut self, threshold: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&threshold),
            "Suppression threshold must be in [0, 1]"
        );
        self.suppression_threshold = threshold;
        self
    }

    pub fn with_levels_per_round(mut self, levels: usize) -> Self {
        assert!(levels > 0, "At least one level per round is required");
        self.levels_per_round = levels;
        self
    }

    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds;
        self
    }

    /// Estimator for the finest useful bucket size
    pub fn estimator(&self) -> BucketSizeEstimator {
        BucketSizeEstimator::new(self.num_buckets, self.min_bucket_count)
    }

    /// Check values that may have bypassed the builder, e.g. when deserialised
    pub fn validate(&self) -> bucket_core::Result<()> {
        let invalid = |msg: &str| Err(bucket_core::Error::InvalidParameter(msg.to_string()));
        if self.num_buckets == 0 || self.min_bucket_count == 0 {
            return invalid("num_buckets and min_bucket_count must be positive");
        }
        if !(0.0..=1.0).contains(&self.suppression_threshold) {
            return invalid("suppression_threshold must be in [0, 1]");
        }
        if self.levels_per_round == 0 {
            return invalid("levels_per_round must be positive");
        }
        Ok(())
    }
}
