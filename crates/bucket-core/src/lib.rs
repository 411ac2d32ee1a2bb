//! Core types for adaptive bucket exploration
//!
//! This crate holds the pieces shared by the bucket tree and the exploration
//! driver:
//!
//! - [`BucketSize`] and the canonical `{1, 2, 5} x 10^e` size sequence
//! - [`BucketSizeEstimator`] for choosing a size from range and population
//! - the fixed-point grid lower bounds are expressed on
//! - the workspace [`Error`] type
//!
//! # Example
//!
//! ```rust
//! use bucket_core::{sizes, BucketSize, BucketSizeEstimator};
//!
//! let size = BucketSizeEstimator::default().estimate(3641.0, 10_000.0).unwrap();
//! assert_eq!(size, BucketSize::from_value(20.0).unwrap());
//! assert_eq!(size.base(), 2);
//!
//! // Sizes below 1000, largest first
//! let finer: Vec<f64> = sizes::sizes_smaller_than(1000.0).take(3).map(|s| s.value()).collect();
//! assert_eq!(finer, vec![500.0, 200.0, 100.0]);
//! ```

pub mod error;
pub mod estimator;
pub mod sizes;

pub use error::{Error, Result};
pub use estimator::{
    estimate_bucket_size, root_placement, BucketSizeEstimator, DEFAULT_MIN_BUCKET_COUNT,
    DEFAULT_NUM_BUCKETS, FIRST_LEVEL_STEPS,
};
pub use sizes::{canonical_sizes, from_units, to_units, BucketSize};
