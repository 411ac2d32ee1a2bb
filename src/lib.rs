//! Adaptive multi-resolution histograms over data sources that suppress small groups
//!
//! Data sources that protect individuals hide every group below a size
//! threshold, so a fine-grained histogram comes back full of holes. This
//! workspace explores a numeric column coarse to fine and fills the holes
//! from the coarser, better populated levels.
//!
//! # Crates
//!
//! - [`bucket_core`]: canonical bucket sizes, size estimation and the error type
//! - [`bucket_tree`]: buckets, levels, interpolation and the bucket tree
//! - [`bucket_explorer`]: the query boundary and the exploration driver
//!
//! # Example
//!
//! ```rust
//! use adaptive_buckets::prelude::*;
//!
//! let size = estimate_bucket_size(999.0, 1000.0).unwrap();
//! assert_eq!(size.value(), 20.0);
//!
//! let top = ObservedStats::new(1000.0, 0.0, 999.0);
//! let tree = BucketTree::from_top_level(top, LevelMetadata::suppressed(300.0)).unwrap();
//! assert_eq!(tree.next_level_size().map(|s| s.value()), Some(100.0));
//! ```

pub use bucket_core;
pub use bucket_explorer;
pub use bucket_tree;

/// Commonly used types
pub mod prelude {
    pub use bucket_core::{estimate_bucket_size, BucketSize, BucketSizeEstimator, Error, Result};
    pub use bucket_explorer::{
        ExplorationConfig, ExplorationDriver, QueryBuilder, QueryExecutor, QueryResult, Row,
    };
    pub use bucket_tree::{
        Bucket, BucketData, BucketLevel, BucketTree, EqualSplit, InterpolationPolicy, LevelMetadata,
        ObservedStats,
    };
}
