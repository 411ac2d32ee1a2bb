//! Bucket trees for exploring data sources that suppress small groups
//!
//! A data source that hides low-count groups answers a histogram query with
//! only the buckets that survived. This crate keeps every bucket size queried
//! so far in a [`BucketTree`], from a single root bucket down to the finest
//! size, and fills the gaps of each level by interpolating against the level
//! above it.
//!
//! # Key Features
//!
//! - **Complete levels**: every level tiles its parent, missing buckets are synthetic
//! - **Count conservation**: children of a bucket always add up to its count
//! - **Lookups at any size**: finer levels are merged, coarser ones fall back
//! - **Pluggable interpolation**: [`InterpolationPolicy`], equal split by default
//!
//! # Example
//!
//! ```rust
//! use bucket_core::BucketSize;
//! use bucket_tree::{Bucket, BucketTree, LevelMetadata, ObservedStats};
//!
//! let top = ObservedStats::new(1000.0, 0.0, 999.0);
//! let mut tree = BucketTree::from_top_level(top, LevelMetadata::default()).unwrap();
//!
//! let size = tree.next_level_size().unwrap();
//! assert_eq!(size.value(), 100.0);
//!
//! // Only the bucket at 0 survived suppression
//! let returned = Bucket::observed(size, 0.0, ObservedStats::new(370.0, 2.0, 99.0)).unwrap();
//! tree.insert_query_result(size, vec![returned], LevelMetadata::suppressed(630.0)).unwrap();
//!
//! let filled = tree.get_bucket(size, 400.0);
//! assert!(filled.data().is_synthetic());
//! assert_eq!(filled.count(), 70.0);
//!
//! // Sizes that were never queried are answered from the levels present
//! let merged = tree.get_bucket(BucketSize::from_value(200.0).unwrap(), 0.0);
//! assert_eq!(merged.count(), 440.0);
//! ```

pub mod interpolation;
pub mod level;
pub mod traits;
pub mod tree;
pub mod types;

pub use interpolation::{interpolate, interpolate_with};
pub use level::{BucketLevel, LevelMetadata};
pub use traits::{EqualSplit, InterpolationContext, InterpolationPolicy};
pub use tree::{BucketTree, LevelInsert, LEVEL_STEPS};
pub use types::{Bucket, BucketData, ObservedStats};
