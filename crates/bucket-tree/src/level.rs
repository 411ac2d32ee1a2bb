//! All buckets of one size

use crate::interpolation::interpolate_with;
use crate::traits::{EqualSplit, InterpolationPolicy};
use crate::types::{Bucket, BucketData};
use bucket_core::{to_units, BucketSize, Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Per-level information reported alongside the buckets of a query
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LevelMetadata {
    /// Number of values the data source withheld at this bucket size
    pub suppressed_count: f64,
    /// Names of the aggregate columns returned for each bucket
    pub labels: Vec<String>,
}

impl LevelMetadata {
    /// Metadata with a suppressed count and no labels
    pub fn suppressed(suppressed_count: f64) -> Self {
        Self {
            suppressed_count,
            labels: Vec::new(),
        }
    }

    /// Attach column labels
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }
}

/// The buckets of one size, keyed by lower bound
///
/// Once built against a parent level the buckets form a contiguous tiling of
/// the parent's span: every slot the query did not return holds a synthetic
/// bucket interpolated from the parent.
#[derive(Debug, Clone)]
pub struct BucketLevel {
    size: BucketSize,
    parent_size: Option<BucketSize>,
    buckets: BTreeMap<i128, Bucket>,
    metadata: LevelMetadata,
}

impl BucketLevel {
    /// Build a level with the equal-split policy
    pub fn new(
        size: BucketSize,
        buckets: Vec<Bucket>,
        metadata: LevelMetadata,
        parent: Option<&BucketLevel>,
    ) -> Result<Self> {
        Self::with_policy(size, buckets, metadata, parent, &EqualSplit)
    }

    /// Level holding a single bucket, used for the root of a tree
    pub fn root(bucket: Bucket, metadata: LevelMetadata) -> Self {
        Self {
            size: bucket.size(),
            parent_size: None,
            buckets: BTreeMap::from([(bucket.offset(), bucket)]),
            metadata,
        }
    }

    /// Build a level, interpolating gaps with `policy`
    ///
    /// Without a parent the level is its own top: gaps between the lowest
    /// and highest observed buckets are filled against a synthetic parent
    /// whose count is the sum of the observed buckets, which leaves nothing
    /// to distribute and gives every gap a zero count.
    pub fn with_policy(
        size: BucketSize,
        buckets: Vec<Bucket>,
        metadata: LevelMetadata,
        parent: Option<&BucketLevel>,
        policy: &dyn InterpolationPolicy,
    ) -> Result<Self> {
        let mut observed = BTreeMap::new();
        for bucket in buckets {
            if bucket.size() != size {
                return Err(Error::InvalidInput(format!(
                    "bucket of size {} in level of size {size}",
                    bucket.size()
                )));
            }
            if let Some(duplicate) = observed.insert(bucket.offset(), bucket) {
                return Err(Error::InvalidInput(format!(
                    "duplicate bucket {duplicate} in level {size}"
                )));
            }
        }

        let tiled = match parent {
            Some(parent) => tile_against_parent(size, observed, parent, policy)?,
            None => tile_own_span(size, observed),
        };

        Ok(Self {
            size,
            parent_size: parent.map(BucketLevel::size),
            buckets: tiled.into_iter().map(|b| (b.offset(), b)).collect(),
            metadata,
        })
    }

    /// Bucket size of this level
    pub fn size(&self) -> BucketSize {
        self.size
    }

    /// Size of the level this one was interpolated against
    pub fn parent_size(&self) -> Option<BucketSize> {
        self.parent_size
    }

    /// Metadata reported with the level
    pub fn metadata(&self) -> &LevelMetadata {
        &self.metadata
    }

    /// Number of values the data source withheld at this size
    pub fn suppressed_count(&self) -> f64 {
        self.metadata.suppressed_count
    }

    /// Fraction of `total_count` that was withheld at this size
    pub fn suppressed_ratio(&self, total_count: f64) -> f64 {
        if total_count > 0.0 {
            self.metadata.suppressed_count / total_count
        } else {
            0.0
        }
    }

    /// Aggregate column labels
    pub fn labels(&self) -> &[String] {
        &self.metadata.labels
    }

    /// Number of buckets, including interpolated ones
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Check if the level holds no buckets
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Buckets ordered by lower bound
    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> + '_ {
        self.buckets.values()
    }

    /// The bucket containing `lower_bound`, if the level covers it
    pub fn get_bucket(&self, lower_bound: f64) -> Option<&Bucket> {
        let units = to_units(lower_bound)?;
        self.get_by_offset(self.size.align(units))
    }

    /// The bucket starting at grid position `offset`
    pub fn get_by_offset(&self, offset: i128) -> Option<&Bucket> {
        self.buckets.get(&offset)
    }

    /// Buckets whose lower bound lies in `[lo, hi)`, ordered by lower bound
    ///
    /// The iterator is lazy and borrows the level, so calling this again
    /// yields the same sequence.
    pub fn buckets_in_range(&self, lo: f64, hi: f64) -> impl Iterator<Item = &Bucket> + '_ {
        self.buckets
            .values()
            .filter(move |bucket| bucket.lower_bound() >= lo && bucket.lower_bound() < hi)
    }

    /// Lower bound of the first bucket and upper bound of the last
    pub fn span(&self) -> Option<(f64, f64)> {
        let first = self.buckets.values().next()?;
        let last = self.buckets.values().next_back()?;
        Some((first.lower_bound(), last.upper_bound()))
    }

    /// Sum of all bucket counts, observed and interpolated
    pub fn total_count(&self) -> f64 {
        self.buckets.values().map(Bucket::count).sum()
    }

    /// Number of buckets returned by the query
    pub fn observed_count(&self) -> usize {
        self.buckets.values().filter(|b| b.data().is_observed()).count()
    }

    /// Number of interpolated buckets
    pub fn synthetic_count(&self) -> usize {
        self.buckets.values().filter(|b| b.data().is_synthetic()).count()
    }

    /// Number of interpolated buckets with a negative count
    ///
    /// Non-zero values mean query noise pushed observed counts past their
    /// parent's count somewhere in this level.
    pub fn negative_synthetic_count(&self) -> usize {
        self.buckets
            .values()
            .filter(|b| b.data().is_synthetic() && b.count() < 0.0)
            .count()
    }
}

fn tile_against_parent(
    size: BucketSize,
    mut observed: BTreeMap<i128, Bucket>,
    parent: &BucketLevel,
    policy: &dyn InterpolationPolicy,
) -> Result<Vec<Bucket>> {
    if parent.size.ratio(size).is_none() {
        return Err(Error::ShapeMismatch {
            parent: parent.size,
            child: size,
        });
    }

    let mut tiled = Vec::new();
    for parent_bucket in parent.buckets() {
        let inside: Vec<i128> = observed
            .range(parent_bucket.offset()..parent_bucket.end())
            .map(|(&offset, _)| offset)
            .collect();
        let children = inside.iter().filter_map(|offset| observed.remove(offset)).collect();
        tiled.extend(interpolate_with(parent_bucket, size, children, policy)?);
    }

    for stray in observed.into_values() {
        warn!(bucket = %stray, "Observed bucket lies outside the parent level, keeping as is");
        tiled.push(stray);
    }
    Ok(tiled)
}

fn tile_own_span(size: BucketSize, observed: BTreeMap<i128, Bucket>) -> Vec<Bucket> {
    let (Some(&first), Some(&last)) = (observed.keys().next(), observed.keys().next_back()) else {
        return Vec::new();
    };

    // The pseudo-parent's count is the sum of its children, so gaps get zero
    let step = size.units();
    let mut tiled = Vec::new();
    let mut offset = first;
    while offset <= last {
        let bucket = observed
            .get(&offset)
            .cloned()
            .unwrap_or_else(|| Bucket::new(size, offset, BucketData::synthetic(0.0)));
        tiled.push(bucket);
        offset += step;
    }
    tiled
}
