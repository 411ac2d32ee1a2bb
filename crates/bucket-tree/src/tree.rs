//! The hierarchy of bucket levels explored for one column
//!
//! A tree starts with a root level holding a single bucket over the whole
//! value range. Finer levels are added one at a time, each interpolated
//! against the finest level present before it, so insertion order is fixed:
//! the tree decides which size comes next and rejects anything else.
//!
//! Lookups never fail inside the root's range. A size that was never
//! explored is answered by merging finer buckets when a finer level divides
//! it, and otherwise by the nearest coarser bucket containing it.

use crate::level::{BucketLevel, LevelMetadata};
use crate::traits::{EqualSplit, InterpolationPolicy};
use crate::types::{Bucket, BucketData, ObservedStats};
use bucket_core::{root_placement, to_units, BucketSize, Error, Result, FIRST_LEVEL_STEPS};
use std::collections::BTreeMap;
use std::ops::Bound::Excluded;
use tracing::{debug, instrument};

/// Canonical steps between consecutive levels below the first one
///
/// Two steps down the `1, 2, 5` sequence always changes the base and always
/// divides evenly (a factor of 4 or 5).
pub const LEVEL_STEPS: usize = 2;

/// The results of one query for one bucket size
#[derive(Debug, Clone)]
pub struct LevelInsert {
    /// Size the buckets were queried at
    pub size: BucketSize,
    /// Buckets returned by the query
    pub buckets: Vec<Bucket>,
    /// Suppressed count and labels for the size
    pub metadata: LevelMetadata,
}

/// Levels of buckets from the root down to the finest size explored
#[derive(Debug)]
pub struct BucketTree {
    root: Bucket,
    root_size: BucketSize,
    levels: BTreeMap<BucketSize, BucketLevel>,
    policy: Box<dyn InterpolationPolicy>,
}

impl BucketTree {
    /// Create a tree from its root bucket
    pub fn new(root: Bucket, metadata: LevelMetadata) -> Self {
        let root_size = root.size();
        Self {
            root_size,
            levels: BTreeMap::from([(root_size, BucketLevel::root(root.clone(), metadata))]),
            root,
            policy: Box::new(EqualSplit),
        }
    }

    /// Create a tree whose root bucket covers the top-level statistics
    ///
    /// The root size is the smallest canonical size whose bucket covers
    /// `stats.min..=stats.max`.
    pub fn from_top_level(stats: ObservedStats, metadata: LevelMetadata) -> Result<Self> {
        let (size, offset) = root_placement(stats.min, stats.max)?;
        debug!(
            %size,
            min = stats.min,
            max = stats.max,
            count = stats.count,
            "Creating bucket tree"
        );
        Ok(Self::new(Bucket::new(size, offset, BucketData::Observed(stats)), metadata))
    }

    /// Use `policy` to interpolate levels inserted from now on
    pub fn with_policy(mut self, policy: impl InterpolationPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Size of the root bucket
    pub fn root_size(&self) -> BucketSize {
        self.root_size
    }

    /// The root level
    pub fn root_level(&self) -> &BucketLevel {
        &self.levels[&self.root_size]
    }

    /// The single bucket covering the whole value range
    pub fn root(&self) -> &Bucket {
        &self.root
    }

    /// Smallest size explored so far
    pub fn min_size(&self) -> BucketSize {
        self.levels.keys().next().copied().unwrap_or(self.root_size)
    }

    /// The level of exactly `size`, if explored
    pub fn level(&self, size: BucketSize) -> Option<&BucketLevel> {
        self.levels.get(&size)
    }

    /// The finest level explored so far
    pub fn finest_level(&self) -> &BucketLevel {
        &self.levels[&self.min_size()]
    }

    /// All levels, root first
    pub fn levels(&self) -> impl Iterator<Item = &BucketLevel> + '_ {
        self.levels.values().rev()
    }

    /// Explored sizes, largest first
    pub fn sizes(&self) -> Vec<BucketSize> {
        self.levels.keys().rev().copied().collect()
    }

    /// Number of levels below the root
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// The only size that may be inserted next
    ///
    /// The first level below the root is a factor of ten finer; every later
    /// level steps two places down the canonical sequence. `None` once the
    /// sequence is exhausted.
    pub fn next_level_size(&self) -> Option<BucketSize> {
        self.size_after(self.min_size())
    }

    /// The next `n` insertable sizes, largest first, without changing the tree
    pub fn next_level_sizes(&self, n: usize) -> Vec<BucketSize> {
        std::iter::successors(self.next_level_size(), |&size| self.size_after(size))
            .take(n)
            .collect()
    }

    fn size_after(&self, size: BucketSize) -> Option<BucketSize> {
        let steps = if size == self.root_size {
            FIRST_LEVEL_STEPS
        } else {
            LEVEL_STEPS
        };
        size.smaller_by(steps)
    }

    /// Add the query results for `size` as a new level
    ///
    /// The level is interpolated against the finest level present before the
    /// insertion.
    ///
    /// # Errors
    ///
    /// - [`Error::NotBelowRoot`] if `size` is not strictly below the root
    /// - [`Error::OutOfOrder`] if `size` is not [`next_level_size`](Self::next_level_size)
    /// - any error from building the level; the tree is left unchanged
    #[instrument(skip_all, fields(size = %size, buckets = buckets.len()))]
    pub fn insert_query_result(
        &mut self,
        size: BucketSize,
        buckets: Vec<Bucket>,
        metadata: LevelMetadata,
    ) -> Result<()> {
        if size >= self.root_size {
            return Err(Error::NotBelowRoot {
                root: self.root_size,
                size,
            });
        }
        let expected = self.next_level_size();
        if expected != Some(size) {
            return Err(Error::OutOfOrder {
                expected,
                actual: size,
            });
        }

        let level = BucketLevel::with_policy(
            size,
            buckets,
            metadata,
            Some(self.finest_level()),
            self.policy.as_ref(),
        )?;
        debug!(
            synthetic = level.synthetic_count(),
            negative = level.negative_synthetic_count(),
            suppressed = level.suppressed_count(),
            "Inserted level"
        );
        self.levels.insert(size, level);
        Ok(())
    }

    /// Insert several levels, all or nothing
    ///
    /// Levels are inserted largest first. If any insertion fails, every level
    /// added by this call is removed again before the error is returned.
    pub fn insert_round(&mut self, mut batch: Vec<LevelInsert>) -> Result<()> {
        batch.sort_by(|a, b| b.size.cmp(&a.size));
        let mut inserted = Vec::with_capacity(batch.len());
        for insert in batch {
            let size = insert.size;
            if let Err(err) = self.insert_query_result(size, insert.buckets, insert.metadata) {
                for size in inserted {
                    self.levels.remove(&size);
                }
                return Err(err);
            }
            inserted.push(size);
        }
        Ok(())
    }

    /// The bucket of `size` containing `lower_bound`
    ///
    /// Answers from the level of that size when explored; otherwise merges
    /// the largest explored finer size that divides `size`; otherwise falls
    /// back to the smallest coarser explored bucket containing it, and
    /// finally to the root. Sizes at or above the root size, and bounds that
    /// cannot be placed on the grid, get the root bucket.
    pub fn get_bucket(&self, size: BucketSize, lower_bound: f64) -> Bucket {
        match to_units(lower_bound) {
            Some(units) => self.lookup(size, units),
            None => self.root().clone(),
        }
    }

    fn lookup(&self, size: BucketSize, units: i128) -> Bucket {
        if size >= self.root_size {
            return self.root().clone();
        }
        let offset = size.align(units);
        if let Some(level) = self.levels.get(&size) {
            return match level.get_by_offset(offset) {
                Some(bucket) => bucket.clone(),
                None => self.coarsen(size, units),
            };
        }
        self.refine(size, offset)
            .unwrap_or_else(|| self.coarsen(size, units))
    }

    fn refine(&self, size: BucketSize, offset: i128) -> Option<Bucket> {
        let child_size = self
            .levels
            .range(..size)
            .rev()
            .map(|(&s, _)| s)
            .find(|s| s.divides(size))?;
        let merged = Bucket::new(size, offset, BucketData::Empty);
        let slots = merged.split(child_size).ok().flatten()?;

        // A child answered by a coarser bucket would be counted more than once
        let children = slots
            .iter()
            .map(|slot| {
                Some(self.lookup(child_size, slot.offset())).filter(|b| b.size() == child_size)
            })
            .collect::<Option<Vec<Bucket>>>()?;
        let data = BucketData::merge(children.iter().map(Bucket::data));
        Some(merged.with_data(data))
    }

    fn coarsen(&self, size: BucketSize, units: i128) -> Bucket {
        self.levels
            .range((Excluded(size), Excluded(self.root_size)))
            .find_map(|(coarser, level)| level.get_by_offset(coarser.align(units)))
            .cloned()
            .unwrap_or_else(|| self.root().clone())
    }

    /// Every bucket in the tree, coarsest level first
    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> + '_ {
        self.levels().flat_map(BucketLevel::buckets)
    }
}
