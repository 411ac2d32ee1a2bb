//! Driving the exploration of one column
//!
//! The driver owns the session: it queries the top-level statistics, decides
//! whether bucketing is worth it, and then drills down one round at a time.
//! Each round requests several bucket sizes in a single query, classifies the
//! rows and inserts the resulting levels into the tree atomically.

use crate::classify::{assign_suppressed, classify_all, RowClass};
use crate::config::ExplorationConfig;
use crate::query::{BucketRowSchema, QueryBuilder, QueryExecutor, QueryResult};
use bucket_core::{BucketSize, Result};
use bucket_tree::{Bucket, BucketTree, LevelInsert, LevelMetadata};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Exploration session for one (table, column)
pub struct ExplorationDriver<B, E>
where
    B: QueryBuilder,
    E: QueryExecutor<B::Request>,
{
    builder: B,
    executor: E,
    config: ExplorationConfig,
    table: String,
    column: String,
    tree: BucketTree,
    total_count: f64,
    target_size: BucketSize,
    column_labels: Vec<String>,
    rounds: usize,
}

impl<B, E> ExplorationDriver<B, E>
where
    B: QueryBuilder,
    E: QueryExecutor<B::Request>,
{
    /// Start a session: fetch the top-level statistics and distinct counts
    ///
    /// The tree starts with the root bucket only. The top-level suppressed
    /// count is recorded on the root level.
    #[instrument(skip_all, fields(table = %table, column = %column))]
    pub fn new(
        builder: B,
        mut executor: E,
        table: &str,
        column: &str,
        config: ExplorationConfig,
    ) -> Result<Self> {
        config.validate()?;

        let stats_result = executor.fetch(&builder.top_level_stats(table, column))?;
        let stats = stats_result.top_level_stats()?;
        let distinct = executor.fetch(&builder.top_level_distinct(table, column))?;
        let suppressed = distinct.suppressed_distinct_count()?;

        let target_size = config.estimator().estimate(stats.max - stats.min, stats.count)?;
        let total_count = stats.count;
        let metadata =
            LevelMetadata::suppressed(suppressed).with_labels(stats_result.labels.clone());
        let tree = BucketTree::from_top_level(stats, metadata)?;

        debug!(
            root = %tree.root_size(),
            %target_size,
            total_count,
            suppressed,
            "Initialised exploration"
        );

        Ok(Self {
            builder,
            executor,
            config,
            table: table.to_string(),
            column: column.to_string(),
            tree,
            total_count,
            target_size,
            column_labels: Vec::new(),
            rounds: 0,
        })
    }

    /// The tree explored so far
    pub fn tree(&self) -> &BucketTree {
        &self.tree
    }

    /// End the session, keeping the tree
    pub fn into_tree(self) -> BucketTree {
        self.tree
    }

    pub fn config(&self) -> &ExplorationConfig {
        &self.config
    }

    /// Count reported by the top-level statistics
    pub fn total_count(&self) -> f64 {
        self.total_count
    }

    /// Finest size the estimator considers useful for this column
    pub fn target_size(&self) -> BucketSize {
        self.target_size
    }

    /// Rounds run so far
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Aggregate column labels of the bucketed queries, empty before the first round
    pub fn column_labels(&self) -> &[String] {
        &self.column_labels
    }

    /// Fraction of all values suppressed at `size`, if that size was explored
    pub fn suppressed_ratio(&self, size: BucketSize) -> Option<f64> {
        self.tree
            .level(size)
            .map(|level| level.suppressed_ratio(self.total_count))
    }

    /// Whether so few values are suppressed overall that bucketing adds nothing
    pub fn is_futile(&self) -> bool {
        let ratio = self.tree.root_level().suppressed_ratio(self.total_count);
        ratio < self.config.suppression_threshold
    }

    /// Whether another round would be useful and allowed
    pub fn should_continue(&self) -> bool {
        if self.is_futile() || self.rounds >= self.config.max_rounds {
            return false;
        }
        if self.tree.next_level_size().is_none() || self.tree.min_size() <= self.target_size {
            return false;
        }
        // The root's ratio was checked above
        self.tree.depth() == 0
            || self.tree.finest_level().suppressed_ratio(self.total_count)
                >= self.config.suppression_threshold
    }

    /// Sizes the next round would request
    ///
    /// Up to `levels_per_round` sizes, stopping at the target size; always at
    /// least one while sizes remain.
    pub fn next_round_sizes(&self) -> Vec<BucketSize> {
        let candidates = self.tree.next_level_sizes(self.config.levels_per_round);
        let end = candidates
            .iter()
            .position(|&size| size < self.target_size)
            .unwrap_or(candidates.len())
            .max(1)
            .min(candidates.len());
        candidates[..end].to_vec()
    }

    /// Run one round and return the sizes inserted
    ///
    /// Returns an empty list when no size is left to explore. On error the
    /// tree is unchanged.
    #[instrument(skip(self), fields(round = self.rounds + 1))]
    pub fn explore_round(&mut self) -> Result<Vec<BucketSize>> {
        let sizes = self.next_round_sizes();
        if sizes.is_empty() {
            return Ok(sizes);
        }

        let request = match sizes.as_slice() {
            [size] => self.builder.bucketed_stats(&self.table, &self.column, *size),
            _ => self.builder.multi_bucket_stats(&self.table, &self.column, &sizes),
        };
        debug!(?request, "Fetching buckets");
        let result = self.executor.fetch(&request)?;
        let batch = self.build_round(&sizes, &result)?;
        let labels = batch.first().map(|insert| insert.metadata.labels.clone());

        self.tree.insert_round(batch)?;
        self.rounds += 1;
        if self.column_labels.is_empty() {
            self.column_labels = labels.unwrap_or_default();
        }

        for &size in &sizes {
            if let Some(level) = self.tree.level(size) {
                let negative = level.negative_synthetic_count();
                if negative > 0 {
                    warn!(%size, negative, "Interpolated buckets with negative counts");
                }
                debug!(
                    %size,
                    observed = level.observed_count(),
                    synthetic = level.synthetic_count(),
                    suppressed_ratio = level.suppressed_ratio(self.total_count),
                    "Explored level"
                );
            }
        }
        Ok(sizes)
    }

    fn build_round(&self, sizes: &[BucketSize], result: &QueryResult) -> Result<Vec<LevelInsert>> {
        let schema = BucketRowSchema::resolve(&self.builder, result, sizes)?;
        let labels = schema.aggregate_labels(result);

        let mut buckets: BTreeMap<BucketSize, Vec<Bucket>> =
            sizes.iter().map(|&size| (size, Vec::new())).collect();
        let mut suppressed = Vec::new();
        for class in classify_all(&schema, result)? {
            match class {
                RowClass::Suppressed { count } => suppressed.push(count),
                observed => {
                    if let Some(bucket) = observed.into_bucket()? {
                        buckets.entry(bucket.size()).or_default().push(bucket);
                    }
                }
            }
        }
        if suppressed.len() > sizes.len() {
            warn!(
                rows = suppressed.len(),
                sizes = sizes.len(),
                "More suppressed rows than requested sizes, smallest counts ignored"
            );
        }

        Ok(assign_suppressed(sizes, &suppressed)
            .into_iter()
            .map(|(size, suppressed_count)| LevelInsert {
                size,
                buckets: buckets.remove(&size).unwrap_or_default(),
                metadata: LevelMetadata::suppressed(suppressed_count).with_labels(labels.clone()),
            })
            .collect())
    }

    /// Drill down until refinement stops paying off
    ///
    /// Rounds continue while the finest level still has at least the
    /// threshold fraction suppressed, the finest size is above the target
    /// size, rounds remain and the size sequence is not exhausted.
    #[instrument(skip(self), fields(table = %self.table, column = %self.column))]
    pub fn run(&mut self) -> Result<&BucketTree> {
        if self.is_futile() {
            info!("Few values suppressed, keeping the root bucket only");
            return Ok(&self.tree);
        }
        while self.should_continue() {
            if self.explore_round()?.is_empty() {
                break;
            }
        }
        info!(
            rounds = self.rounds,
            levels = self.tree.depth(),
            finest = %self.tree.min_size(),
            "Exploration finished"
        );
        Ok(&self.tree)
    }
}
