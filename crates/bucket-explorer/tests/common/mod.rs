//! Common test utilities for bucket-explorer tests
//!
//! [`SimulatedSource`] answers exploration queries over an in-memory column
//! the way a suppressing data source would: every group with fewer than
//! `min_group` values is withheld and folded into a single suppressed row.

#![allow(dead_code)]

use bucket_core::{from_units, to_units, BucketSize, Result};
use bucket_explorer::{QueryBuilder, QueryExecutor, QueryResult, Row};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, Uniform};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum SimRequest {
    TopLevelStats,
    TopLevelDistinct,
    Buckets(Vec<BucketSize>),
}

/// Builds requests for [`SimulatedSource`]
pub struct SimBuilder;

impl QueryBuilder for SimBuilder {
    type Request = SimRequest;

    fn top_level_stats(&self, _table: &str, _column: &str) -> SimRequest {
        SimRequest::TopLevelStats
    }

    fn top_level_distinct(&self, _table: &str, _column: &str) -> SimRequest {
        SimRequest::TopLevelDistinct
    }

    fn bucketed_stats(&self, _table: &str, _column: &str, size: BucketSize) -> SimRequest {
        SimRequest::Buckets(vec![size])
    }

    fn multi_bucket_stats(&self, _table: &str, _column: &str, sizes: &[BucketSize]) -> SimRequest {
        SimRequest::Buckets(sizes.to_vec())
    }
}

/// An in-memory column behind group suppression
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    values: Vec<f64>,
    min_group: usize,
    pub requests: Vec<SimRequest>,
}

impl SimulatedSource {
    pub fn new(values: Vec<f64>, min_group: usize) -> Self {
        Self {
            values,
            min_group,
            requests: Vec::new(),
        }
    }

    /// `n` normally distributed values
    pub fn normal(n: usize, mean: f64, std: f64, min_group: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let normal = Normal::new(mean, std).unwrap();
        Self::new((0..n).map(|_| normal.sample(&mut rng)).collect(), min_group)
    }

    /// `n` uniformly distributed values in `[low, high)`
    pub fn uniform(n: usize, low: f64, high: f64, min_group: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let uniform = Uniform::new(low, high);
        Self::new((0..n).map(|_| uniform.sample(&mut rng)).collect(), min_group)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of values in the bucket of `size` at grid offset `offset`
    pub fn count_in(&self, size: BucketSize, offset: i128) -> usize {
        self.values
            .iter()
            .filter(|&&v| to_units(v).map(|u| size.align(u)) == Some(offset))
            .count()
    }

    fn group_by<K: Ord>(&self, key: impl Fn(f64) -> K) -> BTreeMap<K, Vec<f64>> {
        let mut groups: BTreeMap<K, Vec<f64>> = BTreeMap::new();
        for &value in &self.values {
            groups.entry(key(value)).or_default().push(value);
        }
        groups
    }

    fn aggregate(values: &[f64]) -> [Option<f64>; 5] {
        let count = values.len() as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = values.iter().sum::<f64>() / count;
        [Some(count), Some(min), Some(max), Some(avg), Some(0.0)]
    }

    fn top_level_stats(&self) -> QueryResult {
        let labels = labels(&["count", "min", "max", "avg", "count_noise"]);
        QueryResult::new(labels, vec![Self::aggregate(&self.values).to_vec()])
    }

    fn top_level_distinct(&self) -> QueryResult {
        let groups = self.group_by(|v| to_units(v).unwrap_or_default());
        let mut rows: Vec<Row> = Vec::new();
        let mut suppressed = 0usize;
        for (units, group) in groups {
            if group.len() < self.min_group {
                suppressed += group.len();
            } else {
                rows.push(vec![Some(from_units(units)), Some(group.len() as f64)]);
            }
        }
        if suppressed > 0 {
            rows.push(vec![None, Some(suppressed as f64)]);
        }
        QueryResult::new(labels(&["value", "count"]), rows)
    }

    fn bucketed_stats(&self, sizes: &[BucketSize]) -> QueryResult {
        let mut labels: Vec<String> = sizes.iter().map(|&s| SimBuilder.bucket_label(s)).collect();
        labels.extend(self::labels(&["count", "min", "max", "avg", "count_noise"]));

        let mut rows: Vec<Row> = Vec::new();
        for (position, &size) in sizes.iter().enumerate() {
            let groups = self.group_by(|v| size.align(to_units(v).unwrap_or_default()));
            let mut suppressed = 0usize;
            for (offset, group) in groups {
                if group.len() < self.min_group {
                    suppressed += group.len();
                    continue;
                }
                let mut row: Row = vec![None; sizes.len()];
                row[position] = Some(from_units(offset));
                row.extend(Self::aggregate(&group));
                rows.push(row);
            }
            if suppressed > 0 {
                let mut row: Row = vec![None; sizes.len()];
                row.extend([Some(suppressed as f64), None, None, None, None]);
                rows.push(row);
            }
        }
        QueryResult::new(labels, rows)
    }
}

impl QueryExecutor<SimRequest> for SimulatedSource {
    fn fetch(&mut self, request: &SimRequest) -> Result<QueryResult> {
        self.requests.push(request.clone());
        Ok(match request {
            SimRequest::TopLevelStats => self.top_level_stats(),
            SimRequest::TopLevelDistinct => self.top_level_distinct(),
            SimRequest::Buckets(sizes) => self.bucketed_stats(sizes),
        })
    }
}

/// Executor whose connection is always down
pub struct Unreachable;

impl QueryExecutor<SimRequest> for Unreachable {
    fn fetch(&mut self, request: &SimRequest) -> Result<QueryResult> {
        Err(anyhow::anyhow!("connection refused while running {request:?}").into())
    }
}

pub fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

pub fn size(value: f64) -> BucketSize {
    BucketSize::from_value(value).unwrap()
}

/// Route `tracing` output to the test harness, honouring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
