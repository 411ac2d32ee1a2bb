//! The boundary to the data source
//!
//! Exploration never talks to a database directly. A [`QueryBuilder`] turns
//! (table, column, sizes) into opaque requests and a [`QueryExecutor`] runs
//! them, returning rows of nullable numbers with one label per column.

use bucket_core::{BucketSize, Error, Result};
use bucket_tree::ObservedStats;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// One result row, `None` where the source returned null
pub type Row = Vec<Option<f64>>;

/// Rows returned by the data source with their column labels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub labels: Vec<String>,
}

impl QueryResult {
    pub fn new(labels: Vec<String>, rows: Vec<Row>) -> Self {
        Self { rows, labels }
    }

    /// Position of the column labelled `label`
    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Position of a column the caller cannot do without
    pub fn require_column(&self, label: &str) -> Result<usize> {
        self.column_index(label)
            .ok_or_else(|| Error::MissingColumn(label.to_string()))
    }

    /// Check every row has one value per label
    pub fn check_width(&self) -> Result<()> {
        match self.rows.iter().find(|row| row.len() != self.labels.len()) {
            Some(row) => Err(Error::size_mismatch(
                self.labels.len(),
                row.len(),
                "query result row",
            )),
            None => Ok(()),
        }
    }

    /// Statistics of the whole column from the top-level query
    ///
    /// Reads the first row's `count`, `min`, `max` and, when present, `avg`
    /// and `count_noise`.
    pub fn top_level_stats(&self) -> Result<ObservedStats> {
        self.check_width()?;
        let row = self
            .rows
            .first()
            .ok_or_else(|| Error::empty_input("top level statistics"))?;
        let schema = StatsColumns::resolve(self)?;
        schema
            .observed(row)?
            .ok_or_else(|| Error::empty_input("top level statistics"))
    }

    /// Number of values hidden in the suppressed row of a distinct query
    ///
    /// The suppressed row is the one whose value column is null. The value
    /// column is the first one not labelled `count`. Zero when nothing was
    /// suppressed.
    pub fn suppressed_distinct_count(&self) -> Result<f64> {
        self.check_width()?;
        let count = self.require_column(COUNT)?;
        let value = self
            .labels
            .iter()
            .position(|l| l != COUNT)
            .ok_or_else(|| Error::MissingColumn("distinct value".to_string()))?;

        Ok(self
            .rows
            .iter()
            .find(|row| row[value].is_none())
            .and_then(|row| row[count])
            .unwrap_or(0.0))
    }
}

pub const COUNT: &str = "count";
pub const MIN: &str = "min";
pub const MAX: &str = "max";
pub const AVG: &str = "avg";
pub const COUNT_NOISE: &str = "count_noise";

/// Produces requests for the data source
///
/// Requests are opaque to the explorer; a SQL builder would render query
/// text, a test double can use an enum.
pub trait QueryBuilder {
    /// The request type handed to the executor
    type Request: Debug;

    /// `count`, `min`, `max` and optionally `avg` and `count_noise` over the whole column
    fn top_level_stats(&self, table: &str, column: &str) -> Self::Request;

    /// Each distinct value of the column with its `count`
    fn top_level_distinct(&self, table: &str, column: &str) -> Self::Request;

    /// Statistics per bucket of a single size
    fn bucketed_stats(&self, table: &str, column: &str, size: BucketSize) -> Self::Request;

    /// Statistics per bucket for several sizes in one request
    ///
    /// Each returned row sets the bucket column of exactly one size, or none
    /// for the suppressed rows.
    fn multi_bucket_stats(&self, table: &str, column: &str, sizes: &[BucketSize]) -> Self::Request;

    /// Label of the column holding lower bounds for `size`
    fn bucket_label(&self, size: BucketSize) -> String {
        format!("bucket_{size}")
    }
}

/// Runs requests against the data source
pub trait QueryExecutor<R> {
    /// Execute `request`; transport failures surface as [`Error::Other`]
    fn fetch(&mut self, request: &R) -> Result<QueryResult>;
}

impl<R, E: QueryExecutor<R> + ?Sized> QueryExecutor<R> for &mut E {
    fn fetch(&mut self, request: &R) -> Result<QueryResult> {
        (**self).fetch(request)
    }
}

/// Positions of the aggregate columns in a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsColumns {
    pub count: usize,
    pub min: usize,
    pub max: usize,
    pub avg: Option<usize>,
    pub count_noise: Option<usize>,
}

impl StatsColumns {
    pub fn resolve(result: &QueryResult) -> Result<Self> {
        Ok(Self {
            count: result.require_column(COUNT)?,
            min: result.require_column(MIN)?,
            max: result.require_column(MAX)?,
            avg: result.column_index(AVG),
            count_noise: result.column_index(COUNT_NOISE),
        })
    }

    /// Row count, zero when null
    pub fn count(&self, row: &Row) -> f64 {
        row[self.count].unwrap_or(0.0)
    }

    /// Stats of a row, `None` when the row carries no bounds
    pub fn observed(&self, row: &Row) -> Result<Option<ObservedStats>> {
        let (Some(count), Some(min), Some(max)) = (row[self.count], row[self.min], row[self.max])
        else {
            return Ok(None);
        };
        if !(count.is_finite() && min.is_finite() && max.is_finite()) {
            return Err(Error::non_finite("aggregate row"));
        }
        let mut stats = ObservedStats::new(count, min, max);
        stats.avg = self.avg.and_then(|i| row[i]);
        stats.count_noise = self.count_noise.and_then(|i| row[i]);
        Ok(Some(stats))
    }
}

/// Layout of a bucketed statistics result, resolved once per round
#[derive(Debug, Clone, PartialEq)]
pub struct BucketRowSchema {
    bucket_columns: Vec<(BucketSize, usize)>,
    stats: StatsColumns,
    width: usize,
}

impl BucketRowSchema {
    /// Find the bucket column of every requested size and the aggregate columns
    ///
    /// # Errors
    ///
    /// [`Error::MissingColumn`] if a bucket column or `count`, `min`, `max` is absent.
    pub fn resolve<B>(builder: &B, result: &QueryResult, sizes: &[BucketSize]) -> Result<Self>
    where
        B: QueryBuilder + ?Sized,
    {
        let bucket_columns = sizes
            .iter()
            .map(|&size| Ok((size, result.require_column(&builder.bucket_label(size))?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            bucket_columns,
            stats: StatsColumns::resolve(result)?,
            width: result.labels.len(),
        })
    }

    /// Bucket sizes and the positions of their lower bound columns
    pub fn bucket_columns(&self) -> &[(BucketSize, usize)] {
        &self.bucket_columns
    }

    pub fn stats(&self) -> &StatsColumns {
        &self.stats
    }

    /// Number of columns every row must have
    pub fn width(&self) -> usize {
        self.width
    }

    /// Labels of the aggregate columns, without the bucket columns
    pub fn aggregate_labels(&self, result: &QueryResult) -> Vec<String> {
        result
            .labels
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.bucket_columns.iter().any(|(_, column)| column == i))
            .map(|(_, label)| label.clone())
            .collect()
    }
}
