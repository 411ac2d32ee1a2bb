//! Sorting result rows into observed buckets and suppressed aggregates

use crate::query::{BucketRowSchema, QueryResult, Row};
use bucket_core::{to_units, BucketSize, Error, Result};
use bucket_tree::{Bucket, BucketData, ObservedStats};

/// What a row of a bucketed statistics query stands for
#[derive(Debug, Clone, PartialEq)]
pub enum RowClass {
    /// A bucket that survived suppression
    Observed {
        size: BucketSize,
        lower_bound: f64,
        stats: ObservedStats,
    },
    /// The aggregate of every value the source withheld for one size
    Suppressed { count: f64 },
}

impl RowClass {
    /// The bucket an observed row describes, aligned to its size
    ///
    /// `None` for suppressed rows.
    pub fn into_bucket(self) -> Result<Option<Bucket>> {
        match self {
            Self::Observed {
                size,
                lower_bound,
                stats,
            } => {
                let units = to_units(lower_bound)
                    .ok_or_else(|| Error::non_finite("bucket lower bound"))?;
                Ok(Some(Bucket::new(size, size.align(units), BucketData::Observed(stats))))
            }
            Self::Suppressed { .. } => Ok(None),
        }
    }
}

/// Classify one row
///
/// A row with exactly one non-null bucket column is an observed bucket of that
/// size; a row with none is the suppressed aggregate.
///
/// # Errors
///
/// - [`Error::AmbiguousRow`] if more than one bucket column is set
/// - [`Error::InvalidInput`] if the row width is wrong or an observed row lacks its bounds
pub fn classify(schema: &BucketRowSchema, labels: &[String], row: &Row) -> Result<RowClass> {
    if row.len() != schema.width() {
        return Err(Error::size_mismatch(schema.width(), row.len(), "bucketed row"));
    }

    let mut set = schema
        .bucket_columns()
        .iter()
        .filter_map(|&(size, column)| row[column].map(|lower_bound| (size, column, lower_bound)));

    let Some((size, _, lower_bound)) = set.next() else {
        return Ok(RowClass::Suppressed {
            count: schema.stats().count(row),
        });
    };

    let extra: Vec<usize> = set.map(|(_, column, _)| column).collect();
    if !extra.is_empty() {
        let columns = schema
            .bucket_columns()
            .iter()
            .filter(|(_, column)| row[*column].is_some())
            .map(|(_, column)| labels[*column].clone())
            .collect();
        return Err(Error::AmbiguousRow { columns });
    }

    let stats = schema.stats().observed(row)?.ok_or_else(|| {
        Error::InvalidInput(format!(
            "bucket row at {lower_bound} of size {size} has no count or bounds"
        ))
    })?;
    Ok(RowClass::Observed {
        size,
        lower_bound,
        stats,
    })
}

/// Every row of `result`, classified
pub fn classify_all(schema: &BucketRowSchema, result: &QueryResult) -> Result<Vec<RowClass>> {
    result
        .rows
        .iter()
        .map(|row| classify(schema, &result.labels, row))
        .collect()
}

/// Pair suppressed counts with bucket sizes
///
/// Larger buckets hide fewer values, so the smallest size gets the largest
/// count. Sizes left without a suppressed row, always the largest ones, get
/// zero. Returned largest size first.
pub fn assign_suppressed(sizes: &[BucketSize], counts: &[f64]) -> Vec<(BucketSize, f64)> {
    let mut ascending = sizes.to_vec();
    ascending.sort();
    let mut descending = counts.to_vec();
    descending.sort_by(|a, b| b.total_cmp(a));

    let mut assigned: Vec<(BucketSize, f64)> = ascending
        .into_iter()
        .enumerate()
        .map(|(i, size)| (size, descending.get(i).copied().unwrap_or(0.0)))
        .collect();
    assigned.reverse();
    assigned
}
