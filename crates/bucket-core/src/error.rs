//! Error types for bucket exploration
//!
//! Provides a unified error type for all bucket-explorer crates. Variants
//! describe caller protocol violations and estimation failures; data-quality
//! anomalies such as negative interpolated counts are never errors and are
//! reported through the values themselves.

use crate::sizes::BucketSize;
use thiserror::Error;

/// Core error type for bucket exploration
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid parameter provided to a function
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A value that is not part of the canonical bucket size sequence
    #[error("Invalid bucket size: {0} is not of the form {{1,2,5}} x 10^e, e in [-4, 19]")]
    InvalidSize(f64),

    /// A bucket size does not evenly divide the size it is nested in
    #[error("Shape mismatch: bucket size {child} does not evenly divide parent size {parent}")]
    ShapeMismatch { parent: BucketSize, child: BucketSize },

    /// A level was inserted out of the order mandated by the tree
    #[error("Level inserted out of order: expected {}, got {actual}", display_expected(.expected))]
    OutOfOrder {
        expected: Option<BucketSize>,
        actual: BucketSize,
    },

    /// A level was inserted at or above the root
    #[error("Level size {size} is not strictly below the root size {root}")]
    NotBelowRoot { root: BucketSize, size: BucketSize },

    /// No canonical bucket size satisfies the estimation bounds
    #[error(
        "Estimation exhausted: no bucket size exceeds {size_bound} \
         (range {value_range}, count {value_count})"
    )]
    EstimationExhausted {
        value_range: f64,
        value_count: f64,
        size_bound: f64,
    },

    /// A query result row has more than one non-null bucket column
    #[error("Ambiguous row: multiple bucket columns are set ({})", .columns.join(", "))]
    AmbiguousRow { columns: Vec<String> },

    /// A query result lacks a column the row schema requires
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Other errors, typically raised by query collaborators
    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

fn display_expected(expected: &Option<BucketSize>) -> String {
    match expected {
        Some(size) => size.to_string(),
        None => "no further level".to_string(),
    }
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

// Helper functions for common error patterns

impl Error {
    /// Create an error for empty input
    pub fn empty_input(operation: &str) -> Self {
        Self::InvalidInput(format!("{operation} requires at least one value"))
    }

    /// Create an error for a row whose width differs from the labels
    pub fn size_mismatch(expected: usize, actual: usize, context: &str) -> Self {
        Self::InvalidInput(format!(
            "Size mismatch in {context}: expected {expected}, got {actual}"
        ))
    }

    /// Create an error for NaN/Inf values
    pub fn non_finite(context: &str) -> Self {
        Self::InvalidInput(format!("{context} contains NaN or infinite values"))
    }

    /// Whether this error indicates a caller protocol violation
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::ShapeMismatch { .. }
                | Self::OutOfOrder { .. }
                | Self::NotBelowRoot { .. }
                | Self::AmbiguousRow { .. }
        )
    }
}
