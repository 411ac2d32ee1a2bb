//! Core traits for reconciling suppressed buckets

use crate::types::Bucket;
use std::fmt::Debug;

/// What an interpolation policy gets to see about one parent bucket
#[derive(Debug, Clone, Copy)]
pub struct InterpolationContext<'a> {
    /// The coarser bucket whose count the children must add up to
    pub parent: &'a Bucket,
    /// Children returned by the query, sorted by lower bound
    pub observed: &'a [Bucket],
    /// Grid offsets of the children the query did not return, ascending
    pub missing: &'a [i128],
    /// Parent count minus the observed children's counts; may be negative
    pub missing_total: f64,
}

/// Strategy for distributing a parent's unexplained count over missing children
///
/// Implementations must return exactly one count per missing slot, in the
/// order of [`InterpolationContext::missing`]. Counts are not clamped: a
/// negative `missing_total` (noise pushing the observed sum past the parent)
/// should come out as negative counts so callers can see it.
pub trait InterpolationPolicy: Debug + Send + Sync {
    /// Counts for the missing children
    fn distribute(&self, context: &InterpolationContext<'_>) -> Vec<f64>;

    /// Policy name for logging
    fn name(&self) -> &'static str;
}

/// Splits the unexplained count equally between missing children
///
/// Assumes values are uniformly spread over the unobserved sub-ranges, which
/// is the only assumption available without issuing more queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualSplit;

impl InterpolationPolicy for EqualSplit {
    fn distribute(&self, context: &InterpolationContext<'_>) -> Vec<f64> {
        if context.missing.is_empty() {
            return Vec::new();
        }
        let per_slot = context.missing_total / context.missing.len() as f64;
        vec![per_slot; context.missing.len()]
    }

    fn name(&self) -> &'static str {
        "equal_split"
    }
}
