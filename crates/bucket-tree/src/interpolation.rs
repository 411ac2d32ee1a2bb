//! Reconciling a parent aggregate with incomplete child observations
//!
//! A query at a finer bucket size only returns the buckets that survived
//! suppression. The parent bucket one level up still knows the total, so
//! whatever the returned children do not account for is attributed to the
//! children that are missing.

use crate::traits::{EqualSplit, InterpolationContext, InterpolationPolicy};
use crate::types::{Bucket, BucketData};
use bucket_core::{BucketSize, Error, Result};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Interpolate the children of `parent` with the equal-split policy
pub fn interpolate(
    parent: &Bucket,
    child_size: BucketSize,
    children: Vec<Bucket>,
) -> Result<Vec<Bucket>> {
    interpolate_with(parent, child_size, children, &EqualSplit)
}

/// Interpolate the children of `parent` with a custom policy
///
/// Returns the complete tiling of `parent` at `child_size`, sorted by lower
/// bound: the observed children unchanged plus one synthetic bucket for each
/// missing slot. Children of an empty parent stay empty.
///
/// # Errors
///
/// - [`Error::ShapeMismatch`] if `child_size` does not evenly divide the parent
/// - [`Error::InvalidInput`] if a child has the wrong size, lies outside the
///   parent or appears twice, or if the policy returns the wrong number of counts
pub fn interpolate_with(
    parent: &Bucket,
    child_size: BucketSize,
    children: Vec<Bucket>,
    policy: &dyn InterpolationPolicy,
) -> Result<Vec<Bucket>> {
    let ratio = parent
        .size()
        .ratio(child_size)
        .ok_or(Error::ShapeMismatch {
            parent: parent.size(),
            child: child_size,
        })?;

    let mut observed = BTreeMap::new();
    for child in children {
        if child.size() != child_size {
            return Err(Error::InvalidInput(format!(
                "child bucket of size {} interpolated at size {child_size}",
                child.size()
            )));
        }
        if !parent.contains(&child) {
            return Err(Error::InvalidInput(format!("{child} lies outside parent {parent}")));
        }
        if let Some(duplicate) = observed.insert(child.offset(), child) {
            return Err(Error::InvalidInput(format!("duplicate child {duplicate}")));
        }
    }

    if observed.len() as u128 == ratio {
        return Ok(observed.into_values().collect());
    }

    let step = child_size.units();
    let missing: Vec<i128> = (0..ratio as i128)
        .map(|k| parent.offset() + k * step)
        .filter(|offset| !observed.contains_key(offset))
        .collect();

    let observed: Vec<Bucket> = observed.into_values().collect();
    let synthetic = synthesise(parent, child_size, &observed, &missing, policy)?;

    let mut tiling: Vec<Bucket> = observed.into_iter().chain(synthetic).collect();
    tiling.sort_by_key(Bucket::offset);
    Ok(tiling)
}

fn synthesise(
    parent: &Bucket,
    child_size: BucketSize,
    observed: &[Bucket],
    missing: &[i128],
    policy: &dyn InterpolationPolicy,
) -> Result<Vec<Bucket>> {
    if parent.data().is_empty() {
        return Ok(missing
            .iter()
            .map(|&offset| Bucket::new(child_size, offset, BucketData::Empty))
            .collect());
    }

    let observed_total: f64 = observed.iter().map(Bucket::count).sum();
    let missing_total = parent.count() - observed_total;
    if missing_total < 0.0 {
        warn!(
            parent = %parent,
            observed_total,
            "Observed children exceed parent count, interpolated counts will be negative"
        );
    }

    let context = InterpolationContext {
        parent,
        observed,
        missing,
        missing_total,
    };
    let counts = policy.distribute(&context);
    if counts.len() != missing.len() {
        return Err(Error::InvalidInput(format!(
            "interpolation policy {} returned {} counts for {} missing buckets",
            policy.name(),
            counts.len(),
            missing.len()
        )));
    }

    debug!(
        parent = %parent,
        missing = missing.len(),
        missing_total,
        policy = policy.name(),
        "Interpolated missing buckets"
    );

    Ok(missing
        .iter()
        .zip(counts)
        .map(|(&offset, count)| Bucket::new(child_size, offset, BucketData::synthetic(count)))
        .collect())
}
