//! The canonical bucket size sequence
//!
//! Every bucket size used by a tree is drawn from `{1, 2, 5} x 10^e` with
//! `e` in `[-4, 19]`. Sizes are stored as `(exponent, base)` pairs so that
//! ordering, hashing and divisibility checks are exact; the floating point
//! value is only derived when talking to the data source.
//!
//! Terminology used throughout the workspace:
//!
//! - *bucket size*: the width of the value range covered by one bucket
//! - *bucket count*: the number of values inside one bucket
//! - *bucket number*: the number of buckets covering a range
//!
//! For 1000 values spread over `0..100` a bucket size of 5 gives a bucket
//! number of 20 and a bucket count of 50 on average.

use crate::{Error, Result};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest exponent of the canonical sequence
pub const MIN_EXPONENT: i32 = -4;

/// Largest exponent of the canonical sequence
pub const MAX_EXPONENT: i32 = 19;

/// Leading digits of the canonical sequence
pub const BASES: [u8; 3] = [1, 2, 5];

/// Number of sizes in the canonical sequence
pub const CANONICAL_LEN: usize = ((MAX_EXPONENT - MIN_EXPONENT + 1) as usize) * BASES.len();

/// Grid positions per unit value; the grid step is the smallest canonical size
pub const UNITS_PER_ONE: i128 = 10_000;

const ALIGNMENT_TOLERANCE: f64 = 1e-9;
const GRID_TOLERANCE: f64 = 1e-12;

/// A bucket width from the canonical `{1, 2, 5} x 10^e` sequence
///
/// The derived ordering compares the exponent first and the base second,
/// which matches numeric ordering because `5 x 10^e < 1 x 10^(e+1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub struct BucketSize {
    exponent: i32,
    base: u8,
}

impl BucketSize {
    /// Create a size from its base (1, 2 or 5) and decimal exponent
    pub fn new(base: u8, exponent: i32) -> Result<Self> {
        if !BASES.contains(&base) || !(MIN_EXPONENT..=MAX_EXPONENT).contains(&exponent) {
            return Err(Error::InvalidParameter(format!(
                "bucket size {base} x 10^{exponent} is outside the canonical sequence"
            )));
        }
        Ok(Self { exponent, base })
    }

    /// Look up the canonical size equal to `value`
    pub fn from_value(value: f64) -> Result<Self> {
        canonical_sizes()
            .find(|size| (size.value() - value).abs() <= ALIGNMENT_TOLERANCE * size.value())
            .ok_or(Error::InvalidSize(value))
    }

    /// Smallest size of the sequence
    pub fn smallest() -> Self {
        Self { exponent: MIN_EXPONENT, base: BASES[0] }
    }

    /// Largest size of the sequence
    pub fn largest() -> Self {
        Self { exponent: MAX_EXPONENT, base: BASES[BASES.len() - 1] }
    }

    /// Leading digit of the size (1, 2 or 5)
    pub fn base(&self) -> u8 {
        self.base
    }

    /// Decimal exponent of the size
    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    /// Floating point width of the size
    pub fn value(&self) -> f64 {
        from_units(self.units())
    }

    /// Position of this size in the ascending canonical sequence
    pub fn position(&self) -> usize {
        let base_idx = BASES.iter().position(|&b| b == self.base).unwrap_or(0);
        (self.exponent - MIN_EXPONENT) as usize * BASES.len() + base_idx
    }

    /// Size at `position` in the ascending canonical sequence
    pub fn from_position(position: usize) -> Option<Self> {
        if position >= CANONICAL_LEN {
            return None;
        }
        Some(Self {
            exponent: MIN_EXPONENT + (position / BASES.len()) as i32,
            base: BASES[position % BASES.len()],
        })
    }

    /// The size `steps` positions below this one, if the sequence reaches that far
    pub fn smaller_by(&self, steps: usize) -> Option<Self> {
        self.position().checked_sub(steps).and_then(Self::from_position)
    }

    /// Number of `smaller` buckets that tile one bucket of this size
    ///
    /// Returns `None` when `smaller` is larger than this size or does not
    /// divide it evenly.
    pub fn ratio(&self, smaller: BucketSize) -> Option<u128> {
        if *self < smaller {
            return None;
        }
        let diff = (self.exponent - smaller.exponent) as u32;
        let numerator = u128::from(self.base) * 10u128.pow(diff);
        let denominator = u128::from(smaller.base);
        (numerator % denominator == 0).then(|| numerator / denominator)
    }

    /// Whether this size evenly divides `larger`
    pub fn divides(&self, larger: BucketSize) -> bool {
        larger.ratio(*self).is_some()
    }

    /// Width of this size on the fixed-point grid
    pub fn units(&self) -> i128 {
        i128::from(self.base) * 10i128.pow((self.exponent - MIN_EXPONENT) as u32)
    }

    /// Start of the bucket of this size containing grid position `units`
    pub fn align(&self, units: i128) -> i128 {
        units.div_euclid(self.units()) * self.units()
    }
}

impl fmt::Display for BucketSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl From<BucketSize> for f64 {
    fn from(size: BucketSize) -> Self {
        size.value()
    }
}

impl TryFrom<f64> for BucketSize {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Self::from_value(value)
    }
}

/// All canonical sizes in ascending order
pub fn canonical_sizes() -> impl DoubleEndedIterator<Item = BucketSize> + Clone {
    (0..CANONICAL_LEN).filter_map(BucketSize::from_position)
}

/// Position of `value` on the fixed-point grid
///
/// The grid resolution is the smallest canonical size, so every aligned
/// lower bound of every canonical size is an exact grid position. Values
/// within floating point tolerance of a grid point snap to it, anything else
/// rounds down. Returns `None` for non-finite or out of range values.
pub fn to_units(value: f64) -> Option<i128> {
    let scaled = value * UNITS_PER_ONE as f64;
    if !scaled.is_finite() {
        return None;
    }
    let nearest = scaled.round();
    let units = if (scaled - nearest).abs() <= GRID_TOLERANCE * nearest.abs().max(1.0) {
        nearest
    } else {
        scaled.floor()
    };
    units.to_i128()
}

/// Value of grid position `units`
pub fn from_units(units: i128) -> f64 {
    units as f64 / UNITS_PER_ONE as f64
}

/// Leading digit of `value` after normalising it to `[1, 10)`
pub fn base(value: f64) -> u8 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let mut normalised = value;
    while normalised >= 10.0 - ALIGNMENT_TOLERANCE {
        normalised /= 10.0;
    }
    while normalised < 1.0 - ALIGNMENT_TOLERANCE {
        normalised *= 10.0;
    }
    (normalised + ALIGNMENT_TOLERANCE).floor().to_u8().unwrap_or(0)
}

/// Smallest canonical size strictly greater than `value`
pub fn next_after(value: f64) -> Option<BucketSize> {
    canonical_sizes().find(|size| size.value() > value)
}

/// Largest canonical size strictly smaller than `value`
pub fn first_before(value: f64) -> Option<BucketSize> {
    canonical_sizes().rev().find(|size| size.value() < value)
}

/// Canonical sizes strictly smaller than `value`, largest first
pub fn sizes_smaller_than(value: f64) -> impl Iterator<Item = BucketSize> {
    canonical_sizes().rev().filter(move |size| size.value() < value)
}

/// Canonical sizes strictly larger than `value`, smallest first
pub fn sizes_larger_than(value: f64) -> impl Iterator<Item = BucketSize> {
    canonical_sizes().filter(move |size| size.value() > value)
}

/// Canonical sizes strictly between `lo` and `hi`, ascending
///
/// Empty when `lo >= hi`.
pub fn sizes_in_range(lo: f64, hi: f64) -> Vec<BucketSize> {
    canonical_sizes()
        .filter(|size| size.value() > lo && size.value() < hi)
        .collect()
}

/// Canonical sizes whose base is one of `bases`, ascending
pub fn sizes_with_base(bases: &[u8]) -> impl Iterator<Item = BucketSize> + '_ {
    canonical_sizes().filter(move |size| bases.contains(&size.base()))
}
