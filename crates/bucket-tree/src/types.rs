//! Core types for bucket representation

use bucket_core::{from_units, to_units, BucketSize, Error, Result};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Aggregate returned by the data source for one bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ObservedStats {
    /// Number of values in the bucket (possibly noisy)
    pub count: f64,
    /// Smallest value in the bucket
    pub min: f64,
    /// Largest value in the bucket
    pub max: f64,
    /// Mean of the values, if the source reports it
    pub avg: Option<f64>,
    /// Standard deviation of the noise added to `count`, if reported
    pub count_noise: Option<f64>,
}

impl ObservedStats {
    /// Create stats from count and value bounds
    pub fn new(count: f64, min: f64, max: f64) -> Self {
        Self {
            count,
            min,
            max,
            avg: None,
            count_noise: None,
        }
    }

    /// Attach the mean
    pub fn with_avg(mut self, avg: f64) -> Self {
        self.avg = Some(avg);
        self
    }

    /// Attach the count noise estimate
    pub fn with_count_noise(mut self, count_noise: f64) -> Self {
        self.count_noise = Some(count_noise);
        self
    }
}

/// Payload carried by a bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BucketData {
    /// Real aggregate returned by a query
    Observed(ObservedStats),
    /// Count estimated by interpolation or merged from partly estimated buckets
    ///
    /// Bounds are only known when some merged child was observed.
    Synthetic {
        count: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Nothing is known about this bucket
    Empty,
}

impl BucketData {
    /// Synthetic payload with unknown bounds
    pub fn synthetic(count: f64) -> Self {
        Self::Synthetic {
            count,
            min: None,
            max: None,
        }
    }

    /// Count of the bucket, zero when empty
    pub fn count(&self) -> f64 {
        match self {
            Self::Observed(stats) => stats.count,
            Self::Synthetic { count, .. } => *count,
            Self::Empty => 0.0,
        }
    }

    /// Smallest value, if known
    pub fn min(&self) -> Option<f64> {
        match self {
            Self::Observed(stats) => Some(stats.min),
            Self::Synthetic { min, .. } => *min,
            Self::Empty => None,
        }
    }

    /// Largest value, if known
    pub fn max(&self) -> Option<f64> {
        match self {
            Self::Observed(stats) => Some(stats.max),
            Self::Synthetic { max, .. } => *max,
            Self::Empty => None,
        }
    }

    /// Mean value, only known for observed buckets that report it
    pub fn avg(&self) -> Option<f64> {
        match self {
            Self::Observed(stats) => stats.avg,
            _ => None,
        }
    }

    /// Whether the payload came straight from a query
    pub fn is_observed(&self) -> bool {
        matches!(self, Self::Observed(_))
    }

    /// Whether the payload was estimated
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::Synthetic { .. })
    }

    /// Whether nothing is known
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Combine the payloads of adjacent buckets into one
    ///
    /// Counts are summed and bounds take the extremes of the known bounds.
    /// The result stays observed only when every part was observed, in which
    /// case means are weighted by count and noise adds in quadrature. Empty
    /// parts contribute nothing; merging only empty parts yields `Empty`.
    pub fn merge<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = &'a BucketData>,
    {
        let mut count = 0.0;
        let mut min: Option<f64> = None;
        let mut max: Option<f64> = None;
        let mut weighted_avg = Some(0.0);
        let mut noise_sq = Some(0.0);
        let mut all_observed = true;
        let mut any_known = false;

        for part in parts {
            match part {
                Self::Empty => {
                    all_observed = false;
                    continue;
                }
                Self::Observed(stats) => {
                    weighted_avg = weighted_avg
                        .zip(stats.avg)
                        .map(|(acc, avg)| acc + avg * stats.count);
                    noise_sq = noise_sq.zip(stats.count_noise).map(|(acc, n)| acc + n * n);
                }
                Self::Synthetic { .. } => all_observed = false,
            }
            any_known = true;
            count += part.count();
            min = merge_bound(min, part.min(), f64::min);
            max = merge_bound(max, part.max(), f64::max);
        }

        if !any_known {
            return Self::Empty;
        }

        match (all_observed, min, max) {
            (true, Some(min), Some(max)) => Self::Observed(ObservedStats {
                count,
                min,
                max,
                avg: weighted_avg.filter(|_| count > 0.0).map(|sum| sum / count),
                count_noise: noise_sq.map(f64::sqrt),
            }),
            _ => Self::Synthetic { count, min, max },
        }
    }
}

fn merge_bound(acc: Option<f64>, value: Option<f64>, pick: fn(f64, f64) -> f64) -> Option<f64> {
    match (acc, value) {
        (Some(a), Some(v)) => Some(pick(a, v)),
        (a, v) => a.or(v),
    }
}

impl fmt::Display for BucketData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |v: Option<f64>| v.map_or_else(|| "?".to_string(), |v| v.to_string());
        match self {
            Self::Observed(stats) => write!(
                f,
                "observed(count: {}, min: {}, max: {})",
                stats.count, stats.min, stats.max
            ),
            Self::Synthetic { count, min, max } => write!(
                f,
                "synthetic(count: {:.3}, min: {}, max: {})",
                count,
                bound(*min),
                bound(*max)
            ),
            Self::Empty => write!(f, "empty"),
        }
    }
}

/// A contiguous value range `[lower_bound, lower_bound + size)` with a payload
///
/// Lower bounds live on the fixed-point grid of `bucket_core::sizes`, so
/// identity is exact. Equality and hashing only consider the size and the
/// lower bound, never the payload.
#[derive(Debug, Clone)]
pub struct Bucket {
    size: BucketSize,
    offset: i128,
    data: BucketData,
}

impl Bucket {
    /// Create a bucket at grid position `offset`
    pub fn new(size: BucketSize, offset: i128, data: BucketData) -> Self {
        Self { size, offset, data }
    }

    /// Create a bucket from a floating point lower bound
    pub fn at(size: BucketSize, lower_bound: f64, data: BucketData) -> Result<Self> {
        let offset = to_units(lower_bound).ok_or_else(|| Error::non_finite("bucket lower bound"))?;
        Ok(Self::new(size, offset, data))
    }

    /// Create an observed bucket
    pub fn observed(size: BucketSize, lower_bound: f64, stats: ObservedStats) -> Result<Self> {
        Self::at(size, lower_bound, BucketData::Observed(stats))
    }

    /// Width of the bucket
    pub fn size(&self) -> BucketSize {
        self.size
    }

    /// Lower bound as a grid position
    pub fn offset(&self) -> i128 {
        self.offset
    }

    /// Inclusive lower bound
    pub fn lower_bound(&self) -> f64 {
        from_units(self.offset)
    }

    /// Exclusive upper bound
    pub fn upper_bound(&self) -> f64 {
        from_units(self.end())
    }

    /// Exclusive upper bound as a grid position
    pub fn end(&self) -> i128 {
        self.offset + self.size.units()
    }

    /// Payload
    pub fn data(&self) -> &BucketData {
        &self.data
    }

    /// Count of the payload
    pub fn count(&self) -> f64 {
        self.data.count()
    }

    /// Replace the payload
    pub fn with_data(mut self, data: BucketData) -> Self {
        self.data = data;
        self
    }

    /// Check if a value falls within this bucket
    pub fn contains_value(&self, value: f64) -> bool {
        to_units(value).is_some_and(|units| units >= self.offset && units < self.end())
    }

    /// Check if `other` lies entirely within this bucket
    pub fn contains(&self, other: &Bucket) -> bool {
        other.offset >= self.offset && other.end() <= self.end()
    }

    /// Split into empty buckets of a smaller size tiling this one
    ///
    /// Returns `Ok(None)` when `smaller` does not divide this size evenly.
    pub fn split(&self, smaller: BucketSize) -> Result<Option<Vec<Bucket>>> {
        if smaller >= self.size {
            return Err(Error::InvalidParameter(format!(
                "cannot split a bucket of size {} into buckets of size {smaller}",
                self.size
            )));
        }
        let Some(ratio) = self.size.ratio(smaller) else {
            return Ok(None);
        };
        let step = smaller.units();
        let children = (0..ratio as i128)
            .map(|k| Bucket::new(smaller, self.offset + k * step, BucketData::Empty))
            .collect();
        Ok(Some(children))
    }
}

impl PartialEq for Bucket {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.offset == other.offset
    }
}

impl Eq for Bucket {}

impl Hash for Bucket {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.size.hash(state);
        self.offset.hash(state);
    }
}

impl Serialize for Bucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Bucket", 3)?;
        state.serialize_field("size", &self.size)?;
        state.serialize_field("lower_bound", &self.lower_bound())?;
        state.serialize_field("data", &self.data)?;
        state.end()
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bucket({} - {}): {}",
            self.lower_bound(),
            self.upper_bound(),
            self.data
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    fn size(value: f64) -> BucketSize {
        BucketSize::from_value(value).unwrap()
    }

    #[test]
    fn test_bucket_identity() {
        let a = Bucket::observed(size(10.0), 20.0, ObservedStats::new(5.0, 21.0, 29.0)).unwrap();
        let b = Bucket::at(size(10.0), 20.0, BucketData::synthetic(3.0)).unwrap();
        let c = Bucket::at(size(20.0), 20.0, BucketData::Empty).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<Bucket> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_bucket_bounds() {
        let bucket = Bucket::at(size(0.1), 0.3, BucketData::Empty).unwrap();
        assert_eq!(bucket.lower_bound(), 0.3);
        assert_eq!(bucket.upper_bound(), 0.4);
        assert!(bucket.contains_value(0.35));
        assert!(!bucket.contains_value(0.4)); // Upper bound is exclusive
        assert_eq!(bucket.to_string(), "Bucket(0.3 - 0.4): empty");
        assert!(Bucket::at(size(0.1), f64::NAN, BucketData::Empty).is_err());
    }

    #[test]
    fn test_split() {
        let bucket = Bucket::at(size(100.0), 200.0, BucketData::Empty).unwrap();
        let children = bucket.split(size(20.0)).unwrap().unwrap();
        let bounds: Vec<f64> = children.iter().map(Bucket::lower_bound).collect();
        assert_eq!(bounds, vec![200.0, 220.0, 240.0, 260.0, 280.0]);
        assert!(children.iter().all(|c| bucket.contains(c)));

        let bucket = Bucket::at(size(500.0), 0.0, BucketData::Empty).unwrap();
        assert!(bucket.split(size(200.0)).unwrap().is_none());
        assert!(bucket.split(size(1000.0)).is_err());
        assert!(bucket.split(size(500.0)).is_err());
    }

    #[test]
    fn test_merge_observed() {
        let parts = vec![
            BucketData::Observed(
                ObservedStats::new(10.0, 1.0, 4.0)
                    .with_avg(2.0)
                    .with_count_noise(3.0),
            ),
            BucketData::Observed(
                ObservedStats::new(30.0, 5.0, 9.0)
                    .with_avg(6.0)
                    .with_count_noise(4.0),
            ),
        ];
        let merged = BucketData::merge(&parts);
        match merged {
            BucketData::Observed(stats) => {
                assert_eq!(stats.count, 40.0);
                assert_eq!(stats.min, 1.0);
                assert_eq!(stats.max, 9.0);
                assert_relative_eq!(stats.avg.unwrap(), 5.0);
                assert_relative_eq!(stats.count_noise.unwrap(), 5.0);
            }
            other => panic!("expected observed payload, got {other}"),
        }
    }

    #[test]
    fn test_merge_mixed() {
        let parts = vec![
            BucketData::Observed(ObservedStats::new(10.0, 1.0, 4.0)),
            BucketData::synthetic(7.5),
            BucketData::Empty,
        ];
        let merged = BucketData::merge(&parts);
        assert_eq!(
            merged,
            BucketData::Synthetic {
                count: 17.5,
                min: Some(1.0),
                max: Some(4.0)
            }
        );
        assert!(merged.avg().is_none());

        assert_eq!(BucketData::merge(&[BucketData::Empty, BucketData::Empty]), BucketData::Empty);
        assert_eq!(BucketData::merge(&[]), BucketData::Empty);
    }

    #[test]
    fn test_serialize() {
        let bucket =
            Bucket::observed(size(5.0), 10.0, ObservedStats::new(4.0, 10.5, 14.0)).unwrap();
        let json = serde_json::to_value(&bucket).unwrap();
        assert_eq!(json["size"], 5.0);
        assert_eq!(json["lower_bound"], 10.0);
        assert_eq!(json["data"]["kind"], "observed");
        assert_eq!(json["data"]["count"], 4.0);

        let synthetic = serde_json::to_value(BucketData::synthetic(2.0)).unwrap();
        assert_eq!(synthetic["kind"], "synthetic");
        assert!(synthetic["min"].is_null());
    }
}
