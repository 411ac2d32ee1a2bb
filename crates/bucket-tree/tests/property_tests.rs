//! Property-based tests for interpolation and tree lookups

use approx::assert_relative_eq;
use bucket_core::{canonical_sizes, BucketSize};
use bucket_tree::{interpolate, Bucket, BucketData, BucketTree, LevelMetadata, ObservedStats};
use proptest::prelude::*;

fn size(value: f64) -> BucketSize {
    BucketSize::from_value(value).unwrap()
}

fn observed(bucket_size: BucketSize, slot: usize, count: f64) -> Bucket {
    let lower = slot as f64 * bucket_size.value();
    let stats = ObservedStats::new(count, lower, lower + bucket_size.value() / 2.0);
    Bucket::observed(bucket_size, lower, stats).unwrap()
}

fn observed_level(bucket_size: BucketSize, kept: &[(usize, f64)]) -> Vec<Bucket> {
    kept.iter()
        .map(|&(slot, count)| observed(bucket_size, slot, count))
        .collect()
}

/// Tree over `[0, 1000)` with two levels below the root
fn two_level_tree(kept_100: &[(usize, f64)], kept_20: &[(usize, f64)], total: f64) -> BucketTree {
    let top = ObservedStats::new(total, 0.0, 999.0);
    let mut tree = BucketTree::from_top_level(top, LevelMetadata::default()).unwrap();
    let level_100 = observed_level(size(100.0), kept_100);
    tree.insert_query_result(size(100.0), level_100, LevelMetadata::default())
        .unwrap();
    let level_20 = observed_level(size(20.0), kept_20);
    tree.insert_query_result(size(20.0), level_20, LevelMetadata::default())
        .unwrap();
    tree
}

/// The two-level tree with an empty 5-wide level below it
fn three_level_tree(kept_100: &[(usize, f64)], total: f64) -> BucketTree {
    let mut tree = two_level_tree(kept_100, &[], total);
    tree.insert_query_result(size(5.0), Vec::new(), LevelMetadata::default())
        .unwrap();
    tree
}

/// Observed 50-wide children tiling `parent`, from `(count, min offset, spread)` triples
fn partition(parent: &Bucket, parts: &[(u32, u32, u32)]) -> Vec<Bucket> {
    let slots = parent.split(size(50.0)).unwrap().unwrap();
    slots
        .iter()
        .zip(parts)
        .map(|(slot, &(count, offset, spread))| {
            let min = slot.lower_bound() + f64::from(offset);
            let stats = ObservedStats::new(f64::from(count), min, min + f64::from(spread));
            Bucket::observed(slot.size(), slot.lower_bound(), stats).unwrap()
        })
        .collect()
}

proptest! {
    // Property: children of a parent always add up to the parent's count
    #[test]
    fn prop_interpolation_conserves_count(
        total in 0.0f64..1e6,
        kept in prop::collection::btree_map(0usize..10, 0.0f64..1e5, 0..10)
    ) {
        let top = ObservedStats::new(total, 0.0, 999.0);
        let parent = Bucket::observed(size(1000.0), 0.0, top).unwrap();
        let kept: Vec<(usize, f64)> = kept.into_iter().collect();
        let children = observed_level(size(100.0), &kept);
        let tiling = interpolate(&parent, size(100.0), children).unwrap();

        prop_assert_eq!(tiling.len(), 10);
        let sum: f64 = tiling.iter().map(Bucket::count).sum();
        assert_relative_eq!(sum, total, epsilon = 1e-6, max_relative = 1e-9);
        for (bucket, slot) in tiling.iter().zip(0..) {
            prop_assert_eq!(bucket.lower_bound(), slot as f64 * 100.0);
            prop_assert_eq!(
                bucket.data().is_observed(),
                kept.iter().any(|&(kept_slot, _)| kept_slot == slot)
            );
        }
    }

    // Property: every level tiles the one above it without changing any count
    #[test]
    fn prop_levels_conserve_parent_counts(
        total in 100.0f64..1e5,
        kept_100 in prop::collection::btree_map(0usize..10, 0.0f64..100.0, 0..10),
        kept_20 in prop::collection::btree_map(0usize..50, 0.0f64..20.0, 0..50)
    ) {
        let kept_100: Vec<(usize, f64)> = kept_100.into_iter().collect();
        let kept_20: Vec<(usize, f64)> = kept_20.into_iter().collect();
        let tree = two_level_tree(&kept_100, &kept_20, total);

        let coarse = tree.level(size(100.0)).unwrap();
        let fine = tree.level(size(20.0)).unwrap();
        prop_assert_eq!(fine.len(), 50);
        for parent in coarse.buckets() {
            let children: f64 = fine
                .buckets_in_range(parent.lower_bound(), parent.upper_bound())
                .map(Bucket::count)
                .sum();
            assert_relative_eq!(children, parent.count(), epsilon = 1e-6, max_relative = 1e-9);
        }
        assert_relative_eq!(fine.total_count(), total, epsilon = 1e-6, max_relative = 1e-9);
    }

    // Property: lookups are pure and always return a bucket containing the bound
    #[test]
    fn prop_get_bucket_contains_bound(
        position in 0usize..30,
        lower_bound in 0.0f64..999.0,
        kept_100 in prop::collection::btree_map(0usize..10, 0.0f64..100.0, 0..10)
    ) {
        let kept_100: Vec<(usize, f64)> = kept_100.into_iter().collect();
        let tree = three_level_tree(&kept_100, 1000.0);
        let requested = canonical_sizes().nth(position).unwrap();

        let first = tree.get_bucket(requested, lower_bound);
        let second = tree.get_bucket(requested, lower_bound);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.data(), second.data());
        prop_assert!(
            first.contains_value(lower_bound),
            "{} does not contain {}",
            first,
            lower_bound
        );
    }

    // Property: merging the observed children of a split gives back the parent
    #[test]
    fn prop_split_then_merge_restores_parent(
        slot in 0usize..2,
        parts in prop::collection::vec((1u32..50, 0u32..25, 0u32..25), 4)
    ) {
        let lower = slot as f64 * 200.0;
        let parent = Bucket::at(size(200.0), lower, BucketData::Empty).unwrap();
        let children = partition(&parent, &parts);
        prop_assert_eq!(children.len(), 4);
        prop_assert!(children.iter().all(|child| parent.contains(child)));

        let count: f64 = parts.iter().map(|&(c, _, _)| f64::from(c)).sum();
        let min = children[0].data().min().unwrap();
        let max = children[3].data().max().unwrap();
        let expected = ObservedStats::new(count, min, max);

        let merged = BucketData::merge(children.iter().map(Bucket::data));
        prop_assert_eq!(&merged, &BucketData::Observed(expected));

        // Fill the rest of [0, 500) so the 50-wide level is fully observed
        let others: Vec<Bucket> = (0..10)
            .map(|i| observed(size(50.0), i, 1.0))
            .filter(|bucket| !parent.contains(bucket))
            .collect();
        let total = count + others.len() as f64;
        let top = ObservedStats::new(total, 0.0, 499.0);
        let mut tree = BucketTree::from_top_level(top, LevelMetadata::default()).unwrap();
        prop_assert_eq!(tree.next_level_size(), Some(size(50.0)));
        let level: Vec<Bucket> = children.into_iter().chain(others).collect();
        tree.insert_query_result(size(50.0), level, LevelMetadata::default())
            .unwrap();

        let looked_up = tree.get_bucket(size(200.0), lower + 10.0);
        prop_assert_eq!(&looked_up, &parent);
        prop_assert_eq!(looked_up.data(), &BucketData::Observed(expected));
    }

    // Property: only the size the tree announces can be inserted
    #[test]
    fn prop_only_next_size_is_accepted(position in 0usize..72) {
        let top = ObservedStats::new(1000.0, 0.0, 999.0);
        let mut tree = BucketTree::from_top_level(top, LevelMetadata::default()).unwrap();
        let candidate = canonical_sizes().nth(position).unwrap();

        let accepted = Some(candidate) == tree.next_level_size();

        let result = tree.insert_query_result(candidate, Vec::new(), LevelMetadata::default());
        prop_assert_eq!(result.is_ok(), accepted);
        prop_assert_eq!(tree.depth(), usize::from(accepted));
    }
}

#[test]
fn test_lookups_at_every_size_follow_the_finest_level() {
    let kept_100: Vec<(usize, f64)> = (0..10).filter(|&i| i != 3).map(|i| (i, 90.0)).collect();
    let tree = two_level_tree(&kept_100, &[(0, 20.0)], 1000.0);

    // [300, 400) was interpolated from the root; its 20-wide children split it evenly
    assert_relative_eq!(tree.get_bucket(size(100.0), 300.0).count(), 190.0);
    assert_relative_eq!(tree.get_bucket(size(20.0), 340.0).count(), 38.0);
    assert_relative_eq!(tree.get_bucket(size(20.0), 40.0).count(), 17.5);
    // 200 merges two 100-wide buckets; 10 falls back to the containing 20-wide bucket
    assert_relative_eq!(tree.get_bucket(size(200.0), 200.0).count(), 280.0);
    assert!(tree.get_bucket(size(200.0), 200.0).data().is_synthetic());
    let fallback = tree.get_bucket(size(10.0), 305.0);
    assert_eq!(fallback.size(), size(20.0));
    assert_eq!(fallback.lower_bound(), 300.0);
}
