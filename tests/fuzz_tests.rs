//! Fuzz Tests for Gap Detection, Merging and the Cache Codec
//!
//! Uses property-based testing (proptest) to check the invariants the
//! querier relies on when it splits a window into store calls and stitches
//! the answers back together.

use kuba_querier::querier::codec::{decode, encode};
use kuba_querier::querier::gaps::{find_missing_ranges, GapPolicy};
use kuba_querier::querier::merge::merge_series;
use kuba_querier::types::{Labels, Point, Series, TimeRange};
use proptest::prelude::*;
use std::collections::BTreeSet;

// =============================================================================
// Test Data Strategies
// =============================================================================

/// Strategy for sample values, including non-finite ones
///
/// Finite values span the whole f64 range, subnormals included.
fn sample_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        8 => any::<f64>().prop_filter("finite", |v| v.is_finite()),
        1 => Just(f64::NAN),
        1 => Just(f64::INFINITY),
        1 => Just(f64::NEG_INFINITY),
    ]
}

/// Strategy for small label sets drawn from a narrow vocabulary
fn labels() -> impl Strategy<Value = Labels> {
    prop::collection::btree_map(
        prop_oneof![Just("service"), Just("env"), Just("le")],
        prop_oneof![Just("api"), Just("db"), Just("prod"), Just("0.5")],
        0..3,
    )
    .prop_map(|pairs| Labels::from_pairs(pairs))
}

/// Strategy for a series with timestamps in `[0, 1000)`
fn series() -> impl Strategy<Value = Series> {
    (
        labels(),
        prop::collection::vec((0i64..1000, sample_value()), 0..20),
    )
        .prop_map(|(labels, points)| {
            Series::new(
                labels,
                points.into_iter().map(|(t, v)| Point::new(t, v)).collect(),
            )
        })
}

fn collection() -> impl Strategy<Value = Vec<Series>> {
    prop::collection::vec(series(), 0..6)
}

/// Window inside `[-200, 1200)` and a step
fn window_and_step() -> impl Strategy<Value = (TimeRange, i64)> {
    (-200i64..1200, 0i64..1400, 1i64..120).prop_map(|(start, len, step)| {
        (TimeRange::new_unchecked(start, start + len), step)
    })
}

/// Canonical form: unique labels, unique ascending timestamps
fn canonical(series: Vec<Series>) -> Vec<Series> {
    merge_series(series, Vec::new())
}

fn coverage(series: &[Series]) -> BTreeSet<(Labels, i64)> {
    series
        .iter()
        .flat_map(|s| s.points.iter().map(move |p| (s.labels.clone(), p.timestamp)))
        .collect()
}

fn same_value(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

fn align_down(ts: i64, step: i64) -> i64 {
    ts - ts.rem_euclid(step)
}

// =============================================================================
// Gap Detection Fuzz Tests
// =============================================================================

mod gap_detection {
    use super::*;

    proptest! {
        /// Nothing cached means the whole window is missing
        #[test]
        fn empty_cache_is_whole_window((window, step) in window_and_step()) {
            let missing = find_missing_ranges(window, step, &[], GapPolicy::default());
            prop_assert_eq!(missing, vec![window]);
        }

        /// Missing ranges are non-empty, ascending, disjoint and inside the window
        #[test]
        fn ranges_are_ordered_and_contained(
            (window, step) in window_and_step(),
            cached in collection(),
            gap_steps in 1i64..4,
        ) {
            let missing = find_missing_ranges(window, step, &cached, GapPolicy::with_gap_steps(gap_steps));

            for range in &missing {
                prop_assert!(range.start < range.end || *range == window);
                prop_assert!(range.start >= window.start);
                prop_assert!(range.end <= window.end);
            }
            for pair in missing.windows(2) {
                prop_assert!(pair[0].end <= pair[1].start);
            }
        }

        /// No missing range overlaps the bucket of a cached sample
        #[test]
        fn cached_buckets_are_never_refetched(
            (window, step) in window_and_step(),
            cached in collection(),
        ) {
            let missing = find_missing_ranges(window, step, &cached, GapPolicy::default());
            let has_sample = cached
                .iter()
                .flat_map(|s| s.points.iter())
                .any(|p| window.contains(p.timestamp));
            prop_assume!(has_sample);

            for p in cached.iter().flat_map(|s| s.points.iter()) {
                if !window.contains(p.timestamp) {
                    continue;
                }
                let bucket = TimeRange::new_unchecked(
                    align_down(p.timestamp, step),
                    align_down(p.timestamp, step) + step,
                );
                for range in &missing {
                    prop_assert!(range.intersect(&bucket).is_none());
                }
            }
        }

        /// A sample in every step bucket of the window leaves nothing to fetch
        #[test]
        fn full_coverage_is_empty(
            start_bucket in -10i64..10,
            buckets in 1i64..50,
            step in 1i64..100,
        ) {
            let window = TimeRange::new_unchecked(start_bucket * step, (start_bucket + buckets) * step);
            let points = (0..buckets)
                .map(|i| Point::new(window.start + i * step, 1.0))
                .collect();
            let cached = vec![Series::new(Labels::from_pairs([("m", "1")]), points)];

            let missing = find_missing_ranges(window, step, &cached, GapPolicy::default());
            prop_assert!(missing.is_empty());
        }
    }
}

// =============================================================================
// Merge Fuzz Tests
// =============================================================================

mod merging {
    use super::*;

    proptest! {
        /// Merging with nothing fresh returns the cached collection
        #[test]
        fn merge_with_empty_is_identity(cached in collection()) {
            let cached = canonical(cached);
            let merged = merge_series(cached.clone(), Vec::new());
            prop_assert_eq!(merged.len(), cached.len());
            prop_assert_eq!(coverage(&merged), coverage(&cached));
        }

        /// Merging a collection with itself changes nothing
        #[test]
        fn merge_is_idempotent(cached in collection()) {
            let cached = canonical(cached);
            let merged = merge_series(cached.clone(), cached.clone());
            prop_assert_eq!(coverage(&merged), coverage(&cached));
            for (m, c) in merged.iter().zip(cached.iter()) {
                prop_assert_eq!(&m.labels, &c.labels);
                for (a, b) in m.points.iter().zip(c.points.iter()) {
                    prop_assert!(same_value(a.value, b.value));
                }
            }
        }

        /// Which (labels, timestamp) pairs exist does not depend on argument order
        #[test]
        fn coverage_is_commutative(a in collection(), b in collection()) {
            let ab = merge_series(a.clone(), b.clone());
            let ba = merge_series(b, a);
            prop_assert_eq!(coverage(&ab), coverage(&ba));
        }

        /// Output series are sorted by labels with strictly ascending timestamps
        #[test]
        fn merge_output_is_canonical(a in collection(), b in collection()) {
            let merged = merge_series(a, b);
            for pair in merged.windows(2) {
                prop_assert!(pair[0].labels < pair[1].labels);
            }
            for s in &merged {
                for pair in s.points.windows(2) {
                    prop_assert!(pair[0].timestamp < pair[1].timestamp);
                }
            }
        }

        /// Fresh samples win every collision
        #[test]
        fn fresh_values_take_precedence(a in collection(), b in collection()) {
            let merged = merge_series(a, b.clone());
            for fresh in canonical(b) {
                let out = merged.iter().find(|s| s.labels == fresh.labels).unwrap();
                for p in &fresh.points {
                    let m = out.points.iter().find(|q| q.timestamp == p.timestamp).unwrap();
                    prop_assert!(same_value(m.value, p.value));
                }
            }
        }
    }
}

// =============================================================================
// Codec Fuzz Tests
// =============================================================================

mod codec {
    use super::*;

    proptest! {
        /// Encode then decode preserves labels, timestamps and values
        #[test]
        fn roundtrip_preserves_series(series in collection()) {
            let decoded = decode(&encode(&series).unwrap()).unwrap();

            prop_assert_eq!(decoded.len(), series.len());
            for (d, s) in decoded.iter().zip(series.iter()) {
                prop_assert_eq!(&d.labels, &s.labels);
                prop_assert_eq!(d.points.len(), s.points.len());
                for (dp, sp) in d.points.iter().zip(s.points.iter()) {
                    prop_assert_eq!(dp.timestamp, sp.timestamp);
                    prop_assert!(same_value(dp.value, sp.value));
                }
            }
        }

        /// Arbitrary bytes never panic the decoder
        #[test]
        fn decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode(&data);
        }
    }
}
