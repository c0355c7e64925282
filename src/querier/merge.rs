//! Series merging
//!
//! Combines cached and freshly executed series by label identity. On a
//! timestamp collision the fresh sample wins: the cache only saves work, it
//! is never authoritative.

use crate::types::{Labels, Point, Series};
use std::collections::BTreeMap;

/// Merge `cached` with `fresh`
///
/// One output series per distinct label set, points ascending by timestamp,
/// `fresh` samples overriding `cached` ones at the same instant. Output
/// series are ordered by labels, so the result does not depend on how either
/// input was ordered.
///
/// # Example
///
/// ```rust
/// use kuba_querier::querier::merge::merge_series;
/// use kuba_querier::types::{Labels, Point, Series};
///
/// let labels = Labels::from_pairs([("m", "1")]);
/// let cached = vec![Series::new(labels.clone(), vec![Point::new(0, 5.0), Point::new(90, 9.0)])];
/// let fresh = vec![Series::new(labels, vec![Point::new(50, 7.0)])];
///
/// let merged = merge_series(cached, fresh);
/// let ts: Vec<i64> = merged[0].points.iter().map(|p| p.timestamp).collect();
/// assert_eq!(ts, vec![0, 50, 90]);
/// ```
pub fn merge_series(cached: Vec<Series>, fresh: Vec<Series>) -> Vec<Series> {
    let mut by_labels: BTreeMap<Labels, BTreeMap<i64, f64>> = BTreeMap::new();

    for series in cached.into_iter().chain(fresh) {
        let points = by_labels.entry(series.labels).or_default();
        for p in series.points {
            points.insert(p.timestamp, p.value);
        }
    }

    by_labels
        .into_iter()
        .map(|(labels, points)| Series {
            labels,
            points: points
                .into_iter()
                .map(|(timestamp, value)| Point { timestamp, value })
                .collect(),
        })
        .collect()
}

/// Drop samples older than `cutoff`
///
/// Series left without samples by the cut are dropped as well; series that
/// were already empty are kept.
pub fn trim_before(series: Vec<Series>, cutoff: i64) -> Vec<Series> {
    series
        .into_iter()
        .filter_map(|mut s| {
            if s.points.is_empty() {
                return Some(s);
            }
            s.points.retain(|p| p.timestamp >= cutoff);
            (!s.points.is_empty()).then_some(s)
        })
        .collect()
}
