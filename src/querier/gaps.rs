//! Missing range detection
//!
//! Coverage is derived from the timestamps actually present in the cached
//! series, never from the window the entry was stored under. Each sample at
//! `t` covers the step bucket `[align_down(t), align_down(t) + step)`.
//!
//! ```text
//! window:   [0 ........................................ 100)
//! cached:            30   40   50   60
//! missing:  [0 .. 30)                   [70 .......... 100)
//! ```

use crate::types::{Series, TimeRange};

/// Default interior gap threshold, in steps
pub const DEFAULT_GAP_STEPS: i64 = 1;

/// Tuning for gap detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapPolicy {
    /// Consecutive cached samples further apart than `gap_steps * step`
    /// leave an interior hole that is re-fetched
    pub gap_steps: i64,
}

impl Default for GapPolicy {
    fn default() -> Self {
        Self {
            gap_steps: DEFAULT_GAP_STEPS,
        }
    }
}

impl GapPolicy {
    /// Policy with a custom interior gap threshold in steps (minimum 1)
    pub fn with_gap_steps(steps: i64) -> Self {
        Self {
            gap_steps: steps.max(1),
        }
    }

    /// Interior gap threshold in milliseconds for `step`
    pub fn interior_gap_threshold(&self, step: i64) -> i64 {
        self.gap_steps.saturating_mul(step)
    }
}

/// Round `ts` down to a multiple of `step`
fn align_down(ts: i64, step: i64) -> i64 {
    ts - ts.rem_euclid(step)
}

/// Compute the sub-windows of `window` not covered by `cached`
///
/// Returns ascending, non-overlapping ranges contained in `window`. An empty
/// cache (or one with no samples inside the window) yields `[window]`; full
/// coverage yields an empty vector. A zero-length window can hold no cached
/// sample, so instant queries always go to the store.
pub fn find_missing_ranges(
    window: TimeRange,
    step: i64,
    cached: &[Series],
    policy: GapPolicy,
) -> Vec<TimeRange> {
    let step = step.max(1);

    let mut timestamps: Vec<i64> = cached
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.timestamp))
        .filter(|ts| window.contains(*ts))
        .collect();

    if timestamps.is_empty() {
        return vec![window];
    }

    timestamps.sort_unstable();
    timestamps.dedup();

    let mut candidates = Vec::new();

    // Leading hole before the first covered bucket
    let first = align_down(timestamps[0], step);
    candidates.push(TimeRange::new_unchecked(window.start, first));

    // Interior holes wider than the threshold
    let threshold = policy.interior_gap_threshold(step);
    for pair in timestamps.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b - a > threshold {
            candidates.push(TimeRange::new_unchecked(
                align_down(a, step).saturating_add(step),
                align_down(b, step),
            ));
        }
    }

    // Trailing hole after the last covered bucket
    let last = timestamps[timestamps.len() - 1];
    candidates.push(TimeRange::new_unchecked(
        align_down(last, step).saturating_add(step),
        window.end,
    ));

    candidates
        .into_iter()
        .filter_map(|range| range.intersect(&window))
        .collect()
}
