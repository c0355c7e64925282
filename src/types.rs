//! Core data types used throughout the querier
//!
//! # Key Types
//!
//! - **`TimeRange`**: Time window for queries and cache gaps (start, end)
//! - **`Labels`**: Canonical label set identifying a series
//! - **`Point`**: A single `(timestamp, value)` sample
//! - **`Series`**: Labels plus timestamp-ordered points
//!
//! # Example
//!
//! ```rust
//! use kuba_querier::types::{Labels, Point, Series, TimeRange};
//!
//! let range = TimeRange::new(1_000, 2_000).unwrap();
//! assert!(range.contains(1_500));
//! assert!(!range.contains(2_000));
//!
//! let labels = Labels::from_pairs([("host", "server1"), ("dc", "us-east")]);
//! let series = Series::new(labels, vec![Point::new(1_000, 42.5)]);
//! assert_eq!(series.points.len(), 1);
//! ```

use crate::error::QuerierError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Time window in epoch milliseconds
///
/// Coverage arithmetic treats the window as the half-open span
/// `[start, end)`: a sample at `t` with step `s` accounts for the
/// step-aligned bucket containing `t`, so a window ending at `end` is fully
/// covered once the last bucket reaches `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start timestamp in milliseconds (inclusive)
    pub start: i64,

    /// End timestamp in milliseconds (exclusive for coverage)
    pub end: i64,
}

impl TimeRange {
    /// Create a new time range with validation
    ///
    /// # Example
    ///
    /// ```rust
    /// use kuba_querier::types::TimeRange;
    ///
    /// let range = TimeRange::new(1000, 2000).unwrap();
    /// assert_eq!(range.duration_ms(), 1000);
    ///
    /// assert!(TimeRange::new(2000, 1000).is_err());
    /// ```
    pub fn new(start: i64, end: i64) -> Result<Self, QuerierError> {
        if start > end {
            return Err(QuerierError::InvalidRequest(format!(
                "Invalid time range: start {} > end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Create a new time range without validation
    ///
    /// Only use this when `start <= end` is already known to hold.
    pub fn new_unchecked(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Check if a timestamp falls within `[start, end)`
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Length of the range in milliseconds
    pub fn duration_ms(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }

    /// True when the range spans no time at all
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Intersect with another range, `None` if they do not overlap
    pub fn intersect(&self, other: &TimeRange) -> Option<TimeRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(TimeRange { start, end })
        } else {
            None
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Label set identifying a series
///
/// Backed by an ordered map so two label sets built in different insertion
/// orders compare, hash and serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    /// Create an empty label set
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build from key/value pairs; later duplicates overwrite earlier ones
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Add or replace a label
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Get a label value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no labels
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate labels in canonical (key-sorted) order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}=\"{}\"", k, v)?;
        }
        write!(f, "}}")
    }
}

/// A single sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Timestamp in milliseconds since epoch
    pub timestamp: i64,

    /// Sample value; non-finite values survive the cache codec
    #[serde(with = "crate::querier::codec::sample_value")]
    pub value: f64,
}

impl Point {
    /// Create a new point
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A labelled sequence of samples, ascending by timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Identity of the series
    pub labels: Labels,

    /// Samples ordered by timestamp
    #[serde(default)]
    pub points: Vec<Point>,
}

impl Series {
    /// Create a series from labels and points, sorting points by timestamp
    pub fn new(labels: Labels, mut points: Vec<Point>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self { labels, points }
    }

    /// Earliest and latest timestamps, `None` for an empty series
    pub fn time_bounds(&self) -> Option<(i64, i64)> {
        let first = self.points.iter().map(|p| p.timestamp).min()?;
        let last = self.points.iter().map(|p| p.timestamp).max()?;
        Some((first, last))
    }
}
