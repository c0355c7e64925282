//! Kuba Querier - cache-aware range query execution
//!
//! This library runs composite range queries against a time-series store:
//! - One concurrent worker per named sub-query, exactly one result each
//! - Result cache keyed per sub-query, independent of the time window
//! - Only the ranges the cache does not cover are sent to the store
//! - Cache failures degrade to misses and never fail a query

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod model;
pub mod store;
pub mod translate;
pub mod types;

/// Prometheus metrics for cache and sub-query outcomes
pub mod metrics;

/// Configuration management with TOML support
pub mod config;

/// Tracing subscriber setup
pub mod telemetry;

/// Result cache interface, fail-open adapter and key generation
pub mod cache;

/// Gap detection, merging, and concurrent sub-query execution
pub mod querier;

// Re-export main types
pub use error::{QuerierError, Result};
pub use querier::{Querier, QuerierBuilder, QueryContext, QueryRangeOutcome, SubQueryResult};
pub use types::{Labels, Point, Series, TimeRange};
