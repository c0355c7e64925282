//! Cache-aware execution of a single sub-query
//!
//! ```text
//! cache key? ── no ──► translate full window ─► execute ─► emit
//!     │
//!    yes
//!     ▼
//! fetch (fail-open) ─► decode ─► missing ranges ─► for each range, in order:
//!                                                    translate ─► execute
//!                                                    (first error aborts)
//!                   ─► merge(cached, fresh) ─► emit ─► write back if fresh
//! ```
//!
//! The write-back is returned to the caller instead of being performed here,
//! so the merged result is always handed over before the cache is touched.
//! Samples older than one cache TTL before the window start are left out of
//! the write-back, which bounds how far back an entry reaches.

use super::{codec, gaps, merge, Querier, QueryContext, SubQueryResult};
use crate::error::{QuerierError, TranslateError};
use crate::metrics;
use crate::model::{AttributeKeys, BuilderQuery, DataSource, QueryRangeParams, SubQueryShape};
use crate::types::{Series, TimeRange};
use tracing::{debug, error};

/// Merged series to persist once the result has been emitted
#[derive(Debug, Clone)]
pub struct WriteBack {
    /// Cache key of the sub-query
    pub key: String,
    /// Full merged collection
    pub series: Vec<Series>,
}

/// Outcome of running one sub-query
#[derive(Debug)]
pub struct Execution {
    /// Result to emit
    pub result: SubQueryResult,
    /// Pending cache write-back
    pub write_back: Option<WriteBack>,
}

impl Execution {
    fn finished(result: SubQueryResult) -> Self {
        Self {
            result,
            write_back: None,
        }
    }

    fn failed(name: &str, query: impl Into<String>, error: QuerierError) -> Self {
        Self::finished(SubQueryResult::failure(name, query, error))
    }
}

impl Querier {
    /// Run a plain builder query
    ///
    /// Only metrics queries holding a cache key go through the cache; logs,
    /// traces and unkeyed metrics run once over the full window.
    pub async fn run_builder_query(
        &self,
        ctx: &QueryContext,
        query: &BuilderQuery,
        params: &QueryRangeParams,
        keys: &AttributeKeys,
        cache_key: Option<&str>,
    ) -> Execution {
        match cache_key {
            Some(cache_key) if query.data_source == DataSource::Metrics => {
                self.run_cached(ctx, query, params, keys, cache_key).await
            },
            _ => {
                let native = match self.prepare(query, params, keys, params.window()) {
                    Ok(native) => native,
                    Err(e) => return Execution::failed(&query.query_name, "", e.into()),
                };
                self.run_once(ctx, &query.query_name, native).await
            },
        }
    }

    /// Run a builder expression
    ///
    /// The full-window preparation always runs first and its failure fails
    /// the sub-query. Keyed expressions then re-prepare per missing range.
    pub async fn run_builder_expression(
        &self,
        ctx: &QueryContext,
        query: &BuilderQuery,
        params: &QueryRangeParams,
        keys: &AttributeKeys,
        cache_key: Option<&str>,
    ) -> Execution {
        let native = match self.prepare(query, params, keys, params.window()) {
            Ok(native) => native,
            Err(e) => return Execution::failed(&query.query_name, "", e.into()),
        };

        match cache_key {
            Some(cache_key) => self.run_cached(ctx, query, params, keys, cache_key).await,
            None => self.run_once(ctx, &query.query_name, native).await,
        }
    }

    /// Encode and store a merged collection; never fails
    pub async fn write_back(&self, write_back: WriteBack) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };

        match codec::encode(&write_back.series) {
            Ok(data) => {
                cache
                    .write_back(&write_back.key, data, self.settings.cache_ttl)
                    .await
            },
            Err(e) => {
                error!(cache_key = %write_back.key, error = %e, "error encoding merged series");
                metrics::record_cache_write_back("encode_error");
            },
        }
    }

    /// Native query for `query` over `window`
    fn prepare(
        &self,
        query: &BuilderQuery,
        params: &QueryRangeParams,
        keys: &AttributeKeys,
        window: TimeRange,
    ) -> Result<String, TranslateError> {
        match query.shape() {
            SubQueryShape::Query => {
                let composite = &params.composite_query;
                self.translators.for_source(query.data_source).prepare(
                    window,
                    composite.query_type,
                    composite.panel_type,
                    query,
                    keys,
                )
            },
            SubQueryShape::Expression => {
                let mut prepared = if window == params.window() {
                    self.expressions.prepare_queries(params, keys)?
                } else {
                    self.expressions
                        .prepare_queries(&params.with_window(window), keys)?
                };
                prepared
                    .remove(&query.query_name)
                    .ok_or_else(|| TranslateError::MissingPreparedQuery(query.query_name.clone()))
            },
        }
    }

    /// Oldest timestamp a write-back for `params` keeps
    fn retention_cutoff(&self, params: &QueryRangeParams) -> i64 {
        let ttl_ms = i64::try_from(self.settings.cache_ttl.as_millis()).unwrap_or(i64::MAX);
        params.start.saturating_sub(ttl_ms)
    }

    async fn run_once(&self, ctx: &QueryContext, name: &str, native: String) -> Execution {
        match ctx.run(self.store.execute(ctx, &native)).await {
            Ok(series) => Execution::finished(SubQueryResult::success(name, native, series)),
            Err(e) => Execution::failed(name, native, e),
        }
    }

    async fn run_cached(
        &self,
        ctx: &QueryContext,
        query: &BuilderQuery,
        params: &QueryRangeParams,
        keys: &AttributeKeys,
        cache_key: &str,
    ) -> Execution {
        let name = query.query_name.as_str();
        let shape = query.shape().as_str();
        let cache = self.cache_for(params.no_cache);

        let payload = match cache {
            Some(cache) => cache.fetch(cache_key).await,
            None => None,
        };
        let cached = match payload {
            Some(data) => codec::decode(&data).unwrap_or_else(|e| {
                error!(query = %name, cache_key, error = %e, "error decoding cached series");
                metrics::record_cache_decode_error(shape);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let step = query.effective_step(params.step);
        let misses =
            gaps::find_missing_ranges(params.window(), step, &cached, self.settings.gap_policy);
        metrics::record_missing_ranges(shape, misses.len());
        debug!(
            query = %name,
            cached_series = cached.len(),
            missing_ranges = misses.len(),
            "resolved missing ranges"
        );

        let mut fresh = Vec::new();
        let mut last_query = String::new();
        for miss in misses {
            let native = match self.prepare(query, params, keys, miss) {
                Ok(native) => native,
                Err(e) => return Execution::failed(name, "", e.into()),
            };

            match ctx.run(self.store.execute(ctx, &native)).await {
                Ok(series) => fresh.extend(series),
                Err(e) => return Execution::failed(name, native, e),
            }
            last_query = native;
        }

        let store_merged = cache.is_some() && !fresh.is_empty();
        let merged = merge::merge_series(cached, fresh);
        let write_back = store_merged.then(|| WriteBack {
            key: cache_key.to_string(),
            series: merge::trim_before(merged.clone(), self.retention_cutoff(params)),
        });

        Execution {
            result: SubQueryResult::success(name, last_query, merged),
            write_back,
        }
    }
}
