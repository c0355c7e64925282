//! Shared test doubles for querier integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use kuba_querier::cache::{CacheKeyGenerator, DefaultKeyGenerator, ResultCache, Retrieved};
use kuba_querier::error::{CacheError, StoreError, TranslateError};
use kuba_querier::model::{
    AttributeKeys, BuilderQuery, CompositeQuery, DataSource, PanelType, QueryRangeParams,
    QueryType,
};
use kuba_querier::querier::codec;
use kuba_querier::store::StoreClient;
use kuba_querier::translate::{ExpressionBuilder, QueryTranslator, Translators};
use kuba_querier::types::{Labels, Point, Series, TimeRange};
use kuba_querier::{Querier, QuerierBuilder, QueryContext};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Cache
// =============================================================================

/// In-memory result cache with call counters and injectable failures
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    ttls: Mutex<HashMap<String, Duration>>,
    pub retrieves: AtomicUsize,
    pub stores: AtomicUsize,
    pub fail_retrieve: AtomicBool,
    pub fail_store: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Put an encoded collection under `key`
    pub fn seed(&self, key: &str, series: &[Series]) {
        let data = codec::encode(series).expect("encode seed");
        self.entries.lock().insert(key.to_string(), data);
    }

    /// Put raw bytes under `key`
    pub fn seed_raw(&self, key: &str, data: &[u8]) {
        self.entries.lock().insert(key.to_string(), data.to_vec());
    }

    /// Decoded collection under `key`
    pub fn get(&self, key: &str) -> Option<Vec<Series>> {
        let data = self.entries.lock().get(key).cloned()?;
        Some(codec::decode(&data).expect("decode cached entry"))
    }

    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.ttls.lock().get(key).copied()
    }

    pub fn retrieve_count(&self) -> usize {
        self.retrieves.load(Ordering::SeqCst)
    }

    pub fn store_count(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn retrieve(&self, key: &str, _allow_stale: bool) -> Result<Retrieved, CacheError> {
        self.retrieves.fetch_add(1, Ordering::SeqCst);
        if self.fail_retrieve.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("connection refused".to_string()));
        }

        let data = self.entries.lock().get(key).cloned();
        Ok(match data {
            Some(data) => Retrieved::hit(data),
            None => Retrieved::miss(),
        })
    }

    async fn store(&self, key: &str, data: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(CacheError::OperationFailed("read only replica".to_string()));
        }

        self.entries.lock().insert(key.to_string(), data);
        self.ttls.lock().insert(key.to_string(), ttl);
        Ok(())
    }
}

// =============================================================================
// Store
// =============================================================================

/// Store answering from a script keyed by native query text
///
/// Unscripted queries return no series.
#[derive(Default)]
pub struct ScriptedStore {
    responses: Mutex<HashMap<String, Result<Vec<Series>, StoreError>>>,
    executed: Mutex<Vec<String>>,
    panic_on: Mutex<Option<String>>,
    pub hang: AtomicBool,
}

impl ScriptedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, query: &str, series: Vec<Series>) {
        self.responses.lock().insert(query.to_string(), Ok(series));
    }

    pub fn fail(&self, query: &str, error: StoreError) {
        self.responses.lock().insert(query.to_string(), Err(error));
    }

    pub fn panic_on(&self, query: &str) {
        *self.panic_on.lock() = Some(query.to_string());
    }

    /// Executed queries, sorted
    ///
    /// Concurrent sub-queries finish in any order, so this is the view to
    /// compare across sub-queries.
    pub fn executed(&self) -> Vec<String> {
        let mut executed = self.executed.lock().clone();
        executed.sort();
        executed
    }

    /// Executed queries in the order the store received them
    pub fn executed_in_order(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    pub fn execution_count(&self) -> usize {
        self.executed.lock().len()
    }
}

#[async_trait]
impl StoreClient for ScriptedStore {
    async fn execute(&self, _ctx: &QueryContext, query: &str) -> Result<Vec<Series>, StoreError> {
        self.executed.lock().push(query.to_string());

        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let should_panic = self.panic_on.lock().as_deref() == Some(query);
        if should_panic {
            panic!("store blew up on {}", query);
        }

        let response = self.responses.lock().get(query).cloned();
        response.unwrap_or_else(|| Ok(Vec::new()))
    }
}

// =============================================================================
// Translators
// =============================================================================

/// Translator producing `source:name:start-end`
pub struct TaggedTranslator {
    source: &'static str,
    failing: Mutex<HashSet<String>>,
    failing_at: Mutex<HashSet<(String, i64)>>,
    pub calls: AtomicUsize,
}

impl TaggedTranslator {
    pub fn new(source: &'static str) -> Arc<Self> {
        Arc::new(Self {
            source,
            failing: Mutex::new(HashSet::new()),
            failing_at: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn fail_for(&self, name: &str) {
        self.failing.lock().insert(name.to_string());
    }

    /// Fail `name` only for windows starting at `start`
    pub fn fail_at(&self, name: &str, start: i64) {
        self.failing_at.lock().insert((name.to_string(), start));
    }
}

impl QueryTranslator for TaggedTranslator {
    fn prepare(
        &self,
        window: TimeRange,
        _query_type: QueryType,
        _panel_type: PanelType,
        query: &BuilderQuery,
        _keys: &AttributeKeys,
    ) -> Result<String, TranslateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fails_here = self
            .failing_at
            .lock()
            .contains(&(query.query_name.clone(), window.start));
        if fails_here || self.failing.lock().contains(&query.query_name) {
            return Err(TranslateError::UnsupportedShape {
                query: query.query_name.clone(),
                reason: "aggregate not supported".to_string(),
            });
        }
        Ok(format!(
            "{}:{}:{}-{}",
            self.source, query.query_name, window.start, window.end
        ))
    }
}

/// Expression preparation producing `expr:name:start-end` for every query
#[derive(Default)]
pub struct ScriptedExpressions {
    omit: Mutex<Option<String>>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl ScriptedExpressions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Leave `name` out of every prepared map
    pub fn omit(&self, name: &str) {
        *self.omit.lock() = Some(name.to_string());
    }
}

impl ExpressionBuilder for ScriptedExpressions {
    fn prepare_queries(
        &self,
        params: &QueryRangeParams,
        _keys: &AttributeKeys,
    ) -> Result<BTreeMap<String, String>, TranslateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(TranslateError::Failed("formula does not parse".to_string()));
        }

        let omit = self.omit.lock().clone();
        Ok(params
            .composite_query
            .builder_queries
            .keys()
            .filter(|name| omit.as_deref() != Some(name.as_str()))
            .map(|name| {
                (
                    name.clone(),
                    format!("expr:{}:{}-{}", name, params.start, params.end),
                )
            })
            .collect())
    }
}

// =============================================================================
// Harness
// =============================================================================

/// Querier wired to test doubles
pub struct Harness {
    pub store: Arc<ScriptedStore>,
    pub cache: Arc<MemoryCache>,
    pub metrics: Arc<TaggedTranslator>,
    pub expressions: Arc<ScriptedExpressions>,
    pub querier: Querier,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Harness whose querier has no cache backend
    pub fn without_cache() -> Self {
        Self::build(false)
    }

    fn build(with_cache: bool) -> Self {
        let store = ScriptedStore::new();
        let cache = MemoryCache::new();
        let metrics = TaggedTranslator::new("metrics");
        let expressions = ScriptedExpressions::new();

        let translators = Translators::new(
            TaggedTranslator::new("logs"),
            TaggedTranslator::new("traces"),
            metrics.clone(),
        );

        let mut builder = QuerierBuilder::new()
            .with_store(store.clone())
            .with_translators(translators)
            .with_expression_builder(expressions.clone());
        if with_cache {
            builder = builder.with_cache(cache.clone());
        }

        Self {
            store,
            cache,
            metrics,
            expressions,
            querier: builder.build().expect("build querier"),
        }
    }
}

// =============================================================================
// Data Helpers
// =============================================================================

/// Metrics builder query with a fixed aggregate
pub fn metrics_query(name: &str) -> BuilderQuery {
    let mut query = BuilderQuery::new(name, DataSource::Metrics);
    query.aggregate_operator = "sum_rate".to_string();
    query.aggregate_attribute = "http_requests_total".to_string();
    query
}

/// Builder graph request over `[start, end)`
pub fn graph_params(start: i64, end: i64, step: i64, queries: Vec<BuilderQuery>) -> QueryRangeParams {
    let composite = queries.into_iter().fold(
        CompositeQuery::new(QueryType::Builder, PanelType::Graph),
        CompositeQuery::with_query,
    );

    QueryRangeParams {
        start,
        end,
        step,
        no_cache: false,
        composite_query: composite,
        variables: BTreeMap::new(),
    }
}

/// Cache key the default generator assigns to `name`
pub fn cache_key(params: &QueryRangeParams, name: &str) -> String {
    DefaultKeyGenerator
        .generate_keys(params)
        .remove(name)
        .expect("query should be cacheable")
}

pub fn series(labels: &[(&str, &str)], points: &[(i64, f64)]) -> Series {
    Series::new(
        Labels::from_pairs(labels.iter().copied()),
        points.iter().map(|&(ts, v)| Point::new(ts, v)).collect(),
    )
}

pub fn timestamps(series: &Series) -> Vec<i64> {
    series.points.iter().map(|p| p.timestamp).collect()
}

pub fn values(series: &Series) -> Vec<f64> {
    series.points.iter().map(|p| p.value).collect()
}
