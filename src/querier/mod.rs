//! Cache-aware range querier
//!
//! # Architecture
//!
//! ```text
//! QueryRangeParams (N named sub-queries, one window)
//!      │
//!      ▼
//! ┌──────────────┐   one tokio task per sub-query
//! │   fan-out    │──────────────┬──────────────┐
//! └──────────────┘              ▼              ▼
//!                        ┌────────────┐  ┌────────────┐
//!                        │   runner   │  │   runner   │  cache fetch
//!                        │            │  │            │  → gap detection
//!                        │            │  │            │  → per-range store calls
//!                        │            │  │            │  → merge → emit
//!                        └─────┬──────┘  └─────┬──────┘  → cache write-back
//!                              │ exactly one   │
//!                              ▼ result each   ▼
//!                        ┌─────────────────────────┐
//!                        │  result channel (cap N) │
//!                        └─────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let querier = QuerierBuilder::new()
//!     .with_store(store)
//!     .with_translators(translators)
//!     .with_expression_builder(builder)
//!     .with_cache(cache)
//!     .with_config(&config)
//!     .build()?;
//!
//! let outcome = querier
//!     .run_builder_queries(&QueryContext::new(), &params, &attribute_keys)
//!     .await?;
//! for result in outcome.results {
//!     println!("{}: {} series", result.name, result.series().len());
//! }
//! ```

pub mod codec;
pub mod context;
pub mod fanout;
pub mod gaps;
pub mod merge;
pub mod runner;

pub use context::QueryContext;
pub use fanout::QueryRangeOutcome;
pub use gaps::{find_missing_ranges, GapPolicy};
pub use merge::merge_series;

use crate::cache::{CacheKeyGenerator, DefaultKeyGenerator, FailOpenCache, ResultCache};
use crate::config::Config;
use crate::error::{QuerierError, Result};
use crate::store::StoreClient;
use crate::translate::{ExpressionBuilder, Translators};
use crate::types::Series;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of one sub-query
///
/// Exactly one is produced per sub-query per request, on success and on
/// every failure path.
#[derive(Debug, Clone)]
pub struct SubQueryResult {
    /// Sub-query name
    pub name: String,
    /// Last native query sent to the store, for diagnostics; empty when
    /// the answer came entirely from the cache
    pub query: String,
    /// Merged series or the error that aborted the sub-query
    pub outcome: std::result::Result<Vec<Series>, QuerierError>,
}

impl SubQueryResult {
    /// Successful result
    pub fn success(name: impl Into<String>, query: impl Into<String>, series: Vec<Series>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            outcome: Ok(series),
        }
    }

    /// Failed result
    pub fn failure(name: impl Into<String>, query: impl Into<String>, error: QuerierError) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            outcome: Err(error),
        }
    }

    /// True when the sub-query succeeded
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Series of a successful result, empty on failure
    pub fn series(&self) -> &[Series] {
        match &self.outcome {
            Ok(series) => series,
            Err(_) => &[],
        }
    }

    /// Error of a failed result
    pub fn error(&self) -> Option<&QuerierError> {
        self.outcome.as_ref().err()
    }
}

/// Runtime knobs resolved from [`Config`]
#[derive(Debug, Clone, Copy)]
pub struct QuerierSettings {
    /// Read from and write back to the cache
    pub cache_enabled: bool,
    /// Retention of written-back results
    pub cache_ttl: Duration,
    /// Interior gap threshold
    pub gap_policy: GapPolicy,
}

impl Default for QuerierSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl QuerierSettings {
    /// Resolve settings from configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_enabled: config.cache.enabled,
            cache_ttl: config.cache.ttl(),
            gap_policy: config.querier.gap_policy(),
        }
    }
}

/// Executes composite range requests against a store through a result cache
///
/// Cheap to clone: every collaborator is shared behind an `Arc`.
#[derive(Clone)]
pub struct Querier {
    store: Arc<dyn StoreClient>,
    translators: Translators,
    expressions: Arc<dyn ExpressionBuilder>,
    cache: Option<FailOpenCache>,
    key_generator: Arc<dyn CacheKeyGenerator>,
    settings: QuerierSettings,
}

impl Querier {
    /// Settings in effect
    pub fn settings(&self) -> &QuerierSettings {
        &self.settings
    }

    /// True when a cache backend is wired in and enabled
    pub fn has_cache(&self) -> bool {
        self.cache.is_some() && self.settings.cache_enabled
    }

    /// Cache to use for this request, `None` when bypassed
    fn cache_for(&self, no_cache: bool) -> Option<&FailOpenCache> {
        if no_cache || !self.settings.cache_enabled {
            return None;
        }
        self.cache.as_ref()
    }
}

impl std::fmt::Debug for Querier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Querier")
            .field("has_cache", &self.cache.is_some())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Builder wiring the querier's collaborators
#[derive(Default)]
pub struct QuerierBuilder {
    store: Option<Arc<dyn StoreClient>>,
    translators: Option<Translators>,
    expressions: Option<Arc<dyn ExpressionBuilder>>,
    cache: Option<Arc<dyn ResultCache>>,
    key_generator: Option<Arc<dyn CacheKeyGenerator>>,
    settings: QuerierSettings,
}

impl QuerierBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store client
    pub fn with_store(mut self, store: Arc<dyn StoreClient>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the per-data-source translators
    pub fn with_translators(mut self, translators: Translators) -> Self {
        self.translators = Some(translators);
        self
    }

    /// Set the shared expression preparation step
    pub fn with_expression_builder(mut self, builder: Arc<dyn ExpressionBuilder>) -> Self {
        self.expressions = Some(builder);
        self
    }

    /// Set the result cache backend; without one every request is a miss
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Override cache key generation
    pub fn with_key_generator(mut self, generator: Arc<dyn CacheKeyGenerator>) -> Self {
        self.key_generator = Some(generator);
        self
    }

    /// Apply configuration
    pub fn with_config(mut self, config: &Config) -> Self {
        self.settings = QuerierSettings::from_config(config);
        self
    }

    /// Set resolved settings directly
    pub fn with_settings(mut self, settings: QuerierSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build the querier
    pub fn build(self) -> Result<Querier> {
        let store = self
            .store
            .ok_or_else(|| QuerierError::Configuration("No store client configured".to_string()))?;

        let translators = self
            .translators
            .ok_or_else(|| QuerierError::Configuration("No translators configured".to_string()))?;

        let expressions = self.expressions.ok_or_else(|| {
            QuerierError::Configuration("No expression builder configured".to_string())
        })?;

        Ok(Querier {
            store,
            translators,
            expressions,
            cache: self.cache.map(FailOpenCache::new),
            key_generator: self
                .key_generator
                .unwrap_or_else(|| Arc::new(DefaultKeyGenerator)),
            settings: self.settings,
        })
    }
}
