//! Cache key generation
//!
//! A key identifies what a sub-query computes, never when: start and end are
//! left out so the same sub-query asked over a sliding window keeps hitting
//! the same entry and only the uncovered edges are recomputed. The query
//! name is part of the key, which keeps keys unique per sub-query. Dashboard
//! variables change what translators produce, so they are part of it too.

use crate::model::{BuilderQuery, DataSource, PanelType, QueryRangeParams, QueryType, SubQueryShape};
use std::collections::HashMap;
use std::fmt::Write;

/// Cache key per sub-query name; absent names are not cached
pub type CacheKeys = HashMap<String, String>;

/// Decides which sub-queries are cacheable and under which key
pub trait CacheKeyGenerator: Send + Sync + 'static {
    /// Keys for every cacheable sub-query of `params`
    fn generate_keys(&self, params: &QueryRangeParams) -> CacheKeys;
}

/// Key generator for builder graph panels over metrics
///
/// Logs and traces are never cached, nor are table/value panels whose
/// results are not time-bucketed. Expressions are cached only when every
/// query they reference reads metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKeyGenerator;

impl DefaultKeyGenerator {
    fn query_part(out: &mut String, query: &BuilderQuery, step: i64) {
        let step = query.effective_step(step);
        let _ = write!(
            out,
            "name={}&source={}&step={}&aggregate={}&attribute={}&filters={:?}&groupBy={:?}",
            query.query_name,
            query.data_source,
            step,
            query.aggregate_operator,
            query.aggregate_attribute,
            query.filters,
            query.group_by,
        );
    }
}

impl CacheKeyGenerator for DefaultKeyGenerator {
    fn generate_keys(&self, params: &QueryRangeParams) -> CacheKeys {
        let composite = &params.composite_query;
        let mut keys = CacheKeys::new();

        if composite.query_type != QueryType::Builder || composite.panel_type != PanelType::Graph {
            return keys;
        }

        let variables = serde_json::to_string(&params.variables).unwrap_or_default();

        for (name, query) in &composite.builder_queries {
            if query.disabled {
                continue;
            }

            let mut key = String::new();
            match query.shape() {
                SubQueryShape::Query => {
                    if query.data_source != DataSource::Metrics {
                        continue;
                    }
                    Self::query_part(&mut key, query, params.step);
                },
                SubQueryShape::Expression => {
                    let referenced = composite.referenced_queries(query);
                    if referenced.is_empty()
                        || referenced.iter().any(|q| q.data_source != DataSource::Metrics)
                    {
                        continue;
                    }
                    let _ = write!(key, "name={}&expression={}", query.query_name, query.expression);
                    for q in referenced {
                        key.push('|');
                        Self::query_part(&mut key, q, params.step);
                    }
                },
            }
            let _ = write!(key, "&variables={}", variables);
            keys.insert(name.clone(), key);
        }

        keys
    }
}
