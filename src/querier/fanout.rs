//! Fan-out of a composite request into concurrent sub-query workers
//!
//! Every sub-query gets its own tokio task. Workers share the request
//! parameters read-only and report through one channel sized to the number
//! of sub-queries, so sends never block. Each worker owns a [`ResultSlot`]
//! that guarantees exactly one result, even if the worker panics.

use super::{Querier, QueryContext, SubQueryResult};
use crate::error::{QuerierError, Result};
use crate::metrics;
use crate::model::{AttributeKeys, QueryRangeParams, SubQueryShape};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Results of a composite request, one per sub-query, sorted by name
#[derive(Debug, Clone, Default)]
pub struct QueryRangeOutcome {
    /// Per sub-query results
    pub results: Vec<SubQueryResult>,
}

impl QueryRangeOutcome {
    /// Result for a sub-query
    pub fn get(&self, name: &str) -> Option<&SubQueryResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// True when at least one sub-query failed
    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|r| !r.is_ok())
    }

    /// Error message per failed sub-query
    pub fn errors_by_name(&self) -> BTreeMap<String, String> {
        self.results
            .iter()
            .filter_map(|r| r.error().map(|e| (r.name.clone(), e.to_string())))
            .collect()
    }

    /// Results if every sub-query succeeded, otherwise a combined error
    pub fn into_result(self) -> Result<Vec<SubQueryResult>> {
        let errors = self.errors_by_name();
        if errors.is_empty() {
            Ok(self.results)
        } else {
            Err(QuerierError::SubQueries(errors.into_iter().collect()))
        }
    }
}

/// Single-use sender for one sub-query's result
///
/// Dropping an unused slot reports an internal error for the sub-query.
struct ResultSlot {
    name: String,
    tx: Option<mpsc::Sender<SubQueryResult>>,
}

impl ResultSlot {
    fn new(name: String, tx: mpsc::Sender<SubQueryResult>) -> Self {
        Self { name, tx: Some(tx) }
    }

    fn send(mut self, result: SubQueryResult) {
        if let Some(tx) = self.tx.take() {
            if tx.try_send(result).is_err() {
                error!(query = %self.name, "result channel rejected sub-query result");
            }
        }
    }
}

impl Drop for ResultSlot {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let error = QuerierError::Internal(format!(
                "worker for {} exited without a result",
                self.name
            ));
            let _ = tx.try_send(SubQueryResult::failure(self.name.clone(), "", error));
        }
    }
}

impl Querier {
    /// Run every builder query of `params` concurrently
    ///
    /// Returns once every worker has finished, with exactly one result per
    /// sub-query. Individual failures are reported in the outcome; only a
    /// malformed request fails the call itself.
    pub async fn run_builder_queries(
        &self,
        ctx: &QueryContext,
        params: &QueryRangeParams,
        keys: &AttributeKeys,
    ) -> Result<QueryRangeOutcome> {
        params.validate()?;

        let cache_keys = self.key_generator.generate_keys(params);
        let count = params.composite_query.builder_queries.len();
        let (tx, mut rx) = mpsc::channel(count);

        let params = Arc::new(params.clone());
        let keys = Arc::new(keys.clone());
        let mut workers = JoinSet::new();

        for (name, query) in &params.composite_query.builder_queries {
            let slot = ResultSlot::new(name.clone(), tx.clone());
            let querier = self.clone();
            let ctx = ctx.clone();
            let params = Arc::clone(&params);
            let keys = Arc::clone(&keys);
            let query = query.clone();
            let cache_key = cache_keys.get(name).cloned();

            workers.spawn(async move {
                let started = Instant::now();
                let cache_key = cache_key.as_deref();

                let execution = match query.shape() {
                    SubQueryShape::Query => {
                        querier
                            .run_builder_query(&ctx, &query, &params, &keys, cache_key)
                            .await
                    },
                    SubQueryShape::Expression => {
                        querier
                            .run_builder_expression(&ctx, &query, &params, &keys, cache_key)
                            .await
                    },
                };

                let success = execution.result.is_ok();
                if let Some(e) = execution.result.error() {
                    warn!(query = %query.query_name, error = %e, "sub-query failed");
                }
                metrics::record_sub_query(
                    &query.data_source.to_string(),
                    started.elapsed().as_secs_f64(),
                    success,
                );

                slot.send(execution.result);

                if let Some(write_back) = execution.write_back {
                    querier.write_back(write_back).await;
                }
            });
        }
        drop(tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "sub-query worker terminated abnormally");
            }
        }

        let mut results = Vec::with_capacity(count);
        while let Ok(result) = rx.try_recv() {
            results.push(result);
        }
        results.sort_by(|a, b| a.name.cmp(&b.name));

        if results.len() != count {
            error!(expected = count, received = results.len(), "sub-query results missing");
        }

        let outcome = QueryRangeOutcome { results };
        debug!(
            sub_queries = count,
            failed = outcome.errors_by_name().len(),
            "composite query finished"
        );

        Ok(outcome)
    }
}
