//! Translator interfaces
//!
//! Translators turn a logical builder query plus a time window into the
//! store's native query text. They are pure: no I/O, no shared state. One
//! translator exists per data source; expressions go through the shared
//! [`ExpressionBuilder`] because they may reference several data-source
//! queries at once.

use crate::error::TranslateError;
use crate::model::{AttributeKeys, BuilderQuery, DataSource, PanelType, QueryRangeParams, QueryType};
use crate::types::TimeRange;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Translates one builder query for one data source
pub trait QueryTranslator: Send + Sync + 'static {
    /// Produce the native query for `query` restricted to `window`
    fn prepare(
        &self,
        window: TimeRange,
        query_type: QueryType,
        panel_type: PanelType,
        query: &BuilderQuery,
        keys: &AttributeKeys,
    ) -> Result<String, TranslateError>;
}

/// Prepares native queries for every sub-query of a composite request
pub trait ExpressionBuilder: Send + Sync + 'static {
    /// Native query per sub-query name for the window in `params`
    fn prepare_queries(
        &self,
        params: &QueryRangeParams,
        keys: &AttributeKeys,
    ) -> Result<BTreeMap<String, String>, TranslateError>;
}

/// One translator per data source
#[derive(Clone)]
pub struct Translators {
    /// Logs translator
    pub logs: Arc<dyn QueryTranslator>,
    /// Traces translator
    pub traces: Arc<dyn QueryTranslator>,
    /// Metrics translator
    pub metrics: Arc<dyn QueryTranslator>,
}

impl Translators {
    /// Bundle translators
    pub fn new(
        logs: Arc<dyn QueryTranslator>,
        traces: Arc<dyn QueryTranslator>,
        metrics: Arc<dyn QueryTranslator>,
    ) -> Self {
        Self {
            logs,
            traces,
            metrics,
        }
    }

    /// Translator for a data source
    pub fn for_source(&self, source: DataSource) -> &dyn QueryTranslator {
        match source {
            DataSource::Logs => self.logs.as_ref(),
            DataSource::Traces => self.traces.as_ref(),
            DataSource::Metrics => self.metrics.as_ref(),
        }
    }
}

impl std::fmt::Debug for Translators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translators").finish_non_exhaustive()
    }
}
