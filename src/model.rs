//! Request model for composite range queries
//!
//! A [`QueryRangeParams`] carries one shared time window and a
//! [`CompositeQuery`] holding named [`BuilderQuery`] entries. Each entry is
//! either a plain builder query (its expression is its own name) or a
//! builder expression combining other entries, e.g. `A / B`.

use crate::error::QuerierError;
use crate::types::TimeRange;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Data source a builder query reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Log records
    Logs,
    /// Trace spans
    Traces,
    /// Metric samples
    Metrics,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Logs => write!(f, "logs"),
            DataSource::Traces => write!(f, "traces"),
            DataSource::Metrics => write!(f, "metrics"),
        }
    }
}

/// How the composite query was authored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// Query builder
    Builder,
    /// Raw ClickHouse SQL
    ClickHouseSql,
    /// Raw PromQL
    PromQl,
}

/// Panel the result is rendered into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelType {
    /// Time series chart
    Graph,
    /// Table
    Table,
    /// Single value
    Value,
    /// List of records
    List,
    /// Trace view
    Trace,
}

/// Translation path for a sub-query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubQueryShape {
    /// Translated directly against its own data source
    Query,
    /// Translated through the shared multi-query preparation step
    Expression,
}

impl SubQueryShape {
    /// Short name used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            SubQueryShape::Query => "query",
            SubQueryShape::Expression => "expression",
        }
    }
}

/// Attribute key metadata passed through to translators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeKey {
    /// Attribute name
    pub key: String,
    /// Attribute data type (string, int64, float64, bool, ...)
    #[serde(default)]
    pub data_type: String,
    /// Attribute kind (tag, resource, ...)
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Whether the attribute is materialized as a column
    #[serde(default)]
    pub is_column: bool,
}

/// Attribute keys by name
pub type AttributeKeys = HashMap<String, AttributeKey>;

/// One named sub-query of a composite request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuilderQuery {
    /// Unique name within the composite query
    pub query_name: String,
    /// Data source the query reads from
    pub data_source: DataSource,
    /// Aggregate operator (count, sum_rate, p99, ...)
    #[serde(default)]
    pub aggregate_operator: String,
    /// Attribute the aggregate is computed over
    #[serde(default)]
    pub aggregate_attribute: String,
    /// Filter expression in builder syntax
    #[serde(default)]
    pub filters: Vec<String>,
    /// Group-by attribute names
    #[serde(default)]
    pub group_by: Vec<String>,
    /// Equal to `query_name` for plain queries, a formula otherwise
    pub expression: String,
    /// Per-query step override in seconds, 0 when unset
    #[serde(default)]
    pub step_interval: i64,
    /// Disabled queries are still run but never cached
    #[serde(default)]
    pub disabled: bool,
}

impl BuilderQuery {
    /// Create a plain builder query whose expression is its own name
    pub fn new(name: impl Into<String>, data_source: DataSource) -> Self {
        let name = name.into();
        Self {
            expression: name.clone(),
            query_name: name,
            data_source,
            aggregate_operator: String::new(),
            aggregate_attribute: String::new(),
            filters: Vec::new(),
            group_by: Vec::new(),
            step_interval: 0,
            disabled: false,
        }
    }

    /// Create a builder expression over other queries
    pub fn expression(name: impl Into<String>, expression: impl Into<String>) -> Self {
        let mut query = Self::new(name, DataSource::Metrics);
        query.expression = expression.into();
        query
    }

    /// Step in milliseconds this query is bucketed at
    ///
    /// The per-query override wins over the request step.
    pub fn effective_step(&self, request_step: i64) -> i64 {
        if self.step_interval > 0 {
            self.step_interval.saturating_mul(1000)
        } else {
            request_step
        }
    }

    /// Translation path for this query
    pub fn shape(&self) -> SubQueryShape {
        if self.expression == self.query_name {
            SubQueryShape::Query
        } else {
            SubQueryShape::Expression
        }
    }
}

/// Named sub-queries sharing one panel and query type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeQuery {
    /// How the query was authored
    pub query_type: QueryType,
    /// Panel the result renders into
    pub panel_type: PanelType,
    /// Sub-queries by name
    #[serde(default)]
    pub builder_queries: BTreeMap<String, BuilderQuery>,
}

impl CompositeQuery {
    /// Create an empty builder composite query
    pub fn new(query_type: QueryType, panel_type: PanelType) -> Self {
        Self {
            query_type,
            panel_type,
            builder_queries: BTreeMap::new(),
        }
    }

    /// Add a sub-query keyed by its name
    pub fn with_query(mut self, query: BuilderQuery) -> Self {
        self.builder_queries.insert(query.query_name.clone(), query);
        self
    }

    /// Sub-queries referenced by an expression, in name order
    ///
    /// Identifiers are the maximal runs of alphanumerics and underscores.
    /// Only identifiers naming another sub-query are returned.
    pub fn referenced_queries(&self, query: &BuilderQuery) -> Vec<&BuilderQuery> {
        let mut names: Vec<&str> = query
            .expression
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|token| !token.is_empty() && *token != query.query_name)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
            .into_iter()
            .filter_map(|name| self.builder_queries.get(name))
            .collect()
    }
}

/// Parameters of one composite range request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRangeParams {
    /// Window start in epoch milliseconds
    pub start: i64,
    /// Window end in epoch milliseconds
    pub end: i64,
    /// Step in milliseconds
    pub step: i64,
    /// Bypass cache reads and write-backs
    #[serde(default)]
    pub no_cache: bool,
    /// The sub-queries
    pub composite_query: CompositeQuery,
    /// Dashboard variables substituted by translators, part of every cache key
    #[serde(default)]
    pub variables: BTreeMap<String, serde_json::Value>,
}

impl QueryRangeParams {
    /// Requested window
    pub fn window(&self) -> TimeRange {
        TimeRange::new_unchecked(self.start, self.end)
    }

    /// Copy of these params with a different window
    ///
    /// Used to re-prepare expressions for a single missing range.
    pub fn with_window(&self, window: TimeRange) -> Self {
        Self {
            start: window.start,
            end: window.end,
            ..self.clone()
        }
    }

    /// Validate window, step and sub-query naming
    pub fn validate(&self) -> Result<(), QuerierError> {
        TimeRange::new(self.start, self.end)?;

        if self.step <= 0 {
            return Err(QuerierError::InvalidRequest(format!(
                "step must be > 0, got {}",
                self.step
            )));
        }

        if self.composite_query.builder_queries.is_empty() {
            return Err(QuerierError::InvalidRequest(
                "composite query has no builder queries".to_string(),
            ));
        }

        for (name, query) in &self.composite_query.builder_queries {
            if name != &query.query_name {
                return Err(QuerierError::InvalidRequest(format!(
                    "builder query keyed as {} is named {}",
                    name, query.query_name
                )));
            }
            if query.expression.is_empty() {
                return Err(QuerierError::InvalidRequest(format!(
                    "builder query {} has an empty expression",
                    name
                )));
            }
        }

        Ok(())
    }
}
