//! Error types for the querier

use thiserror::Error;

/// Main error type for the querier
///
/// Only [`QuerierError::Translation`], [`QuerierError::Execution`] and
/// [`QuerierError::Cancelled`] ever reach a sub-query result. Cache-layer
/// failures are absorbed where they happen and never surface here.
#[derive(Error, Debug, Clone)]
pub enum QuerierError {
    /// Sub-query could not be turned into a native store query
    #[error("Translation error: {0}")]
    Translation(#[from] TranslateError),

    /// Store rejected or failed the native query
    #[error("Execution error: {0}")]
    Execution(#[from] StoreError),

    /// Request context was cancelled or its deadline passed
    #[error("Query cancelled: {0}")]
    Cancelled(String),

    /// Request parameters are malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// One or more sub-queries of a composite request failed
    #[error("error in builder queries: {}", format_sub_query_errors(.0))]
    SubQueries(Vec<(String, String)>),

    /// Worker for a sub-query terminated without producing a result
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_sub_query_errors(errors: &[(String, String)]) -> String {
    errors
        .iter()
        .map(|(name, err)| format!("{}: {}", name, err))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Translation errors raised by data-source translators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    /// Builder query shape is not supported by the translator
    #[error("Unsupported query shape for {query}: {reason}")]
    UnsupportedShape {
        /// Name of the offending sub-query
        query: String,
        /// Why the translator refused it
        reason: String,
    },

    /// Query references an attribute key that is not known
    #[error("Unknown attribute key: {0}")]
    UnknownAttribute(String),

    /// Expression preparation produced no query for the named sub-query
    #[error("No prepared query for {0}")]
    MissingPreparedQuery(String),

    /// Generic translation failure
    #[error("{0}")]
    Failed(String),
}

/// Store execution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Connection to the store failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Store rejected the query
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

/// Cache backend errors
///
/// These never fail a query. They are logged and counted, then collapsed
/// into a cache miss or a skipped write-back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Backend is unreachable
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// Backend refused the operation
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

/// Errors encoding or decoding cached series payloads
#[derive(Error, Debug)]
pub enum CodecError {
    /// Payload could not be encoded
    #[error("Encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// Payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, QuerierError>;
