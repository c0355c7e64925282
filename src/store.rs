//! Store execution interface

use crate::error::StoreError;
use crate::querier::context::QueryContext;
use crate::types::Series;
use async_trait::async_trait;

/// Executes native queries against the underlying store
///
/// Implementations should observe `ctx` themselves; the querier also races
/// every call against the context so a cancelled request returns promptly
/// even when the client does not.
#[async_trait]
pub trait StoreClient: Send + Sync + 'static {
    /// Run `query` and return the resulting series
    async fn execute(&self, ctx: &QueryContext, query: &str) -> Result<Vec<Series>, StoreError>;
}
