//! Datastore trait - the contract the answer pipeline needs from a SQL store
//!
//! A store is loaded once at startup and shared by every request, so
//! implementations execute through `&self` and must be `Send + Sync`.

use crate::error::Result;
use crate::execution::result::QueryResult;
use async_trait::async_trait;

#[async_trait]
pub trait Datastore: Send + Sync {
    /// Store name for logs (e.g. "polars").
    fn name(&self) -> &'static str;

    /// Execute one read statement and return its full result.
    async fn execute(&self, sql: &str) -> Result<QueryResult>;
}
