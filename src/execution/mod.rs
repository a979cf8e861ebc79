//! Execution layer: the datastore contract, the polars implementation and
//! the tabular result type shared between them.

pub mod engine;
pub mod polars_store;
pub mod result;

pub use engine::Datastore;
pub use polars_store::PolarsStore;
pub use result::QueryResult;
