//! Access to a distributed query engine through SQL.
//!
//! The engine itself (a Spark/Databricks session, a SQL warehouse client, ...)
//! is supplied by the host application as a [`SqlSession`]. [`EngineTable`]
//! turns the metadata calls the distributed backend needs into SQL.

pub mod table;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::analyze::error::AnalyzeResult;

pub use table::{EngineTable, TableDetail};

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

/// A session able to run SQL against the engine's catalog.
#[async_trait]
pub trait SqlSession: Send + Sync {
    /// Run `query` and collect every result row.
    async fn sql(&self, query: &str) -> AnalyzeResult<Vec<Row>>;
}
