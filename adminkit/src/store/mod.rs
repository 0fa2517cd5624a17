//! Storage seam between the admin views and whatever holds the rows.

pub mod memory;
pub mod sqlite;

use crate::error::AdminError;
use crate::model::ModelMeta;
use crate::query::{ListQuery, OrderBy};
use crate::value::Value;
use async_trait::async_trait;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A record as a JSON object keyed by column (or relation) name.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[async_trait]
pub trait ModelStore: Send + Sync {
    fn meta(&self) -> &ModelMeta;

    async fn count(&self, query: &ListQuery) -> Result<usize, AdminError>;

    async fn list(&self, query: &ListQuery) -> Result<Vec<Row>, AdminError>;

    async fn get(&self, pk: &[Value]) -> Result<Option<Row>, AdminError>;

    /// Rows for the given keys; missing keys are skipped.
    async fn get_many(&self, pks: &[Vec<Value>]) -> Result<Vec<Row>, AdminError>;

    /// Stores a new row and returns it as persisted (generated keys filled in).
    async fn insert(&self, row: Row) -> Result<Row, AdminError>;

    /// Applies the given fields to an existing row. Fails with `NotFound` if `pk` matches nothing.
    async fn update(&self, pk: &[Value], row: Row) -> Result<Row, AdminError>;

    /// Returns whether a row was removed.
    async fn delete(&self, pk: &[Value]) -> Result<bool, AdminError>;

    async fn lookup(&self, fields: &[String], term: &str, order: &[OrderBy], limit: usize) -> Result<Vec<Row>, AdminError>;
}

/// Typed primary key of `row`.
pub fn pk_of(meta: &ModelMeta, row: &Row) -> Result<Vec<Value>, AdminError> {
    meta.primary_keys()
        .iter()
        .map(|c| Ok(c.ty.from_json(row.get(&c.name).unwrap_or(&serde_json::Value::Null))?))
        .collect()
}
