// Document store capability consumed by the CRUD pipeline
pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store connection error: {0}")]
    Connection(String),
    #[error("Store query error: {0}")]
    Query(String),
    #[error("Store write error: {0}")]
    Write(String),
}

/// Sort direction per field, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A translated search request: filter plus paging, ordering and
/// projection. Produced by query normalization, consumed by `find_many`.
#[derive(Debug, Clone, Default)]
pub struct StoreQuery {
    /// Dotted-path equality filter (`{"owner.id": "u1"}`).
    pub filter: Map<String, Value>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub sort: Vec<(String, SortOrder)>,
    /// Fields to include; empty means all.
    pub projection: Vec<String>,
}

impl StoreQuery {
    pub fn with_filter(filter: Map<String, Value>) -> Self {
        Self { filter, ..Default::default() }
    }
}

/// The persistence collaborator. One implementation per backing store;
/// collections are addressed by name on every call so a single handle can
/// serve every entity type plus its audit collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
    ) -> Result<Option<Value>, StoreError>;

    async fn insert_one(&self, collection: &str, document: Value) -> Result<(), StoreError>;

    /// Atomically replace the first document matching `filter`. Returns
    /// the previous document, or `None` when nothing matched.
    async fn find_one_and_replace(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
        replacement: Value,
    ) -> Result<Option<Value>, StoreError>;

    /// Atomically remove the first document matching `filter`. Returns
    /// the removed document, or `None` when nothing matched.
    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
    ) -> Result<Option<Value>, StoreError>;

    async fn find_many(
        &self,
        collection: &str,
        query: &StoreQuery,
    ) -> Result<Vec<Value>, StoreError>;
}
