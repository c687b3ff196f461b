// In-memory document store for tests and embedded use
use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::paths;
use crate::store::{DocumentStore, SortOrder, StoreError, StoreQuery};

/// A `DocumentStore` holding collections of JSON documents in process
/// memory. Supports the dotted-path equality filters, sorting, paging and
/// inclusion projections the pipeline emits.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map_or(0, Vec::len)
    }

    /// Snapshot of every document in a collection, in insertion order.
    pub async fn dump(&self, collection: &str) -> Vec<Value> {
        let collections = self.collections.read().await;
        collections.get(collection).cloned().unwrap_or_default()
    }

    fn matches(document: &Value, filter: &Map<String, Value>) -> bool {
        filter
            .iter()
            .all(|(path, expected)| paths::get_path(document, path) == Some(expected))
    }

    fn compare_values(a: &Value, b: &Value) -> Ordering {
        match (a, b) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }

    fn project(document: &Value, projection: &[String]) -> Value {
        if projection.is_empty() {
            return document.clone();
        }
        let mut projected = Value::Object(Map::new());
        for path in projection {
            if let Some(value) = paths::get_path(document, path) {
                paths::set_path(&mut projected, path, value.clone());
            }
        }
        projected
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| Self::matches(doc, filter)).cloned()))
    }

    async fn insert_one(&self, collection: &str, document: Value) -> Result<(), StoreError> {
        if !document.is_object() {
            return Err(StoreError::Write("Only objects can be stored".to_string()));
        }
        let mut collections = self.collections.write().await;
        collections.entry(collection.to_string()).or_default().push(document);
        Ok(())
    }

    async fn find_one_and_replace(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
        replacement: Value,
    ) -> Result<Option<Value>, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = match collections.get_mut(collection) {
            Some(docs) => docs,
            None => return Ok(None),
        };
        for doc in docs.iter_mut() {
            if Self::matches(doc, filter) {
                return Ok(Some(std::mem::replace(doc, replacement)));
            }
        }
        Ok(None)
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = match collections.get_mut(collection) {
            Some(docs) => docs,
            None => return Ok(None),
        };
        match docs.iter().position(|doc| Self::matches(doc, filter)) {
            Some(index) => Ok(Some(docs.remove(index))),
            None => Ok(None),
        }
    }

    async fn find_many(
        &self,
        collection: &str,
        query: &StoreQuery,
    ) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().await;
        let mut results: Vec<Value> = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| Self::matches(doc, &query.filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if !query.sort.is_empty() {
            results.sort_by(|a, b| {
                for (path, order) in &query.sort {
                    let left = paths::get_path(a, path).unwrap_or(&Value::Null);
                    let right = paths::get_path(b, path).unwrap_or(&Value::Null);
                    let cmp = match order {
                        SortOrder::Ascending => Self::compare_values(left, right),
                        SortOrder::Descending => Self::compare_values(right, left),
                    };
                    if cmp != Ordering::Equal {
                        return cmp;
                    }
                }
                Ordering::Equal
            });
        }

        let skip = query.skip.unwrap_or(0) as usize;
        let results: Vec<Value> = results.into_iter().skip(skip).collect();
        let results: Vec<Value> = match query.limit {
            Some(limit) => results.into_iter().take(limit as usize).collect(),
            None => results,
        };

        Ok(results
            .iter()
            .map(|doc| Self::project(doc, &query.projection))
            .collect())
    }
}
