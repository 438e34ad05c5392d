//! An in-process data source, useful for tests and prototypes.

use super::{DataSource, DataSourceDescriptor, Document, FindOptions, Model, Shape, UpdateResult};
use crate::errors::DataSourceError;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// A data source that keeps every collection in memory.
///
/// Collections are created on first use with the shape of the descriptor
/// that first asked for them.
#[derive(Debug, Default)]
pub struct InMemoryDataSource {
    collections: DashMap<String, Arc<MemoryCollection>>,
}

impl InMemoryDataSource {
    /// Creates an empty data source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record to a collection directly, bypassing shapes.
    pub fn seed(&self, collection: &str, doc: Document) {
        self.collection(collection, Shape::new(collection)).docs.write().push(doc);
    }

    /// Returns the number of records in a collection.
    #[must_use]
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map_or(0, |c| c.docs.read().len())
    }

    fn collection(&self, name: &str, shape: Shape) -> Arc<MemoryCollection> {
        self.collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new(shape)))
            .clone()
    }
}

impl DataSource for InMemoryDataSource {
    fn model(&self, descriptor: &DataSourceDescriptor) -> Result<Arc<dyn Model>, DataSourceError> {
        Ok(self.collection(&descriptor.name, descriptor.shape.clone()))
    }
}

/// One in-memory collection.
#[derive(Debug)]
pub struct MemoryCollection {
    shape: Shape,
    docs: RwLock<Vec<Document>>,
}

impl MemoryCollection {
    fn new(shape: Shape) -> Self {
        Self {
            shape,
            docs: RwLock::new(Vec::new()),
        }
    }

    fn prepare(&self, doc: Document) -> Result<Document, DataSourceError> {
        let mut doc = self.shape.conform(doc)?;
        if !doc.contains_key("id") {
            doc.insert("id".to_string(), Uuid::new_v4().to_string().into());
        }
        Ok(doc)
    }
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(k, v)| doc.get(k) == Some(v))
}

#[async_trait]
impl Model for MemoryCollection {
    async fn find_one(&self, filter: &Document) -> Result<Option<Document>, DataSourceError> {
        Ok(self
            .docs
            .read()
            .iter()
            .find(|d| matches(d, filter))
            .map(|d| self.shape.present(d)))
    }

    async fn find(
        &self,
        filter: &Document,
        options: FindOptions,
    ) -> Result<Vec<Document>, DataSourceError> {
        let docs = self.docs.read();
        let found = docs
            .iter()
            .filter(|d| matches(d, filter))
            .skip(options.skip)
            .take(options.limit.unwrap_or(usize::MAX))
            .map(|d| self.shape.present(d))
            .collect();
        Ok(found)
    }

    async fn create(&self, doc: Document) -> Result<Document, DataSourceError> {
        let doc = self.prepare(doc)?;
        let mut docs = self.docs.write();
        if docs.iter().any(|d| d.get("id") == doc.get("id")) {
            return Err(DataSourceError::Duplicate(
                doc.get("id").map(ToString::to_string).unwrap_or_default(),
            ));
        }
        docs.push(doc.clone());
        debug!(shape = %self.shape.name, "created record");
        Ok(self.shape.present(&doc))
    }

    async fn insert_many(&self, docs: Vec<Document>) -> Result<Vec<Document>, DataSourceError> {
        let prepared = docs
            .into_iter()
            .map(|d| self.prepare(d))
            .collect::<Result<Vec<_>, _>>()?;
        let presented = prepared.iter().map(|d| self.shape.present(d)).collect();
        self.docs.write().extend(prepared);
        Ok(presented)
    }

    async fn update_one(
        &self,
        filter: &Document,
        update: Document,
        upsert: bool,
    ) -> Result<UpdateResult, DataSourceError> {
        let update = self.shape.conform(update)?;
        let mut docs = self.docs.write();

        if let Some(doc) = docs.iter_mut().find(|d| matches(d, filter)) {
            let before = doc.clone();
            doc.extend(update);
            return Ok(UpdateResult {
                matched: 1,
                modified: u64::from(*doc != before),
                upserted_id: None,
            });
        }

        if !upsert {
            return Ok(UpdateResult::default());
        }

        let mut merged = filter.clone();
        merged.extend(update);
        let doc = self.prepare(merged)?;
        let id = doc.get("id").and_then(|v| v.as_str()).map(str::to_string);
        docs.push(doc);
        Ok(UpdateResult {
            matched: 0,
            modified: 0,
            upserted_id: id,
        })
    }

    async fn delete_one(&self, filter: &Document) -> Result<u64, DataSourceError> {
        let mut docs = self.docs.write();
        match docs.iter().position(|d| matches(d, filter)) {
            Some(pos) => {
                docs.remove(pos);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
