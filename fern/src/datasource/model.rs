//! The data-source boundary: connection, models, descriptors and shapes.

use crate::errors::DataSourceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A stored record.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// The value type of a shape field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// JSON string.
    String,
    /// JSON number.
    Number,
    /// JSON boolean.
    Boolean,
    /// Anything.
    Any,
}

impl FieldKind {
    fn accepts(self, value: &serde_json::Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Any => true,
        }
    }
}

/// The value shape of a collection: its declared fields, and the ones that
/// never leave the data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    /// Shape name.
    pub name: String,
    /// Declared fields. Empty means "accept anything".
    #[serde(default)]
    pub fields: Vec<(String, FieldKind)>,
    /// Fields stripped from every record handed back to stages.
    #[serde(default)]
    pub hidden: Vec<String>,
}

impl Shape {
    /// Creates an open shape.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            hidden: Vec::new(),
        }
    }

    /// Declares a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push((name.into(), kind));
        self
    }

    /// Marks a field as hidden from reads.
    #[must_use]
    pub fn hidden(mut self, name: impl Into<String>) -> Self {
        self.hidden.push(name.into());
        self
    }

    /// Returns true if the shape declares no fields.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.fields.is_empty()
    }

    /// Checks a document against the shape and drops undeclared fields.
    ///
    /// `id` is always kept.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if a declared field has the wrong type.
    pub fn conform(&self, doc: Document) -> Result<Document, DataSourceError> {
        if self.is_open() {
            return Ok(doc);
        }

        let mut out = Document::new();
        for (key, value) in doc {
            if key == "id" {
                out.insert(key, value);
                continue;
            }
            let Some((_, kind)) = self.fields.iter().find(|(name, _)| *name == key) else {
                continue;
            };
            if !value.is_null() && !kind.accepts(&value) {
                return Err(DataSourceError::ShapeMismatch {
                    shape: self.name.clone(),
                    reason: format!("field '{key}' expected {kind:?}"),
                });
            }
            out.insert(key, value);
        }
        Ok(out)
    }

    /// Returns a copy of the document without hidden fields.
    #[must_use]
    pub fn present(&self, doc: &Document) -> Document {
        doc.iter()
            .filter(|(k, _)| !self.hidden.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Which collection, with which shape, data-access stages target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceDescriptor {
    /// Collection or table name.
    pub name: String,
    /// Value shape.
    pub shape: Shape,
}

impl DataSourceDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }
}

/// Paging for `find`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindOptions {
    /// Records to skip.
    pub skip: usize,
    /// Maximum records to return.
    pub limit: Option<usize>,
}

impl FindOptions {
    /// Creates options from an offset/count pair.
    #[must_use]
    pub fn window(skip: usize, limit: usize) -> Self {
        Self {
            skip,
            limit: Some(limit),
        }
    }
}

/// What an `update_one` call touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    /// Records matching the filter.
    pub matched: u64,
    /// Records changed.
    pub modified: u64,
    /// ID of the inserted record, for upserts that inserted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upserted_id: Option<String>,
}

impl UpdateResult {
    /// Returns true if the call matched or inserted something.
    #[must_use]
    pub fn touched(&self) -> bool {
        self.matched > 0 || self.upserted_id.is_some()
    }
}

/// One collection of a data source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Model: Send + Sync {
    /// Returns the first record matching every filter field.
    async fn find_one(&self, filter: &Document) -> Result<Option<Document>, DataSourceError>;

    /// Returns the matching records, paged.
    async fn find(
        &self,
        filter: &Document,
        options: FindOptions,
    ) -> Result<Vec<Document>, DataSourceError>;

    /// Stores a new record and returns it as stored.
    async fn create(&self, doc: Document) -> Result<Document, DataSourceError>;

    /// Stores several records.
    async fn insert_many(&self, docs: Vec<Document>) -> Result<Vec<Document>, DataSourceError>;

    /// Applies `update` to the first match, inserting when `upsert` is set and
    /// nothing matches.
    async fn update_one(
        &self,
        filter: &Document,
        update: Document,
        upsert: bool,
    ) -> Result<UpdateResult, DataSourceError>;

    /// Deletes the first match and returns the number removed.
    async fn delete_one(&self, filter: &Document) -> Result<u64, DataSourceError>;
}

/// A connection handle that resolves descriptors to models.
pub trait DataSource: Send + Sync {
    /// Returns the model for a descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver cannot serve the collection.
    fn model(&self, descriptor: &DataSourceDescriptor) -> Result<Arc<dyn Model>, DataSourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    fn user_shape() -> Shape {
        Shape::new("User")
            .field("name", FieldKind::String)
            .field("email", FieldKind::String)
            .field("deviceid", FieldKind::String)
            .hidden("deviceid")
    }

    #[test]
    fn test_open_shape_accepts_anything() {
        let shape = Shape::new("Any");
        let input = doc(json!({"x": 1, "y": [1, 2]}));
        assert_eq!(shape.conform(input.clone()).unwrap(), input);
    }

    #[test]
    fn test_conform_drops_undeclared_fields() {
        let out = user_shape()
            .conform(doc(json!({"id": "1", "email": "a@x.com", "password": "p"})))
            .unwrap();

        assert_eq!(out, doc(json!({"id": "1", "email": "a@x.com"})));
    }

    #[test]
    fn test_conform_rejects_wrong_type() {
        let err = user_shape().conform(doc(json!({"email": 42}))).unwrap_err();
        assert!(matches!(err, DataSourceError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_present_strips_hidden() {
        let out = user_shape().present(&doc(json!({"email": "a@x.com", "deviceid": "d1"})));
        assert!(!out.contains_key("deviceid"));
        assert!(out.contains_key("email"));
    }

    #[test]
    fn test_update_result_touched() {
        assert!(!UpdateResult::default().touched());
        assert!(UpdateResult { matched: 1, ..Default::default() }.touched());
        assert!(UpdateResult { upserted_id: Some("x".into()), ..Default::default() }.touched());
    }
}
