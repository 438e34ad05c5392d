//! Reusable data-access operations for `use_data_source` stages.
//!
//! Each factory pulls its match parameters out of one mapped sub-map (see
//! [`MatchableFromSource`]), calls the bound model and turns the answer into a
//! stage result through optional continuations.

use super::{Document, FieldMatch, FindOptions, MatchableFromSource, Model};
use crate::context::RequestContext;
use crate::core::StageResult;
use crate::errors::{DataSourceError, FernError};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Continuation invoked with what the data source returned.
pub type Found = Arc<dyn Fn(&Value) -> StageResult + Send + Sync>;

/// Continuation invoked when the data source returned nothing.
pub type Missing = Arc<dyn Fn() -> StageResult + Send + Sync>;

/// Store key operations write their results under by default.
pub const DEFAULT_RESULT_KEY: &str = "result";

/// An operation run against the model bound for the current run.
#[async_trait]
pub trait DataOperation: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Runs the operation.
    ///
    /// Data-source failures come back as `FernError::DataSource`; the
    /// enclosing stage logs them and declines.
    async fn run(
        &self,
        model: Arc<dyn Model>,
        ctx: &mut RequestContext,
    ) -> Result<StageResult, FernError>;
}

/// Signature of a hand-written data operation.
pub type DataFnSignature = dyn for<'a> Fn(Arc<dyn Model>, &'a mut RequestContext) -> BoxFuture<'a, Result<StageResult, FernError>>
    + Send
    + Sync;

/// A data operation backed by a function.
pub struct DataFn {
    name: String,
    func: Box<DataFnSignature>,
}

impl DataFn {
    /// Wraps a function as a data operation.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: for<'a> Fn(Arc<dyn Model>, &'a mut RequestContext) -> BoxFuture<'a, Result<StageResult, FernError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

impl fmt::Debug for DataFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFn").field("name", &self.name).finish()
    }
}

#[async_trait]
impl DataOperation for DataFn {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        model: Arc<dyn Model>,
        ctx: &mut RequestContext,
    ) -> Result<StageResult, FernError> {
        (self.func)(model, ctx).await
    }
}

fn docs_value(docs: Vec<Document>) -> Value {
    Value::Array(docs.into_iter().map(Value::Object).collect())
}

fn found_or(found: Option<&Found>, value: &Value, default: StageResult) -> StageResult {
    found.map_or(default, |f| f(value))
}

fn missing_or(missing: Option<&Missing>, default: StageResult) -> StageResult {
    missing.map_or(default, |f| f())
}

macro_rules! continuations {
    ($ty:ident) => {
        impl $ty {
            /// Sets the continuation for a hit.
            #[must_use]
            pub fn on_exists<F>(mut self, f: F) -> Self
            where
                F: Fn(&Value) -> StageResult + Send + Sync + 'static,
            {
                self.on_exists = Some(Arc::new(f));
                self
            }

            /// Sets the continuation for a miss.
            #[must_use]
            pub fn on_missing<F>(mut self, f: F) -> Self
            where
                F: Fn() -> StageResult + Send + Sync + 'static,
            {
                self.on_missing = Some(Arc::new(f));
                self
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("matcher", &self.matcher)
                    .field("on_exists", &self.on_exists.is_some())
                    .field("on_missing", &self.on_missing.is_some())
                    .finish_non_exhaustive()
            }
        }
    };
}

/// Succeeds or fails depending on whether a matching record exists.
///
/// Both branches default to `Continue`; supply `on_exists` or `on_missing` to
/// turn either into a failure.
pub struct CheckIfExists {
    matcher: FieldMatch,
    on_exists: Option<Found>,
    on_missing: Option<Missing>,
}

impl MatchableFromSource for CheckIfExists {
    fn from_match(matcher: FieldMatch) -> Self {
        Self {
            matcher,
            on_exists: None,
            on_missing: None,
        }
    }
}

continuations!(CheckIfExists);

#[async_trait]
impl DataOperation for CheckIfExists {
    fn name(&self) -> &str {
        "check_if_exists"
    }

    async fn run(
        &self,
        model: Arc<dyn Model>,
        ctx: &mut RequestContext,
    ) -> Result<StageResult, FernError> {
        let params = self.matcher.extract(ctx)?;
        Ok(match model.find_one(&params).await? {
            Some(doc) => found_or(self.on_exists.as_ref(), &Value::Object(doc), StageResult::Continue),
            None => missing_or(self.on_missing.as_ref(), StageResult::Continue),
        })
    }
}

/// Fetches every matching record into the store.
///
/// No match declines unless `on_missing` says otherwise.
pub struct FetchWhere {
    matcher: FieldMatch,
    store_key: String,
    on_exists: Option<Found>,
    on_missing: Option<Missing>,
}

impl FetchWhere {
    /// Sets the store key the records are written under.
    #[must_use]
    pub fn into_store(mut self, key: impl Into<String>) -> Self {
        self.store_key = key.into();
        self
    }
}

impl MatchableFromSource for FetchWhere {
    fn from_match(matcher: FieldMatch) -> Self {
        Self {
            matcher,
            store_key: DEFAULT_RESULT_KEY.to_string(),
            on_exists: None,
            on_missing: None,
        }
    }
}

continuations!(FetchWhere);

#[async_trait]
impl DataOperation for FetchWhere {
    fn name(&self) -> &str {
        "fetch_where"
    }

    async fn run(
        &self,
        model: Arc<dyn Model>,
        ctx: &mut RequestContext,
    ) -> Result<StageResult, FernError> {
        let params = self.matcher.extract(ctx)?;
        let docs = model.find(&params, FindOptions::default()).await?;
        if docs.is_empty() {
            return Ok(missing_or(self.on_missing.as_ref(), StageResult::Declined));
        }

        let value = docs_value(docs);
        ctx.store_mut().insert(self.store_key.clone(), value.clone());
        Ok(found_or(self.on_exists.as_ref(), &value, StageResult::Continue))
    }
}

/// Fetches the first matching record into the store.
pub struct FetchOne {
    matcher: FieldMatch,
    store_key: String,
    on_exists: Option<Found>,
    on_missing: Option<Missing>,
}

impl FetchOne {
    /// Sets the store key the record is written under.
    #[must_use]
    pub fn into_store(mut self, key: impl Into<String>) -> Self {
        self.store_key = key.into();
        self
    }
}

impl MatchableFromSource for FetchOne {
    fn from_match(matcher: FieldMatch) -> Self {
        Self {
            matcher,
            store_key: DEFAULT_RESULT_KEY.to_string(),
            on_exists: None,
            on_missing: None,
        }
    }
}

continuations!(FetchOne);

#[async_trait]
impl DataOperation for FetchOne {
    fn name(&self) -> &str {
        "fetch_one"
    }

    async fn run(
        &self,
        model: Arc<dyn Model>,
        ctx: &mut RequestContext,
    ) -> Result<StageResult, FernError> {
        let params = self.matcher.extract(ctx)?;
        let Some(doc) = model.find_one(&params).await? else {
            return Ok(missing_or(self.on_missing.as_ref(), StageResult::Declined));
        };

        let value = Value::Object(doc);
        ctx.store_mut().insert(self.store_key.clone(), value.clone());
        Ok(found_or(self.on_exists.as_ref(), &value, StageResult::Continue))
    }
}

/// Fetches a window of the whole collection into the store.
pub struct Fetch {
    window: Option<FindOptions>,
    store_key: String,
    on_success: Option<Found>,
}

impl Fetch {
    /// Fetches every record.
    #[must_use]
    pub fn all() -> Self {
        Self {
            window: None,
            store_key: DEFAULT_RESULT_KEY.to_string(),
            on_success: None,
        }
    }

    /// Fetches `limit` records starting at `start`.
    #[must_use]
    pub fn with_limit(start: usize, limit: usize) -> Self {
        Self {
            window: Some(FindOptions::window(start, limit)),
            ..Self::all()
        }
    }

    /// Sets the store key the records are written under.
    #[must_use]
    pub fn into_store(mut self, key: impl Into<String>) -> Self {
        self.store_key = key.into();
        self
    }

    /// Sets the continuation invoked with the fetched records.
    #[must_use]
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> StageResult + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for Fetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetch")
            .field("window", &self.window)
            .field("store_key", &self.store_key)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DataOperation for Fetch {
    fn name(&self) -> &str {
        "fetch"
    }

    async fn run(
        &self,
        model: Arc<dyn Model>,
        ctx: &mut RequestContext,
    ) -> Result<StageResult, FernError> {
        let docs = model
            .find(&Document::new(), self.window.unwrap_or_default())
            .await?;
        let value = docs_value(docs);
        ctx.store_mut().insert(self.store_key.clone(), value.clone());
        Ok(found_or(self.on_success.as_ref(), &value, StageResult::Continue))
    }
}

/// Inserts one record built from the matched fields.
///
/// A write the data source rejects (duplicate, shape mismatch) goes to
/// `on_missing`, or declines.
pub struct Insert {
    matcher: FieldMatch,
    store_key: String,
    on_exists: Option<Found>,
    on_missing: Option<Missing>,
}

impl Insert {
    /// Sets the store key the created record is written under.
    #[must_use]
    pub fn into_store(mut self, key: impl Into<String>) -> Self {
        self.store_key = key.into();
        self
    }
}

impl MatchableFromSource for Insert {
    fn from_match(matcher: FieldMatch) -> Self {
        Self {
            matcher,
            store_key: DEFAULT_RESULT_KEY.to_string(),
            on_exists: None,
            on_missing: None,
        }
    }
}

continuations!(Insert);

#[async_trait]
impl DataOperation for Insert {
    fn name(&self) -> &str {
        "insert"
    }

    async fn run(
        &self,
        model: Arc<dyn Model>,
        ctx: &mut RequestContext,
    ) -> Result<StageResult, FernError> {
        let params = self.matcher.extract(ctx)?;
        match model.create(params).await {
            Ok(doc) => {
                let value = Value::Object(doc);
                ctx.store_mut().insert(self.store_key.clone(), value.clone());
                Ok(found_or(self.on_exists.as_ref(), &value, StageResult::Continue))
            }
            Err(DataSourceError::Duplicate(_) | DataSourceError::ShapeMismatch { .. }) => {
                Ok(missing_or(self.on_missing.as_ref(), StageResult::Declined))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Inserts several records.
///
/// Each matched field contributes its value: an array of objects adds every
/// element, an object adds itself, anything else is ignored.
pub struct InsertMany {
    matcher: FieldMatch,
    store_key: String,
    on_exists: Option<Found>,
    on_missing: Option<Missing>,
}

impl InsertMany {
    /// Sets the store key the created records are written under.
    #[must_use]
    pub fn into_store(mut self, key: impl Into<String>) -> Self {
        self.store_key = key.into();
        self
    }

    fn collect_docs(params: Document) -> Vec<Document> {
        params
            .into_iter()
            .flat_map(|(_, value)| match value {
                Value::Array(items) => items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(doc) => Some(doc),
                        _ => None,
                    })
                    .collect(),
                Value::Object(doc) => vec![doc],
                _ => Vec::new(),
            })
            .collect()
    }
}

impl MatchableFromSource for InsertMany {
    fn from_match(matcher: FieldMatch) -> Self {
        Self {
            matcher,
            store_key: DEFAULT_RESULT_KEY.to_string(),
            on_exists: None,
            on_missing: None,
        }
    }
}

continuations!(InsertMany);

#[async_trait]
impl DataOperation for InsertMany {
    fn name(&self) -> &str {
        "insert_many"
    }

    async fn run(
        &self,
        model: Arc<dyn Model>,
        ctx: &mut RequestContext,
    ) -> Result<StageResult, FernError> {
        let docs = Self::collect_docs(self.matcher.extract(ctx)?);
        if docs.is_empty() {
            return Ok(missing_or(self.on_missing.as_ref(), StageResult::Declined));
        }

        let created = model.insert_many(docs).await?;
        let value = docs_value(created);
        ctx.store_mut().insert(self.store_key.clone(), value.clone());
        Ok(found_or(self.on_exists.as_ref(), &value, StageResult::Continue))
    }
}

/// Updates the first record matching the key fields with the other fields.
///
/// With `upsert`, a miss inserts instead (insert-or-update). A miss without
/// upsert goes to `on_missing`, or declines.
pub struct Update {
    matcher: FieldMatch,
    match_keys: Vec<String>,
    upsert: bool,
    on_exists: Option<Found>,
    on_missing: Option<Missing>,
}

impl Update {
    /// Sets which of the extracted fields form the match clause.
    ///
    /// Defaults to the first extracted key.
    #[must_use]
    pub fn matching(mut self, keys: &[&str]) -> Self {
        self.match_keys = keys
            .iter()
            .map(|k| self.matcher.source().normalize_key(k))
            .collect();
        self
    }

    /// Inserts when nothing matches.
    #[must_use]
    pub fn upsert(mut self) -> Self {
        self.upsert = true;
        self
    }

    fn split(&self, params: Document) -> (Document, Document) {
        let keys: Vec<&String> = if self.match_keys.is_empty() {
            self.matcher.keys().iter().take(1).collect()
        } else {
            self.match_keys.iter().collect()
        };
        params
            .into_iter()
            .partition(|(k, _)| keys.contains(&k))
    }
}

impl MatchableFromSource for Update {
    fn from_match(matcher: FieldMatch) -> Self {
        Self {
            matcher,
            match_keys: Vec::new(),
            upsert: false,
            on_exists: None,
            on_missing: None,
        }
    }
}

continuations!(Update);

#[async_trait]
impl DataOperation for Update {
    fn name(&self) -> &str {
        if self.upsert {
            "insert_or_update"
        } else {
            "update"
        }
    }

    async fn run(
        &self,
        model: Arc<dyn Model>,
        ctx: &mut RequestContext,
    ) -> Result<StageResult, FernError> {
        let (filter, update) = self.split(self.matcher.extract(ctx)?);
        let result = model.update_one(&filter, update, self.upsert).await?;
        if !result.touched() {
            return Ok(missing_or(self.on_missing.as_ref(), StageResult::Declined));
        }

        let value = serde_json::to_value(&result)?;
        Ok(found_or(self.on_exists.as_ref(), &value, StageResult::Continue))
    }
}

/// Deletes the first record matching the fields.
pub struct DeleteOne {
    matcher: FieldMatch,
    on_exists: Option<Found>,
    on_missing: Option<Missing>,
}

impl MatchableFromSource for DeleteOne {
    fn from_match(matcher: FieldMatch) -> Self {
        Self {
            matcher,
            on_exists: None,
            on_missing: None,
        }
    }
}

continuations!(DeleteOne);

#[async_trait]
impl DataOperation for DeleteOne {
    fn name(&self) -> &str {
        "delete_one"
    }

    async fn run(
        &self,
        model: Arc<dyn Model>,
        ctx: &mut RequestContext,
    ) -> Result<StageResult, FernError> {
        let params = self.matcher.extract(ctx)?;
        let deleted = model.delete_one(&params).await?;
        if deleted == 0 {
            return Ok(missing_or(self.on_missing.as_ref(), StageResult::Declined));
        }
        Ok(found_or(
            self.on_exists.as_ref(),
            &serde_json::json!({ "deleted": deleted }),
            StageResult::Continue,
        ))
    }
}
