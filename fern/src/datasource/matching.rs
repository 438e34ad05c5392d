//! Sourcing match parameters from a mapped sub-map.

use super::Document;
use crate::context::{extract_fields, FieldSource, RequestContext};
use crate::errors::{DataSourceError, FernError};

/// "Take these named fields from that sub-map."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    source: FieldSource,
    keys: Vec<String>,
}

impl FieldMatch {
    /// Creates a match over `keys` of `source`.
    #[must_use]
    pub fn new(source: FieldSource, keys: &[&str]) -> Self {
        Self {
            source,
            keys: keys.iter().map(|k| source.normalize_key(k)).collect(),
        }
    }

    /// Returns the source sub-map.
    #[must_use]
    pub fn source(&self) -> FieldSource {
        self.source
    }

    /// Returns the keys.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Extracts the named fields. The result always holds every key.
    ///
    /// # Errors
    ///
    /// Returns `UnmappedField` if the source was never mapped, and
    /// `MissingMatchFields` if any key is absent from it.
    pub fn extract(&self, ctx: &RequestContext) -> Result<Document, FernError> {
        let map = ctx.field(self.source)?;
        let missing: Vec<String> = self
            .keys
            .iter()
            .filter(|k| !map.contains_key(k.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(DataSourceError::MissingMatchFields {
                source_name: self.source.to_string(),
                missing,
            }
            .into());
        }
        Ok(extract_fields(map, &self.keys))
    }
}

/// Data-access factories whose parameters come from one sub-map.
pub trait MatchableFromSource: Sized {
    /// Builds the operation from a match.
    fn from_match(matcher: FieldMatch) -> Self;

    /// Parameters from any sub-map.
    fn from_source(source: FieldSource, keys: &[&str]) -> Self {
        Self::from_match(FieldMatch::new(source, keys))
    }

    /// Parameters from the mapped body.
    fn from_body(keys: &[&str]) -> Self {
        Self::from_source(FieldSource::Body, keys)
    }

    /// Parameters from the mapped path parameters.
    fn from_params(keys: &[&str]) -> Self {
        Self::from_source(FieldSource::Params, keys)
    }

    /// Parameters from the mapped query string.
    fn from_query(keys: &[&str]) -> Self {
        Self::from_source(FieldSource::Query, keys)
    }

    /// Parameters from the mapped headers.
    fn from_header(keys: &[&str]) -> Self {
        Self::from_source(FieldSource::Header, keys)
    }

    /// Parameters from the store.
    fn from_store(keys: &[&str]) -> Self {
        Self::from_source(FieldSource::Store, keys)
    }
}
