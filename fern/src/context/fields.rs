//! Named field sources and the maps mapping stages fill.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A mapped sub-map: string keys to arbitrary JSON values.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// The named sub-maps of a request context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// Request body.
    Body,
    /// Path parameters.
    Params,
    /// Query string.
    Query,
    /// Request headers.
    Header,
    /// Per-run scratch space shared between stages.
    Store,
}

impl FieldSource {
    /// All sources that have a raw counterpart on the transport object.
    pub const MAPPABLE: [Self; 4] = [Self::Body, Self::Params, Self::Query, Self::Header];

    /// Returns true if a mapping stage can populate this source.
    #[must_use]
    pub fn is_mappable(&self) -> bool {
        !matches!(self, Self::Store)
    }

    /// Normalises a key for lookups against this source.
    ///
    /// Header names are case-insensitive on the wire and arrive lower-cased.
    #[must_use]
    pub fn normalize_key(&self, key: &str) -> String {
        match self {
            Self::Header => key.to_ascii_lowercase(),
            _ => key.to_string(),
        }
    }
}

impl fmt::Display for FieldSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Body => write!(f, "body"),
            Self::Params => write!(f, "params"),
            Self::Query => write!(f, "query"),
            Self::Header => write!(f, "header"),
            Self::Store => write!(f, "store"),
        }
    }
}

/// Copies the named keys out of `source`, skipping the ones it lacks.
#[must_use]
pub fn extract_fields(source: &FieldMap, keys: &[String]) -> FieldMap {
    keys.iter()
        .filter_map(|k| source.get(k).map(|v| (k.clone(), v.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_source_display() {
        assert_eq!(FieldSource::Body.to_string(), "body");
        assert_eq!(FieldSource::Header.to_string(), "header");
        assert_eq!(FieldSource::Store.to_string(), "store");
    }

    #[test]
    fn test_store_is_not_mappable() {
        assert!(!FieldSource::Store.is_mappable());
        assert!(FieldSource::MAPPABLE.iter().all(FieldSource::is_mappable));
    }

    #[test]
    fn test_header_keys_are_lowercased() {
        assert_eq!(FieldSource::Header.normalize_key("Authorization"), "authorization");
        assert_eq!(FieldSource::Body.normalize_key("userId"), "userId");
    }

    #[test]
    fn test_extract_fields_skips_missing() {
        let source: FieldMap = serde_json::from_value(json!({"a": 1, "b": 2})).unwrap();
        let out = extract_fields(&source, &["a".to_string(), "c".to_string()]);

        assert_eq!(out.len(), 1);
        assert_eq!(out.get("a"), Some(&json!(1)));
    }
}
