//! Metadata documents and the registry of known document types.
//!
//! The store treats payloads as opaque JSON objects. [`DocumentKind`] maps the
//! type tags produced by known analyzers to a structural shape, which callers may
//! use to check a document. The store itself never enforces it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A JSON object payload.
pub type Payload = Map<String, Value>;

/// A typed metadata document attached to a catalog path.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    /// Analyzer-defined type tag. Empty for untyped documents (e.g. created by `touch`).
    #[serde(rename = "type", default)]
    pub doc_type: String,
    #[serde(default)]
    pub metadata: Payload,
}

impl MetadataDocument {
    pub fn new(doc_type: impl Into<String>, metadata: Payload) -> Self {
        MetadataDocument {
            doc_type: doc_type.into(),
            metadata,
        }
    }

    /// The empty, untyped document written by `touch`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// This document nested under its own type tag, `{type: metadata}`.
    ///
    /// Analyzers write in this form so that patches from different analyzers
    /// on one path land in separate sections instead of mixing their keys.
    pub fn into_section(self) -> Self {
        let mut metadata = Payload::new();
        metadata.insert(self.doc_type.clone(), Value::Object(self.metadata));
        MetadataDocument {
            doc_type: self.doc_type,
            metadata,
        }
    }

    /// The object stored under `tag`, if any.
    pub fn section(&self, tag: &str) -> Option<&Payload> {
        self.metadata.get(tag).and_then(Value::as_object)
    }

    /// Every object-valued key of the payload with its object.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &Payload)> {
        self.metadata
            .iter()
            .filter_map(|(tag, value)| Some((tag.as_str(), value.as_object()?)))
    }

    /// The payload the type's shape applies to: the section named after the
    /// type when there is one, the whole payload otherwise.
    pub fn shaped_payload(&self) -> &Payload {
        self.section(&self.doc_type).unwrap_or(&self.metadata)
    }

    pub fn kind(&self) -> DocumentKind {
        DocumentKind::from_tag(&self.doc_type)
    }
}

/// Known document types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    Untyped,
    Access,
    Indexes,
    Profile,
    Comment,
    ViewDefinition,
    Custom(String),
}

impl DocumentKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "" => DocumentKind::Untyped,
            "access" => DocumentKind::Access,
            "indexes" => DocumentKind::Indexes,
            "profile" => DocumentKind::Profile,
            "comment" => DocumentKind::Comment,
            "view_definition" => DocumentKind::ViewDefinition,
            other => DocumentKind::Custom(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            DocumentKind::Untyped => "",
            DocumentKind::Access => "access",
            DocumentKind::Indexes => "indexes",
            DocumentKind::Profile => "profile",
            DocumentKind::Comment => "comment",
            DocumentKind::ViewDefinition => "view_definition",
            DocumentKind::Custom(tag) => tag,
        }
    }

    /// Human readable description of the payload shape.
    pub fn shape(&self) -> &'static str {
        match self {
            DocumentKind::Untyped => "any object",
            DocumentKind::Access => "grantee -> {privileges: [string], read: bool, write: bool}",
            DocumentKind::Indexes => "index_name -> {columns: [string], unique: bool}",
            DocumentKind::Profile => "column -> {count: int, ...statistics by type class}",
            DocumentKind::Comment | DocumentKind::ViewDefinition => "{text: string}",
            DocumentKind::Custom(_) => "analyzer defined",
        }
    }

    /// Checks that `payload` has the registered shape for this kind.
    ///
    /// Untyped and custom documents always pass.
    pub fn check(&self, payload: &Payload) -> Result<(), serde_json::Error> {
        let value = Value::Object(payload.clone());
        match self {
            DocumentKind::Untyped | DocumentKind::Custom(_) => Ok(()),
            DocumentKind::Access => serde_json::from_value::<AccessShape>(value).map(|_| ()),
            DocumentKind::Indexes => serde_json::from_value::<IndexesShape>(value).map(|_| ()),
            DocumentKind::Profile => serde_json::from_value::<ProfileShape>(value).map(|_| ()),
            DocumentKind::Comment | DocumentKind::ViewDefinition => {
                serde_json::from_value::<TextShape>(value).map(|_| ())
            }
        }
    }
}

/// Access grants for one grantee.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserAccess {
    pub privileges: Vec<String>,
    pub read: bool,
    pub write: bool,
}

/// One index on a table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexInfo {
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Statistics computed for one column.
///
/// Only `count` is common to every type class; the rest depends on whether the
/// column is binary, date, numeric or string.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nulls: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zeros: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negatives: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_strings: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unix_epochs: Option<u64>,
}

type AccessShape = BTreeMap<String, UserAccess>;
type IndexesShape = BTreeMap<String, IndexInfo>;
type ProfileShape = BTreeMap<String, ColumnProfile>;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(dead_code)]
struct TextShape {
    text: String,
}
