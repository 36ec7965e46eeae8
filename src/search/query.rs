//! Search query parsing and matching.

use crate::catalog::{CatalogPath, MetadataDocument};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryTerm {
    /// `type:<tag>`, stored lowercased.
    Type(String),
    /// `path:<path>`: the path itself and everything below it.
    Subtree(CatalogPath),
    /// A `path:` term that does not normalize. No entry can live there.
    BadPath(String),
    /// `<dotted.key>=<value>`.
    Field { key: Vec<String>, value: String },
    /// Free text, stored lowercased.
    Text(String),
}

impl QueryTerm {
    fn parse(raw: &str) -> Self {
        if let Some(tag) = raw.strip_prefix("type:") {
            return QueryTerm::Type(tag.to_lowercase());
        }
        if let Some(prefix) = raw.strip_prefix("path:") {
            return match CatalogPath::normalize(prefix) {
                Ok(path) => QueryTerm::Subtree(path),
                Err(_) => QueryTerm::BadPath(prefix.to_string()),
            };
        }
        if let Some((key, value)) = raw.split_once('=') {
            if !key.is_empty() {
                return QueryTerm::Field {
                    key: key.split('.').map(str::to_string).collect(),
                    value: value.to_string(),
                };
            }
        }
        QueryTerm::Text(raw.to_lowercase())
    }

    fn matches(&self, path: &CatalogPath, document: &MetadataDocument) -> bool {
        match self {
            QueryTerm::Type(tag) => {
                document.doc_type.to_lowercase() == *tag
                    || document
                        .sections()
                        .any(|(section, _)| section.to_lowercase() == *tag)
            }
            QueryTerm::Subtree(root) => path == root || path.is_descendant_of(root),
            QueryTerm::BadPath(_) => false,
            QueryTerm::Field { key, value } => {
                let mut current: Option<&Value> = None;
                for (i, segment) in key.iter().enumerate() {
                    current = if i == 0 {
                        document.metadata.get(segment)
                    } else {
                        current.and_then(|v| child(v, segment))
                    };
                    if current.is_none() {
                        return false;
                    }
                }
                current.is_some_and(|v| render(v) == *value)
            }
            QueryTerm::Text(needle) => {
                path.as_str().to_lowercase().contains(needle)
                    || document.doc_type.to_lowercase().contains(needle)
                    || document
                        .metadata
                        .iter()
                        .any(|(k, v)| k.to_lowercase().contains(needle) || value_contains(v, needle))
            }
        }
    }
}

fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_contains(value: &Value, needle: &str) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(k, v)| k.to_lowercase().contains(needle) || value_contains(v, needle)),
        Value::Array(items) => items.iter().any(|v| value_contains(v, needle)),
        scalar => render(scalar).to_lowercase().contains(needle),
    }
}

/// A parsed search query. Every term must match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchQuery {
    terms: Vec<QueryTerm>,
}

impl SearchQuery {
    /// Splits `raw` shell-style, so `"order id"` is a single term. Input with
    /// unbalanced quotes falls back to plain whitespace splitting.
    ///
    /// Never fails: a term that cannot match anything just yields no hits.
    pub fn parse(raw: &str) -> Self {
        let words = shlex::split(raw)
            .unwrap_or_else(|| raw.split_whitespace().map(str::to_string).collect());
        let terms = words
            .iter()
            .filter(|w| !w.is_empty())
            .map(|w| QueryTerm::parse(w))
            .collect();
        SearchQuery { terms }
    }

    pub fn terms(&self) -> &[QueryTerm] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn matches(&self, path: &CatalogPath, document: &MetadataDocument) -> bool {
        self.terms.iter().all(|t| t.matches(path, document))
    }
}
