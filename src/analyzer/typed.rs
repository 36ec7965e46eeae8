//! Typed documents produced by analyzers.

use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::catalog::{
    ColumnProfile, DocumentKind, IndexInfo, MetadataDocument, Payload, UserAccess,
};

const READ_PRIVILEGES: &[&str] = &["SELECT"];
const WRITE_PRIVILEGES: &[&str] = &["INSERT", "UPDATE", "DELETE", "TRUNCATE"];

/// A document an analyzer computed for one path.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedDocument {
    Access(BTreeMap<String, UserAccess>),
    Indexes(BTreeMap<String, IndexInfo>),
    Profile(BTreeMap<String, ColumnProfile>),
    Comment(String),
    ViewDefinition(String),
    /// Anything not covered by the known types, written as-is.
    Custom { doc_type: String, metadata: Payload },
}

impl TypedDocument {
    /// Builds an access document from `(grantee, privilege)` rows.
    ///
    /// Returns `None` when there are no rows, which is how a table without
    /// visible grants is reported.
    pub fn from_grants<G, P>(rows: impl IntoIterator<Item = (G, P)>) -> Option<Self>
    where
        G: Into<String>,
        P: Into<String>,
    {
        let mut grants: BTreeMap<String, UserAccess> = BTreeMap::new();
        for (grantee, privilege) in rows {
            let privilege = privilege.into().to_ascii_uppercase();
            let access = grants.entry(grantee.into()).or_default();
            if READ_PRIVILEGES.contains(&privilege.as_str()) {
                access.read = true;
            }
            if WRITE_PRIVILEGES.contains(&privilege.as_str()) {
                access.write = true;
            }
            access.privileges.push(privilege);
        }
        if grants.is_empty() {
            None
        } else {
            Some(TypedDocument::Access(grants))
        }
    }

    /// Builds an index document, or `None` if the table has no indexes.
    pub fn from_indexes(indexes: impl IntoIterator<Item = (String, IndexInfo)>) -> Option<Self> {
        let indexes: BTreeMap<_, _> = indexes.into_iter().collect();
        if indexes.is_empty() {
            None
        } else {
            Some(TypedDocument::Indexes(indexes))
        }
    }

    /// A comment document, or `None` for a missing or blank comment.
    pub fn comment(text: Option<&str>) -> Option<Self> {
        match text {
            Some(text) if !text.trim().is_empty() => Some(TypedDocument::Comment(text.to_string())),
            _ => None,
        }
    }

    /// Reads `metadata` back as a document of type `doc_type`.
    ///
    /// Payloads that do not have the registered shape of their type come back
    /// as [`TypedDocument::Custom`] so nothing is dropped.
    pub fn from_payload(doc_type: &str, metadata: Payload) -> Self {
        let text = || match metadata.get("text") {
            Some(Value::String(text)) if metadata.len() == 1 => Some(text.clone()),
            _ => None,
        };
        let value = || Value::Object(metadata.clone());
        let typed = match DocumentKind::from_tag(doc_type) {
            DocumentKind::Access => serde_json::from_value(value()).ok().map(TypedDocument::Access),
            DocumentKind::Indexes => serde_json::from_value(value()).ok().map(TypedDocument::Indexes),
            DocumentKind::Profile => serde_json::from_value(value()).ok().map(TypedDocument::Profile),
            DocumentKind::Comment => text().map(TypedDocument::Comment),
            DocumentKind::ViewDefinition => text().map(TypedDocument::ViewDefinition),
            DocumentKind::Untyped | DocumentKind::Custom(_) => None,
        };
        typed.unwrap_or_else(|| TypedDocument::Custom {
            doc_type: doc_type.to_string(),
            metadata,
        })
    }

    /// The output an analyzer of type `doc_type` left in `document`.
    pub fn section_of(document: &MetadataDocument, doc_type: &str) -> Option<Self> {
        let section = document.section(doc_type)?;
        Some(Self::from_payload(doc_type, section.clone()))
    }

    pub fn doc_type(&self) -> &str {
        match self {
            TypedDocument::Access(_) => "access",
            TypedDocument::Indexes(_) => "indexes",
            TypedDocument::Profile(_) => "profile",
            TypedDocument::Comment(_) => "comment",
            TypedDocument::ViewDefinition(_) => "view_definition",
            TypedDocument::Custom { doc_type, .. } => doc_type,
        }
    }

    pub fn into_document(self) -> Result<MetadataDocument, serde_json::Error> {
        let doc_type = self.doc_type().to_string();
        let value = match self {
            TypedDocument::Access(grants) => serde_json::to_value(grants)?,
            TypedDocument::Indexes(indexes) => serde_json::to_value(indexes)?,
            TypedDocument::Profile(columns) => serde_json::to_value(columns)?,
            TypedDocument::Comment(text) | TypedDocument::ViewDefinition(text) => {
                json!({ "text": text })
            }
            TypedDocument::Custom { metadata, .. } => Value::Object(metadata),
        };
        let metadata = match value {
            Value::Object(map) => map,
            _ => Payload::new(),
        };
        Ok(MetadataDocument::new(doc_type, metadata))
    }
}

impl From<MetadataDocument> for TypedDocument {
    fn from(document: MetadataDocument) -> Self {
        TypedDocument::from_payload(&document.doc_type, document.metadata)
    }
}
