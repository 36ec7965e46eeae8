//! Feeds backed by a JSON snapshot of previously computed metadata.
//!
//! The snapshot maps paths to documents keyed by type tag:
//!
//! ```json
//! {
//!   "/db/public/orders": {
//!     "comment": {"text": "Customer orders"},
//!     "indexes": {"orders_pk": {"columns": ["id"], "unique": true}}
//!   }
//! }
//! ```

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use super::{AnalyzerFeed, TypedDocument};
use crate::catalog::{CatalogPath, MetadataDocument};

/// Serves one document type out of a snapshot.
pub struct SnapshotFeed {
    name: String,
    documents: BTreeMap<CatalogPath, TypedDocument>,
}

impl SnapshotFeed {
    pub fn paths(&self) -> impl Iterator<Item = &CatalogPath> {
        self.documents.keys()
    }
}

impl AnalyzerFeed for SnapshotFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn analyze(&self, path: &CatalogPath) -> Option<TypedDocument> {
        self.documents.get(path).cloned()
    }
}

/// Splits a snapshot into one feed per document type, ordered by type tag.
pub fn snapshot_feeds(snapshot: Value) -> Result<Vec<SnapshotFeed>> {
    let Value::Object(entries) = snapshot else {
        bail!("Snapshot must be a JSON object keyed by path");
    };

    let mut by_type: BTreeMap<String, BTreeMap<CatalogPath, TypedDocument>> = BTreeMap::new();
    for (raw_path, documents) in entries {
        let path = CatalogPath::normalize(&raw_path)
            .with_context(|| format!("Invalid path in snapshot: {:?}", raw_path))?;
        let Value::Object(documents) = documents else {
            bail!("Documents for {} must be an object keyed by type", path);
        };
        for (doc_type, metadata) in documents {
            let Value::Object(metadata) = metadata else {
                bail!("Metadata of type {:?} at {} must be an object", doc_type, path);
            };
            let document = MetadataDocument::new(doc_type.clone(), metadata);
            by_type
                .entry(doc_type)
                .or_default()
                .insert(path.clone(), document.into());
        }
    }

    Ok(by_type
        .into_iter()
        .map(|(doc_type, documents)| SnapshotFeed {
            name: format!("snapshot:{}", doc_type),
            documents,
        })
        .collect())
}

/// Reads a snapshot file and splits it with [`snapshot_feeds`].
pub fn load_snapshot(path: &Path) -> Result<Vec<SnapshotFeed>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let snapshot: Value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
    snapshot_feeds(snapshot)
}
