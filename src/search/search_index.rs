//! Search index trait and the in-memory implementation.

use super::query::SearchQuery;
use crate::catalog::{CatalogPath, MetadataDocument, SearchHit};
use crate::store::VersionedRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use tracing::info;

pub trait SearchIndex: Send + Sync {
    /// Live documents matching `query`, in path order.
    fn search(&self, query: &SearchQuery) -> Vec<SearchHit>;

    /// Record `document` as the current version of `path`.
    ///
    /// Ignored when the index already holds `path` at `version` or newer.
    fn upsert(&self, path: &CatalogPath, version: u64, document: &MetadataDocument);

    /// Record that `path` was tombstoned at `version`.
    fn remove(&self, path: &CatalogPath, version: u64);

    /// Repopulate the index from a snapshot of live documents.
    fn rebuild(&self, documents: Vec<(CatalogPath, VersionedRecord)>);

    fn stats(&self) -> SearchIndexStats;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchIndexStats {
    pub indexed_documents: usize,
    pub index_type: String,
}

struct IndexedEntry {
    path: CatalogPath,
    version: u64,
    /// `None` once the path is tombstoned; the entry is kept to guard the version.
    document: Option<MetadataDocument>,
}

/// Scans every current document against the query terms.
#[derive(Default)]
pub struct TermSearchIndex {
    entries: RwLock<BTreeMap<String, IndexedEntry>>,
}

impl TermSearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply(&self, path: &CatalogPath, version: u64, document: Option<MetadataDocument>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get_mut(path.as_str()) {
            Some(existing) if existing.version >= version => {}
            Some(existing) => {
                existing.version = version;
                existing.document = document;
            }
            None => {
                entries.insert(
                    path.as_str().to_string(),
                    IndexedEntry {
                        path: path.clone(),
                        version,
                        document,
                    },
                );
            }
        }
    }
}

impl SearchIndex for TermSearchIndex {
    fn search(&self, query: &SearchQuery) -> Vec<SearchHit> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .values()
            .filter_map(|entry| {
                let document = entry.document.as_ref()?;
                query.matches(&entry.path, document).then(|| SearchHit {
                    path: entry.path.clone(),
                    document: document.clone(),
                })
            })
            .collect()
    }

    fn upsert(&self, path: &CatalogPath, version: u64, document: &MetadataDocument) {
        self.apply(path, version, Some(document.clone()));
    }

    fn remove(&self, path: &CatalogPath, version: u64) {
        self.apply(path, version, None);
    }

    fn rebuild(&self, documents: Vec<(CatalogPath, VersionedRecord)>) {
        let mut rebuilt: BTreeMap<String, IndexedEntry> = documents
            .into_iter()
            .map(|(path, record)| {
                (
                    path.as_str().to_string(),
                    IndexedEntry {
                        path,
                        version: record.version,
                        document: Some(record.document),
                    },
                )
            })
            .collect();

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Keep anything written after the snapshot was taken.
        for (key, entry) in std::mem::take(&mut *entries) {
            let newer = rebuilt
                .get(&key)
                .map_or(true, |snapshot| snapshot.version < entry.version);
            if newer {
                rebuilt.insert(key, entry);
            }
        }
        *entries = rebuilt;
        info!(
            "Search index rebuilt with {} documents",
            entries.values().filter(|e| e.document.is_some()).count()
        );
    }

    fn stats(&self) -> SearchIndexStats {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        SearchIndexStats {
            indexed_documents: entries.values().filter(|e| e.document.is_some()).count(),
            index_type: "term-scan".to_string(),
        }
    }
}
