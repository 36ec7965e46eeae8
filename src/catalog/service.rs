//! In-process catalog backed by the versioned store and the search index.

use super::merge::WriteMode;
use super::trait_def::{CatalogService, SearchHit};
use super::{CatalogError, CatalogPath, MetadataDocument, Payload};
use crate::search::{SearchIndex, SearchIndexStats, SearchQuery, TermSearchIndex};
use crate::server::metrics;
use crate::store::{SqliteRecordJournal, StoreStats, VersionedDocumentStore, VersionedRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub store: StoreStats,
    pub search: SearchIndexStats,
}

pub struct LocalCatalog {
    store: VersionedDocumentStore,
    index: Arc<dyn SearchIndex>,
}

impl LocalCatalog {
    /// Wraps `store`, seeding `index` with the documents currently live in it.
    pub fn new(store: VersionedDocumentStore, index: Arc<dyn SearchIndex>) -> Self {
        index.rebuild(store.live_documents(None));
        LocalCatalog { store, index }
    }

    /// A catalog that forgets everything on drop.
    pub fn in_memory() -> Self {
        Self::new(VersionedDocumentStore::new(), Arc::new(TermSearchIndex::new()))
    }

    /// A catalog journaled to the SQLite database at `db_path`.
    pub fn open<P: AsRef<Path>>(db_path: P) -> anyhow::Result<Self> {
        let journal = Arc::new(SqliteRecordJournal::open(db_path)?);
        let store = VersionedDocumentStore::open(journal)?;
        Ok(Self::new(store, Arc::new(TermSearchIndex::new())))
    }

    /// Every version ever written at `path`, oldest first.
    pub fn history(&self, path: &str) -> Result<Vec<VersionedRecord>, CatalogError> {
        let path = CatalogPath::normalize(path)?;
        Ok(self.store.history(&path))
    }

    pub fn stats(&self) -> CatalogStats {
        let store = self.store.stats();
        metrics::set_store_stats(&store);
        CatalogStats {
            store,
            search: self.index.stats(),
        }
    }

    fn write_document(
        &self,
        path: &str,
        update: MetadataDocument,
        mode: WriteMode,
    ) -> Result<(), CatalogError> {
        let path = CatalogPath::normalize(path)?;
        let kind = update.kind();
        if let Err(e) = kind.check(update.shaped_payload()) {
            warn!(
                "Document for {} does not have the {} shape ({}): {}",
                path,
                kind.tag(),
                kind.shape(),
                e
            );
        }

        let written = self.store.update_in_tree(&path, Utc::now(), |latest| {
            let existing = latest.filter(|r| !r.tombstone).map(|r| &r.document);
            (mode.resolve(existing, update), false)
        })?;
        for (ancestor, record) in &written.revived {
            self.index.upsert(ancestor, record.version, &record.document);
        }
        let record = written.record;
        self.index.upsert(&path, record.version, &record.document);
        debug!("Wrote {} v{} ({:?})", path, record.version, mode);
        Ok(())
    }
}

fn observe<T>(operation: &str, start: Instant, result: &Result<T, CatalogError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::record_catalog_operation(operation, outcome, start.elapsed());
}

impl CatalogService for LocalCatalog {
    fn write(
        &self,
        path: &str,
        doc_type: &str,
        metadata: Payload,
        patch: bool,
    ) -> Result<(), CatalogError> {
        let start = Instant::now();
        let result = self.write_document(
            path,
            MetadataDocument::new(doc_type, metadata),
            WriteMode::from_patch_flag(patch),
        );
        observe("write", start, &result);
        result
    }

    fn rm(&self, path: &str, cascade: bool) -> Result<(), CatalogError> {
        let start = Instant::now();
        let result = CatalogPath::normalize(path).and_then(|path| {
            let removed = self.store.remove(&path, cascade, Utc::now())?;
            for (removed_path, record) in &removed {
                self.index.remove(removed_path, record.version);
            }
            Ok(())
        });
        observe("rm", start, &result);
        result
    }

    fn ls(
        &self,
        path: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<Vec<String>>, CatalogError> {
        let start = Instant::now();
        let result = CatalogPath::normalize(path).map(|path| {
            if !self.store.is_live(&path, at) {
                return None;
            }
            Some(self.store.children(&path, at).into_iter().collect())
        });
        observe("ls", start, &result);
        result
    }

    fn read(
        &self,
        path: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<MetadataDocument>, CatalogError> {
        let start = Instant::now();
        let result = CatalogPath::normalize(path)
            .map(|path| self.store.get_live(&path, at).map(|record| record.document));
        observe("read", start, &result);
        result
    }

    fn search(
        &self,
        query: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Vec<SearchHit>, CatalogError> {
        let start = Instant::now();
        let query = SearchQuery::parse(query);
        let hits = match at {
            None => self.index.search(&query),
            Some(at) => self
                .store
                .live_documents(Some(at))
                .into_iter()
                .filter(|(path, record)| query.matches(path, &record.document))
                .map(|(path, record)| SearchHit {
                    path,
                    document: record.document,
                })
                .collect(),
        };
        let result: Result<_, CatalogError> = Ok(hits);
        observe("search", start, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::thread;
    use std::time::Duration;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    fn paths(hits: Vec<SearchHit>) -> Vec<String> {
        hits.into_iter().map(|h| h.path.to_string()).collect()
    }

    fn pause() {
        thread::sleep(Duration::from_millis(5));
    }

    #[test]
    fn touch_then_read_returns_empty_document() {
        let catalog = LocalCatalog::in_memory();
        catalog.touch("/a/b").unwrap();
        assert_eq!(catalog.read("/a/b", None).unwrap(), Some(MetadataDocument::empty()));
    }

    #[test]
    fn writes_create_ancestors() {
        let catalog = LocalCatalog::in_memory();
        catalog
            .write("/db/public/orders", "comment", payload(json!({"text": "x"})), true)
            .unwrap();

        assert_eq!(catalog.ls("/", None).unwrap(), Some(vec!["db".to_string()]));
        assert_eq!(catalog.ls("/db", None).unwrap(), Some(vec!["public".to_string()]));
        assert_eq!(
            catalog.ls("/db/public", None).unwrap(),
            Some(vec!["orders".to_string()])
        );
        assert_eq!(catalog.ls("/db/public/orders", None).unwrap(), Some(vec![]));
        assert_eq!(catalog.read("/db", None).unwrap(), Some(MetadataDocument::empty()));
    }

    #[test]
    fn ancestor_documents_are_not_clobbered() {
        let catalog = LocalCatalog::in_memory();
        catalog.write("/db", "", payload(json!({"owner": "ops"})), true).unwrap();
        catalog.touch("/db/t").unwrap();

        let db = catalog.read("/db", None).unwrap().unwrap();
        assert_eq!(db.metadata["owner"], "ops");
        assert_eq!(catalog.history("/db").unwrap().len(), 1);
    }

    #[test]
    fn patch_and_put_semantics() {
        let catalog = LocalCatalog::in_memory();
        catalog.write("/p", "profile", payload(json!({"a": 1})), true).unwrap();
        catalog.write("/p", "profile", payload(json!({"b": 2})), true).unwrap();
        assert_eq!(
            catalog.read("/p", None).unwrap().unwrap().metadata,
            payload(json!({"a": 1, "b": 2}))
        );

        catalog.write("/p", "profile", payload(json!({"c": 3})), false).unwrap();
        assert_eq!(
            catalog.read("/p", None).unwrap().unwrap().metadata,
            payload(json!({"c": 3}))
        );

        catalog.touch("/p").unwrap();
        let doc = catalog.read("/p", None).unwrap().unwrap();
        assert_eq!(doc.doc_type, "profile");
        assert_eq!(catalog.history("/p").unwrap().len(), 4);
    }

    #[test]
    fn equivalent_paths_are_the_same_entity() {
        let catalog = LocalCatalog::in_memory();
        catalog.write("a//b/./c/", "", payload(json!({"k": 1})), true).unwrap();
        assert_eq!(
            catalog.read("/a/b/c", None).unwrap(),
            catalog.read("/a/x/../b/c", None).unwrap()
        );
        assert!(catalog.read("/a/b/c", None).unwrap().is_some());
    }

    #[test]
    fn invalid_paths_are_rejected() {
        let catalog = LocalCatalog::in_memory();
        let bad = "/a?b";
        assert!(matches!(
            catalog.write(bad, "", Payload::new(), true),
            Err(CatalogError::InvalidPath { .. })
        ));
        assert!(matches!(catalog.read(bad, None), Err(CatalogError::InvalidPath { .. })));
        assert!(matches!(catalog.ls(bad, None), Err(CatalogError::InvalidPath { .. })));
        assert!(matches!(catalog.rm(bad, true), Err(CatalogError::InvalidPath { .. })));
    }

    #[test]
    fn rm_hides_path_and_keeps_history() {
        let catalog = LocalCatalog::in_memory();
        catalog.write("/x", "comment", payload(json!({"text": "t"})), true).unwrap();
        pause();
        let before_rm = Utc::now();
        pause();
        catalog.rm("/x", true).unwrap();

        assert_eq!(catalog.read("/x", None).unwrap(), None);
        assert_eq!(catalog.ls("/x", None).unwrap(), None);
        assert!(catalog.ls("/", None).unwrap().unwrap().is_empty());
        assert!(catalog.search("", None).unwrap().is_empty());

        let old = catalog.read("/x", Some(before_rm)).unwrap().unwrap();
        assert_eq!(old.metadata["text"], "t");
        assert_eq!(paths(catalog.search("", Some(before_rm)).unwrap()), vec!["/x"]);

        assert!(matches!(catalog.rm("/x", true), Err(CatalogError::NotFound(_))));
        assert!(matches!(catalog.rm("/never", true), Err(CatalogError::NotFound(_))));
    }

    #[test]
    fn rewrite_after_rm_continues_the_chain() {
        let catalog = LocalCatalog::in_memory();
        catalog.write("/x", "", payload(json!({"a": 1})), true).unwrap();
        catalog.rm("/x", false).unwrap();
        catalog.write("/x", "", payload(json!({"b": 2})), true).unwrap();

        // A patch after a tombstone starts from an empty document.
        assert_eq!(
            catalog.read("/x", None).unwrap().unwrap().metadata,
            payload(json!({"b": 2}))
        );
        let versions: Vec<u64> = catalog.history("/x").unwrap().iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn cascade_controls_descendants() {
        let catalog = LocalCatalog::in_memory();
        catalog.touch("/db/a/t1").unwrap();
        catalog.touch("/db/b/t2").unwrap();

        catalog.rm("/db/a", false).unwrap();
        assert_eq!(catalog.read("/db/a/t1", None).unwrap(), Some(MetadataDocument::empty()));
        assert_eq!(catalog.ls("/db", None).unwrap(), Some(vec!["b".to_string()]));

        catalog.rm("/db", true).unwrap();
        assert_eq!(catalog.read("/db/b/t2", None).unwrap(), None);
        assert_eq!(catalog.read("/db/a/t1", None).unwrap(), None);
        assert_eq!(catalog.ls("/", None).unwrap(), Some(vec![]));
    }

    #[test]
    fn time_travel_reads_and_listings() {
        let catalog = LocalCatalog::in_memory();
        let before = Utc::now();
        pause();
        catalog.write("/db/t", "", payload(json!({"v": 1})), true).unwrap();
        pause();
        let t1 = Utc::now();
        pause();
        catalog.write("/db/t", "", payload(json!({"v": 2})), true).unwrap();
        catalog.touch("/db/u").unwrap();

        assert_eq!(catalog.read("/db/t", Some(t1)).unwrap().unwrap().metadata["v"], 1);
        assert_eq!(catalog.read("/db/t", None).unwrap().unwrap().metadata["v"], 2);
        assert_eq!(catalog.read("/db/t", Some(before)).unwrap(), None);
        assert_eq!(catalog.ls("/db", Some(t1)).unwrap(), Some(vec!["t".to_string()]));
        assert_eq!(catalog.ls("/db", Some(before)).unwrap(), None);
        assert_eq!(catalog.ls("/", Some(before)).unwrap(), Some(vec![]));
    }

    #[test]
    fn search_by_type_field_and_text() {
        let catalog = LocalCatalog::in_memory();
        catalog
            .write(
                "/db/orders/indexes",
                "indexes",
                payload(json!({"pk": {"columns": ["id"], "unique": true}})),
                true,
            )
            .unwrap();
        catalog
            .write("/db/orders/comment", "comment", payload(json!({"text": "Customer orders"})), true)
            .unwrap();

        assert_eq!(
            paths(catalog.search("type:indexes", None).unwrap()),
            vec!["/db/orders/indexes"]
        );
        assert_eq!(
            paths(catalog.search("pk.unique=true", None).unwrap()),
            vec!["/db/orders/indexes"]
        );
        assert_eq!(
            paths(catalog.search("customer", None).unwrap()),
            vec!["/db/orders/comment"]
        );
        assert!(catalog.search("nothing-matches-this", None).unwrap().is_empty());
        assert_eq!(catalog.search("path:/db/orders", None).unwrap().len(), 3);
    }

    #[test]
    fn search_never_fails_on_odd_queries() {
        let catalog = LocalCatalog::in_memory();
        catalog.touch("/db/t").unwrap();
        catalog.touch("/dbx").unwrap();

        assert!(catalog.search("path:/a?b", None).unwrap().is_empty());
        assert!(catalog.search("path:note#1", Some(Utc::now())).unwrap().is_empty());
        assert!(catalog.search("\"unbalanced", None).unwrap().is_empty());
        assert_eq!(paths(catalog.search("path:/db", None).unwrap()), vec!["/db", "/db/t"]);
    }

    #[test]
    fn search_reflects_latest_write() {
        let catalog = LocalCatalog::in_memory();
        catalog.write("/t", "", payload(json!({"state": "draft"})), true).unwrap();
        catalog.write("/t", "", payload(json!({"state": "final"})), true).unwrap();
        assert!(catalog.search("draft", None).unwrap().is_empty());
        assert_eq!(paths(catalog.search("final", None).unwrap()), vec!["/t"]);
    }

    #[test]
    fn concurrent_patches_are_all_applied() {
        let catalog = Arc::new(LocalCatalog::in_memory());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let catalog = catalog.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        catalog
                            .write("/shared", "", payload(json!({format!("k{}_{}", t, i): i})), true)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(catalog.history("/shared").unwrap().len(), 100);
        assert_eq!(catalog.read("/shared", None).unwrap().unwrap().metadata.len(), 100);
        assert_eq!(catalog.search("k3_24", None).unwrap().len(), 1);
    }

    fn assert_tree_connected(catalog: &LocalCatalog, round: usize) {
        for (path, _) in catalog.store.live_documents(None) {
            for ancestor in path.ancestors() {
                assert!(
                    catalog.store.is_live(&ancestor, None),
                    "round {}: {} is live under removed {}",
                    round,
                    path,
                    ancestor
                );
            }
            let parent = path.parent().unwrap();
            let listed = catalog.ls(parent.as_str(), None).unwrap().unwrap();
            assert!(listed.iter().any(|name| Some(name.as_str()) == path.name()));
        }
    }

    #[test]
    fn writes_racing_a_cascading_rm_leave_no_orphans() {
        for round in 0..100 {
            let catalog = Arc::new(LocalCatalog::in_memory());
            catalog.touch("/db").unwrap();

            let mut handles: Vec<_> = (0..8)
                .map(|t| {
                    let catalog = catalog.clone();
                    thread::spawn(move || catalog.touch(&format!("/db/t{}/c", t)).unwrap())
                })
                .collect();
            let remover = catalog.clone();
            handles.push(thread::spawn(move || remover.rm("/db", true).unwrap()));
            for handle in handles {
                handle.join().unwrap();
            }

            assert_tree_connected(&catalog, round);
            let hits = paths(catalog.search("", None).unwrap());
            let live: Vec<String> = catalog
                .store
                .live_documents(None)
                .into_iter()
                .map(|(path, _)| path.to_string())
                .collect();
            assert_eq!(hits, live);
        }
    }

    #[test]
    fn reopens_from_journal() {
        let dir = tempfile::TempDir::new().unwrap();
        let db_path = dir.path().join("catalog.db");
        {
            let catalog = LocalCatalog::open(&db_path).unwrap();
            catalog.write("/db/t", "comment", payload(json!({"text": "kept"})), true).unwrap();
            catalog.touch("/db/gone").unwrap();
            catalog.rm("/db/gone", true).unwrap();
        }

        let catalog = LocalCatalog::open(&db_path).unwrap();
        assert_eq!(catalog.ls("/db", None).unwrap(), Some(vec!["t".to_string()]));
        assert_eq!(paths(catalog.search("kept", None).unwrap()), vec!["/db/t"]);
        let stats = catalog.stats();
        assert_eq!(stats.store.paths, 3);
        assert_eq!(stats.search.indexed_documents, 2);
    }
}
