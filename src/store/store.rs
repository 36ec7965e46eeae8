//! In-memory versioned document store.
//!
//! Every path owns an append-only [`PathHistory`] behind its own lock. The map
//! from path to history has a separate lock that is only held long enough to
//! find or insert an entry, so writers on different paths never wait on each
//! other and readers never wait on writers of other paths.
//!
//! A third lock guards the shape of the tree. Writers hold it shared while they
//! revive ancestors and append; a removal holds it exclusively, so a cascade
//! never races with a write below the removed path.

use super::journal::RecordJournal;
use super::models::{PathHistory, StoreStats, VersionedRecord};
use crate::catalog::{CatalogError, CatalogPath, MetadataDocument};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

type SharedHistory = Arc<RwLock<PathHistory>>;

#[derive(Clone)]
struct PathEntry {
    path: CatalogPath,
    history: SharedHistory,
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Records appended by [`VersionedDocumentStore::update_in_tree`].
#[derive(Clone, Debug)]
pub struct TreeUpdate {
    /// Empty documents appended to ancestors that were not live.
    pub revived: Vec<(CatalogPath, VersionedRecord)>,
    pub record: VersionedRecord,
}

pub struct VersionedDocumentStore {
    entries: RwLock<BTreeMap<String, PathEntry>>,
    tree: RwLock<()>,
    journal: Option<Arc<dyn RecordJournal>>,
}

impl Default for VersionedDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionedDocumentStore {
    /// A store that keeps records in memory only.
    pub fn new() -> Self {
        VersionedDocumentStore {
            entries: RwLock::new(BTreeMap::new()),
            tree: RwLock::new(()),
            journal: None,
        }
    }

    /// A store backed by `journal`. Existing records are replayed before returning.
    pub fn open(journal: Arc<dyn RecordJournal>) -> Result<Self, CatalogError> {
        let records = journal.load()?;
        let count = records.len();

        let mut entries: BTreeMap<String, PathEntry> = BTreeMap::new();
        for (path, record) in records {
            let entry = entries
                .entry(path.as_str().to_string())
                .or_insert_with(|| PathEntry {
                    path: path.clone(),
                    history: Arc::default(),
                });
            write_lock(&entry.history).push(record);
        }
        info!(
            "Replayed {} catalog records over {} paths",
            count,
            entries.len()
        );

        Ok(VersionedDocumentStore {
            entries: RwLock::new(entries),
            tree: RwLock::new(()),
            journal: Some(journal),
        })
    }

    fn entry(&self, path: &CatalogPath) -> Option<SharedHistory> {
        read_lock(&self.entries)
            .get(path.as_str())
            .map(|e| e.history.clone())
    }

    fn entry_or_create(&self, path: &CatalogPath) -> SharedHistory {
        if let Some(history) = self.entry(path) {
            return history;
        }
        write_lock(&self.entries)
            .entry(path.as_str().to_string())
            .or_insert_with(|| PathEntry {
                path: path.clone(),
                history: Arc::default(),
            })
            .history
            .clone()
    }

    /// Entries for `path` (if present) and, when `with_descendants` is set,
    /// every path below it, in key order.
    fn subtree(&self, path: &CatalogPath, with_descendants: bool) -> Vec<PathEntry> {
        let entries = read_lock(&self.entries);
        let mut out: Vec<PathEntry> = entries.get(path.as_str()).cloned().into_iter().collect();
        if with_descendants {
            let prefix = path.descendant_prefix();
            out.extend(
                entries
                    .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
                    .take_while(|(key, _)| key.starts_with(&prefix))
                    .filter(|(key, _)| key.as_str() != path.as_str())
                    .map(|(_, entry)| entry.clone()),
            );
        }
        out
    }

    fn journal_append(&self, path: &CatalogPath, record: &VersionedRecord) -> Result<(), CatalogError> {
        match &self.journal {
            Some(journal) => journal.append(path, record),
            None => Ok(()),
        }
    }

    /// Appends a new version of `path`.
    pub fn append(
        &self,
        path: &CatalogPath,
        document: MetadataDocument,
        tombstone: bool,
        at: DateTime<Utc>,
    ) -> Result<VersionedRecord, CatalogError> {
        self.update(path, at, move |_| (document, tombstone))
    }

    /// Atomically derives and appends the next version of `path`.
    ///
    /// `f` receives the current latest record (live or not) and returns the new
    /// document and tombstone flag. No other writer can append to `path` between
    /// the read and the append.
    pub fn update<F>(
        &self,
        path: &CatalogPath,
        at: DateTime<Utc>,
        f: F,
    ) -> Result<VersionedRecord, CatalogError>
    where
        F: FnOnce(Option<&VersionedRecord>) -> (MetadataDocument, bool),
    {
        let _tree = read_lock(&self.tree);
        self.update_unguarded(path, at, f)
    }

    /// Like [`update`](Self::update), but first appends an empty document to
    /// every ancestor of `path` that is not live.
    ///
    /// Removals wait until the whole write is done, so once this returns every
    /// ancestor of `path` is live for as long as `path` is.
    pub fn update_in_tree<F>(
        &self,
        path: &CatalogPath,
        at: DateTime<Utc>,
        f: F,
    ) -> Result<TreeUpdate, CatalogError>
    where
        F: FnOnce(Option<&VersionedRecord>) -> (MetadataDocument, bool),
    {
        let _tree = read_lock(&self.tree);
        let mut revived = Vec::new();
        for ancestor in path.ancestors() {
            if let Some(record) = self.ensure_live_unguarded(&ancestor, at)? {
                revived.push((ancestor, record));
            }
        }
        let record = self.update_unguarded(path, at, f)?;
        Ok(TreeUpdate { revived, record })
    }

    fn update_unguarded<F>(
        &self,
        path: &CatalogPath,
        at: DateTime<Utc>,
        f: F,
    ) -> Result<VersionedRecord, CatalogError>
    where
        F: FnOnce(Option<&VersionedRecord>) -> (MetadataDocument, bool),
    {
        let history = self.entry_or_create(path);
        let mut history = write_lock(&history);
        let (document, tombstone) = f(history.latest());
        let record = history.next_record(document, tombstone, at);
        self.journal_append(path, &record)?;
        history.push(record.clone());
        debug!(
            "Appended {} v{}{}",
            path,
            record.version,
            if record.tombstone { " (tombstone)" } else { "" }
        );
        Ok(record)
    }

    /// Appends an empty document to `path` unless it is already live.
    ///
    /// Returns the appended record, or `None` when nothing was written.
    pub fn ensure_live(
        &self,
        path: &CatalogPath,
        at: DateTime<Utc>,
    ) -> Result<Option<VersionedRecord>, CatalogError> {
        let _tree = read_lock(&self.tree);
        self.ensure_live_unguarded(path, at)
    }

    fn ensure_live_unguarded(
        &self,
        path: &CatalogPath,
        at: DateTime<Utc>,
    ) -> Result<Option<VersionedRecord>, CatalogError> {
        let history = self.entry_or_create(path);
        let mut history = write_lock(&history);
        if history.live_at(None).is_some() {
            return Ok(None);
        }
        let record = history.next_record(MetadataDocument::empty(), false, at);
        self.journal_append(path, &record)?;
        history.push(record.clone());
        debug!("Created {} v{}", path, record.version);
        Ok(Some(record))
    }

    /// The record of `path` selected by `at`, tombstones included.
    pub fn get(&self, path: &CatalogPath, at: Option<DateTime<Utc>>) -> Option<VersionedRecord> {
        let history = self.entry(path)?;
        let history = read_lock(&history);
        history.at(at).cloned()
    }

    /// The live record of `path` at `at`.
    pub fn get_live(&self, path: &CatalogPath, at: Option<DateTime<Utc>>) -> Option<VersionedRecord> {
        self.get(path, at).filter(|r| !r.tombstone)
    }

    /// Whether `path` is live at `at`. The root is always live.
    pub fn is_live(&self, path: &CatalogPath, at: Option<DateTime<Utc>>) -> bool {
        path.is_root() || self.get_live(path, at).is_some()
    }

    /// Full history of `path`, oldest first.
    pub fn history(&self, path: &CatalogPath) -> Vec<VersionedRecord> {
        match self.entry(path) {
            Some(history) => read_lock(&history).records().to_vec(),
            None => Vec::new(),
        }
    }

    /// Names of the direct children of `path` that are live at `at`.
    pub fn children(&self, path: &CatalogPath, at: Option<DateTime<Utc>>) -> BTreeSet<String> {
        let candidates: Vec<(String, SharedHistory)> = self
            .subtree(path, true)
            .into_iter()
            .filter_map(|entry| {
                let name = entry.path.child_name_of(path)?.to_string();
                Some((name, entry.history))
            })
            .collect();

        candidates
            .into_iter()
            .filter(|(_, history)| read_lock(history).live_at(at).is_some())
            .map(|(name, _)| name)
            .collect()
    }

    /// Tombstones `path`, plus every live descendant when `cascade` is set.
    ///
    /// All affected paths are locked in key order and tombstoned with a single
    /// instant, so no reader at any time sees a live descendant under a removed
    /// parent. Writers are held off for the whole removal. Returns the
    /// tombstone records that were appended.
    pub fn remove(
        &self,
        path: &CatalogPath,
        cascade: bool,
        at: DateTime<Utc>,
    ) -> Result<Vec<(CatalogPath, VersionedRecord)>, CatalogError> {
        let _tree = write_lock(&self.tree);
        let targets = self.subtree(path, cascade);
        let mut guards: Vec<(&CatalogPath, RwLockWriteGuard<'_, PathHistory>)> = targets
            .iter()
            .map(|entry| (&entry.path, write_lock(&entry.history)))
            .collect();

        let target_live = path.is_root()
            || guards
                .first()
                .is_some_and(|(p, history)| *p == path && history.live_at(None).is_some());
        if !target_live {
            return Err(CatalogError::NotFound(path.to_string()));
        }

        let instant = guards
            .iter()
            .filter_map(|(_, history)| history.latest().map(|r| r.created_at))
            .fold(at, |acc, t| acc.max(t));

        let mut removed = Vec::new();
        for (entry_path, history) in guards.iter_mut() {
            if history.live_at(None).is_none() {
                continue;
            }
            let record = history.next_record(MetadataDocument::empty(), true, instant);
            self.journal_append(*entry_path, &record)?;
            history.push(record.clone());
            removed.push(((*entry_path).clone(), record));
        }
        debug!("Removed {} ({} tombstones)", path, removed.len());
        Ok(removed)
    }

    /// Every path live at `at` with its selected record, in path order.
    pub fn live_documents(&self, at: Option<DateTime<Utc>>) -> Vec<(CatalogPath, VersionedRecord)> {
        let entries: Vec<PathEntry> = read_lock(&self.entries).values().cloned().collect();
        entries
            .into_iter()
            .filter_map(|entry| {
                let record = read_lock(&entry.history).live_at(at).cloned()?;
                Some((entry.path, record))
            })
            .collect()
    }

    pub fn stats(&self) -> StoreStats {
        let entries: Vec<SharedHistory> = read_lock(&self.entries)
            .values()
            .map(|e| e.history.clone())
            .collect();
        let mut stats = StoreStats {
            paths: entries.len(),
            ..Default::default()
        };
        for history in entries {
            let history = read_lock(&history);
            stats.records += history.len();
            if history.live_at(None).is_some() {
                stats.live_paths += 1;
            }
        }
        stats
    }
}
