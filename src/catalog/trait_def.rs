//! CatalogService trait definition.
//!
//! This trait abstracts catalog operations so that tools can work against the
//! in-process `LocalCatalog` or a remote server through `RemoteCatalog`
//! transparently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CatalogError, CatalogPath, MetadataDocument, Payload};

/// A single search match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub path: CatalogPath,
    pub document: MetadataDocument,
}

/// Trait for catalog backends.
///
/// Paths are raw strings; every implementation normalizes them before use and
/// fails with `InvalidPath` when normalization fails. Optional `at` arguments
/// select a point in time; `None` means "now".
pub trait CatalogService: Send + Sync {
    /// Create `path` with an empty document if absent, otherwise bump its version.
    fn touch(&self, path: &str) -> Result<(), CatalogError> {
        self.write(path, "", Payload::new(), true)
    }

    /// Write metadata at `path`, merging into the current document when `patch`
    /// is set and replacing it otherwise.
    fn write(
        &self,
        path: &str,
        doc_type: &str,
        metadata: Payload,
        patch: bool,
    ) -> Result<(), CatalogError>;

    /// Tombstone `path`, and every live descendant when `cascade` is set.
    /// Fails with `NotFound` if `path` is not live.
    fn rm(&self, path: &str, cascade: bool) -> Result<(), CatalogError>;

    /// Names of the live direct children of `path`, or `None` if `path` is absent.
    fn ls(
        &self,
        path: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<Vec<String>>, CatalogError>;

    /// The document live at `path`, or `None`.
    fn read(
        &self,
        path: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<MetadataDocument>, CatalogError>;

    /// Documents matching `query`, ordered by path.
    fn search(
        &self,
        query: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Vec<SearchHit>, CatalogError>;
}

/// Implement CatalogService for Arc<T> to allow sharing a backend between
/// request handlers and background tasks.
impl<T: CatalogService + ?Sized> CatalogService for std::sync::Arc<T> {
    fn touch(&self, path: &str) -> Result<(), CatalogError> {
        (**self).touch(path)
    }

    fn write(
        &self,
        path: &str,
        doc_type: &str,
        metadata: Payload,
        patch: bool,
    ) -> Result<(), CatalogError> {
        (**self).write(path, doc_type, metadata, patch)
    }

    fn rm(&self, path: &str, cascade: bool) -> Result<(), CatalogError> {
        (**self).rm(path, cascade)
    }

    fn ls(
        &self,
        path: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<Vec<String>>, CatalogError> {
        (**self).ls(path, at)
    }

    fn read(
        &self,
        path: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<MetadataDocument>, CatalogError> {
        (**self).read(path, at)
    }

    fn search(
        &self,
        query: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Vec<SearchHit>, CatalogError> {
        (**self).search(query, at)
    }
}
