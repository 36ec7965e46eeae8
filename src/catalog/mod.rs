//! Catalog domain: paths, documents, write semantics and the service interface.

mod document;
mod error;
mod merge;
mod path;
mod service;
mod trait_def;

pub use document::{ColumnProfile, DocumentKind, IndexInfo, MetadataDocument, Payload, UserAccess};
pub use error::CatalogError;
pub use merge::WriteMode;
pub use path::{CatalogPath, MAX_PATH_LEN, MAX_SEGMENT_LEN};
pub use service::{CatalogStats, LocalCatalog};
pub use trait_def::{CatalogService, SearchHit};
