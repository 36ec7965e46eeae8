//! Metadata Catalog Server Library
//!
//! Versioned, path-addressed metadata store plus the HTTP protocol that exposes it.
//! The library is shared by the server binary, the command line client and the tests.

pub mod analyzer;
pub mod catalog;
pub mod client;
pub mod config;
pub mod search;
pub mod server;
pub mod sqlite_persistence;
pub mod store;

// Re-export commonly used types for convenience
pub use catalog::{
    CatalogError, CatalogPath, CatalogService, LocalCatalog, MetadataDocument, Payload, SearchHit,
};
pub use client::RemoteCatalog;
pub use server::{run_server, RequestsLoggingLevel};
pub use store::{SqliteRecordJournal, VersionedDocumentStore, VersionedRecord};
