//! Versioned document storage.
//!
//! [`VersionedDocumentStore`] keeps the full history of every path in memory
//! and can mirror each append into a [`RecordJournal`] for durability.

mod journal;
mod models;
mod schema;
#[allow(clippy::module_inception)]
mod store;

pub use journal::{RecordJournal, SqliteRecordJournal};
pub use models::{PathHistory, StoreStats, VersionedRecord};
pub use store::{TreeUpdate, VersionedDocumentStore};
