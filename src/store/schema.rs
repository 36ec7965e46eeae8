//! SQLite schema for the catalog record journal.

use crate::sqlite_column;
use crate::sqlite_persistence::{SqlType, Table, VersionedSchema};

/// One row per record. `created_at_us` is microseconds since the Unix epoch.
const CATALOG_RECORDS_TABLE: Table = Table {
    name: "catalog_records",
    columns: &[
        sqlite_column!("rowid", SqlType::Integer, is_primary_key = true),
        sqlite_column!("path", SqlType::Text, non_null = true),
        sqlite_column!("version", SqlType::Integer, non_null = true),
        sqlite_column!("doc_type", SqlType::Text, non_null = true, default_value = Some("''")),
        sqlite_column!("metadata", SqlType::Text, non_null = true), // JSON object
        sqlite_column!("created_at_us", SqlType::Integer, non_null = true),
        sqlite_column!("tombstone", SqlType::Integer, non_null = true, default_value = Some("0")),
    ],
    indices: &[("idx_catalog_records_path", "path")],
    unique_constraints: &[&["path", "version"]],
};

pub const JOURNAL_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[CATALOG_RECORDS_TABLE],
    migration: None,
}];
