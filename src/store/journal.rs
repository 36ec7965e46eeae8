//! Durable record journal.
//!
//! The in-memory store stays the source of truth for reads; the journal only
//! receives appends and is replayed once on startup.

use super::models::VersionedRecord;
use super::schema::JOURNAL_VERSIONED_SCHEMAS;
use crate::catalog::{CatalogError, CatalogPath, MetadataDocument, Payload};
use crate::sqlite_persistence::open_versioned;
use anyhow::{anyhow, Context};
use chrono::DateTime;
use rusqlite::{params, Connection, ErrorCode};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Append-only sink for records.
pub trait RecordJournal: Send + Sync {
    /// Persists `record`. Fails with `Conflict` if `(path, version)` already exists.
    fn append(&self, path: &CatalogPath, record: &VersionedRecord) -> Result<(), CatalogError>;

    /// Every persisted record, ordered by path then version.
    fn load(&self) -> Result<Vec<(CatalogPath, VersionedRecord)>, CatalogError>;
}

pub struct SqliteRecordJournal {
    conn: Mutex<Connection>,
}

impl SqliteRecordJournal {
    pub fn open<P: AsRef<Path>>(db_path: P) -> anyhow::Result<Self> {
        let db_path = db_path.as_ref();
        let mut conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open catalog database {:?}", db_path))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        open_versioned(&mut conn, JOURNAL_VERSIONED_SCHEMAS, "catalog")?;
        info!("Opened catalog journal at {:?}", db_path);
        Ok(SqliteRecordJournal {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        open_versioned(&mut conn, JOURNAL_VERSIONED_SCHEMAS, "catalog")?;
        Ok(SqliteRecordJournal {
            conn: Mutex::new(conn),
        })
    }
}

impl RecordJournal for SqliteRecordJournal {
    fn append(&self, path: &CatalogPath, record: &VersionedRecord) -> Result<(), CatalogError> {
        let metadata = serde_json::to_string(&record.document.metadata)
            .context("Failed to serialize metadata")?;
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let result = conn.execute(
            "INSERT INTO catalog_records (path, version, doc_type, metadata, created_at_us, tombstone)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                path.as_str(),
                record.version as i64,
                record.document.doc_type,
                metadata,
                record.created_at.timestamp_micros(),
                record.tombstone,
            ],
        );
        match result {
            Ok(_) => {
                debug!("Journaled {} v{}", path, record.version);
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
                Err(CatalogError::Conflict {
                    path: path.to_string(),
                    version: record.version,
                })
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to journal {} v{}", path, record.version))
                .into()),
        }
    }

    fn load(&self) -> Result<Vec<(CatalogPath, VersionedRecord)>, CatalogError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt = conn
            .prepare(
                "SELECT path, version, doc_type, metadata, created_at_us, tombstone
                 FROM catalog_records ORDER BY path, version",
            )
            .context("Failed to prepare journal scan")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, bool>(5)?,
                ))
            })
            .context("Failed to scan journal")?;

        let mut records = Vec::new();
        for row in rows {
            let (path, version, doc_type, metadata, created_at_us, tombstone) =
                row.context("Failed to read journal row")?;
            let path = CatalogPath::normalize(&path)?;
            let metadata: Payload = serde_json::from_str(&metadata)
                .with_context(|| format!("Corrupt metadata for {} v{}", path, version))?;
            let created_at = DateTime::from_timestamp_micros(created_at_us)
                .ok_or_else(|| anyhow!("Invalid timestamp {} for {}", created_at_us, path))?;
            records.push((
                path,
                VersionedRecord {
                    version: version as u64,
                    document: MetadataDocument::new(doc_type, metadata),
                    created_at,
                    tombstone,
                },
            ));
        }
        Ok(records)
    }
}
