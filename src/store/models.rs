use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::MetadataDocument;

/// One immutable version of the document at a path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionedRecord {
    /// 1-based, strictly increasing per path.
    pub version: u64,
    pub document: MetadataDocument,
    pub created_at: DateTime<Utc>,
    /// Marks the path as removed from `created_at` onward.
    #[serde(default)]
    pub tombstone: bool,
}

/// Ordered version history of a single path.
///
/// Records are appended with non-decreasing `created_at`, so lookups by time
/// can binary search.
#[derive(Debug, Default)]
pub struct PathHistory {
    records: Vec<VersionedRecord>,
}

impl PathHistory {
    pub fn latest(&self) -> Option<&VersionedRecord> {
        self.records.last()
    }

    /// Latest record created at or before `at` (or the latest overall for `None`).
    pub fn at(&self, at: Option<DateTime<Utc>>) -> Option<&VersionedRecord> {
        match at {
            None => self.latest(),
            Some(at) => {
                let idx = self.records.partition_point(|r| r.created_at <= at);
                idx.checked_sub(1).map(|i| &self.records[i])
            }
        }
    }

    /// Like [`PathHistory::at`], but `None` when the selected record is a tombstone.
    pub fn live_at(&self, at: Option<DateTime<Utc>>) -> Option<&VersionedRecord> {
        self.at(at).filter(|r| !r.tombstone)
    }

    /// Builds the record that would follow the current latest one.
    ///
    /// `created_at` is truncated to microseconds, the precision of the journal
    /// and the wire format, and clamped so that it never goes backwards.
    pub fn next_record(
        &self,
        document: MetadataDocument,
        tombstone: bool,
        at: DateTime<Utc>,
    ) -> VersionedRecord {
        let at = at.trunc_subsecs(6);
        let (version, created_at) = match self.latest() {
            Some(last) => (last.version + 1, at.max(last.created_at)),
            None => (1, at),
        };
        VersionedRecord {
            version,
            document,
            created_at,
            tombstone,
        }
    }

    pub fn push(&mut self, record: VersionedRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[VersionedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Counters reported on the status endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub paths: usize,
    pub live_paths: usize,
    pub records: usize,
}
