//! Analyzer feeds: external producers of metadata documents.
//!
//! An analyzer computes a typed document for a path and hands it to
//! [`CatalogService::write`] as a patch. Analyzers report "could not determine
//! metadata" as `None` and never fail for expected absence.
//!
//! Each document is written as a section keyed by its type tag, so a path
//! analyzed by several feeds keeps every feed's output side by side. Use
//! [`TypedDocument::section_of`] to read one back.

mod snapshot;
mod typed;

pub use snapshot::{load_snapshot, snapshot_feeds, SnapshotFeed};
pub use typed::TypedDocument;

use tracing::{debug, info};

use crate::catalog::{CatalogError, CatalogPath, CatalogService};

/// A producer of metadata for catalog paths.
pub trait AnalyzerFeed: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// The document for `path`, or `None` if nothing could be determined.
    fn analyze(&self, path: &CatalogPath) -> Option<TypedDocument>;
}

/// Outcome of [`run_feeds`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedReport {
    pub written: usize,
    pub skipped: usize,
}

/// Runs every feed against every path, patching produced documents into
/// `catalog`.
///
/// Stops at the first write error. Documents written before the failure stay
/// written.
pub fn run_feeds(
    catalog: &dyn CatalogService,
    feeds: &[&dyn AnalyzerFeed],
    paths: &[CatalogPath],
) -> Result<FeedReport, CatalogError> {
    let mut report = FeedReport::default();
    for path in paths {
        for feed in feeds {
            let Some(document) = feed.analyze(path) else {
                debug!("{}: nothing for {}", feed.name(), path);
                report.skipped += 1;
                continue;
            };
            let document = document
                .into_document()
                .map_err(|err| CatalogError::Storage(err.into()))?
                .into_section();
            catalog.write(path.as_str(), &document.doc_type, document.metadata, true)?;
            report.written += 1;
        }
    }
    info!(
        "Analyzer run done: {} written, {} skipped",
        report.written, report.skipped
    );
    Ok(report)
}
