use thiserror::Error;

/// Errors surfaced by catalog operations.
///
/// A missing document or listing is not an error: `read` and `ls` return
/// `Ok(None)`. `NotFound` is only produced by operations that need an existing
/// entry to act on, like `rm`.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Conflicting write on {path}: version {version} already exists")]
    Conflict { path: String, version: u64 },

    #[error("Upstream error (status {status:?}): {body}")]
    Upstream { status: Option<u16>, body: String },

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl CatalogError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::InvalidPath { .. } => "invalid_path",
            CatalogError::NotFound(_) => "not_found",
            CatalogError::Conflict { .. } => "conflict",
            CatalogError::Upstream { .. } => "upstream",
            CatalogError::Storage(_) => "storage",
        }
    }
}
