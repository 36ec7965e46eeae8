//! Patch and put write semantics.

use super::document::MetadataDocument;

/// How a write combines with the document already stored at a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// Shallow merge into the existing payload.
    Patch,
    /// Replace the existing payload.
    Put,
}

impl WriteMode {
    pub fn from_patch_flag(patch: bool) -> Self {
        if patch {
            WriteMode::Patch
        } else {
            WriteMode::Put
        }
    }

    pub fn resolve(
        self,
        existing: Option<&MetadataDocument>,
        update: MetadataDocument,
    ) -> MetadataDocument {
        match self {
            WriteMode::Patch => patch(existing, update),
            WriteMode::Put => put(update),
        }
    }
}

/// Shallow key union of `existing` and `update`; keys in `update` win.
///
/// An empty type tag in `update` keeps the existing tag, so touching a typed
/// document does not erase its type.
pub fn patch(existing: Option<&MetadataDocument>, update: MetadataDocument) -> MetadataDocument {
    let Some(existing) = existing else {
        return update;
    };

    let mut metadata = existing.metadata.clone();
    for (key, value) in update.metadata {
        metadata.insert(key, value);
    }

    let doc_type = if update.doc_type.is_empty() {
        existing.doc_type.clone()
    } else {
        update.doc_type
    };

    MetadataDocument { doc_type, metadata }
}

pub fn put(update: MetadataDocument) -> MetadataDocument {
    update
}
