//! Hierarchical catalog paths.
//!
//! Every path entering the catalog goes through [`CatalogPath::normalize`], so two
//! inputs that resolve to the same POSIX path always address the same entry.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::CatalogError;

/// Maximum length of a single path segment, in bytes.
pub const MAX_SEGMENT_LEN: usize = 4096;

/// Maximum length of a normalized path, in bytes.
pub const MAX_PATH_LEN: usize = 65535;

const SEPARATOR: char = '/';

/// A normalized, absolute, POSIX-style catalog path.
///
/// The inner string always starts with `/`, never ends with `/` (except the root),
/// and never contains empty, `.` or `..` segments.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CatalogPath(String);

impl CatalogPath {
    /// The root path, `/`.
    pub fn root() -> Self {
        CatalogPath(SEPARATOR.to_string())
    }

    /// Normalizes a raw path.
    ///
    /// Relative inputs are rooted at `/`, `.` segments are dropped, `..` pops the
    /// previous segment (and is clamped at the root), repeated separators collapse
    /// and trailing separators are removed.
    pub fn normalize(raw: &str) -> Result<Self, CatalogError> {
        if let Some(bad) = raw.chars().find(|c| is_forbidden_char(*c)) {
            return Err(CatalogError::InvalidPath {
                path: raw.to_string(),
                reason: format!("forbidden character {:?}", bad),
            });
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split(SEPARATOR) {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => {
                    if other.len() > MAX_SEGMENT_LEN {
                        return Err(CatalogError::InvalidPath {
                            path: raw.to_string(),
                            reason: format!("segment longer than {} bytes", MAX_SEGMENT_LEN),
                        });
                    }
                    segments.push(other);
                }
            }
        }

        let normalized = format!("{}{}", SEPARATOR, segments.join("/"));
        if normalized.len() > MAX_PATH_LEN {
            return Err(CatalogError::InvalidPath {
                path: raw.to_string(),
                reason: format!("path longer than {} bytes", MAX_PATH_LEN),
            });
        }
        Ok(CatalogPath(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Path segments, root-most first. Empty for the root.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|s| !s.is_empty())
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Last segment, `None` for the root.
    pub fn name(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            self.0.rsplit(SEPARATOR).next()
        }
    }

    /// Parent path, `None` for the root.
    pub fn parent(&self) -> Option<CatalogPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(SEPARATOR) {
            Some(0) | None => Some(Self::root()),
            Some(idx) => Some(CatalogPath(self.0[..idx].to_string())),
        }
    }

    /// Appends a single segment. The segment is normalized together with the
    /// current path, so `join("..")` behaves like `parent()`.
    pub fn join(&self, segment: &str) -> Result<CatalogPath, CatalogError> {
        Self::normalize(&format!("{}/{}", self.0, segment))
    }

    /// All proper ancestors except the root, root-most first.
    pub fn ancestors(&self) -> Vec<CatalogPath> {
        let mut ancestors = Vec::new();
        let mut current = self.parent();
        while let Some(path) = current {
            if path.is_root() {
                break;
            }
            current = path.parent();
            ancestors.push(path);
        }
        ancestors.reverse();
        ancestors
    }

    /// True if `self` is strictly below `other`.
    pub fn is_descendant_of(&self, other: &CatalogPath) -> bool {
        if self == other {
            return false;
        }
        if other.is_root() {
            return true;
        }
        self.0.starts_with(&other.0) && self.0[other.0.len()..].starts_with(SEPARATOR)
    }

    /// Prefix shared by every descendant key, used for ordered range scans.
    pub(crate) fn descendant_prefix(&self) -> String {
        if self.is_root() {
            self.0.clone()
        } else {
            format!("{}{}", self.0, SEPARATOR)
        }
    }

    /// If `self` is a direct child of `parent`, returns its segment name.
    pub fn child_name_of(&self, parent: &CatalogPath) -> Option<&str> {
        if !self.is_descendant_of(parent) {
            return None;
        }
        let rest = &self.0[parent.descendant_prefix().len()..];
        if rest.contains(SEPARATOR) {
            None
        } else {
            Some(rest)
        }
    }
}

fn is_forbidden_char(c: char) -> bool {
    c.is_control() || c == '?' || c == '#'
}

impl fmt::Display for CatalogPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CatalogPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CatalogPath {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CatalogPath::normalize(&value)
    }
}

impl From<CatalogPath> for String {
    fn from(value: CatalogPath) -> Self {
        value.0
    }
}

impl std::str::FromStr for CatalogPath {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CatalogPath::normalize(s)
    }
}
