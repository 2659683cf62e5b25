//! Document identifiers.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Stable identifier of one source document: its path relative to the
/// source directory, `/`-separated, without the source suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive an identifier from a path relative to the source directory.
    ///
    /// Returns `None` when the file name does not end with `suffix` or the
    /// path is not a plain relative path.
    pub fn from_relative_path(relative: &Path, suffix: &str) -> Option<Self> {
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?),
                Component::CurDir => {}
                _ => return None,
            }
        }

        let file_name = parts.pop()?;
        let stem = file_name.strip_suffix(suffix).filter(|s| !s.is_empty())?;
        parts.push(stem);

        Some(Self(parts.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Translate `/` separators into a platform path.
    pub fn to_path(&self) -> PathBuf {
        self.0.split('/').collect()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_from_nested_paths() {
        let id = DocumentId::from_relative_path(Path::new("guide/install.md"), ".md").unwrap();

        assert_eq!(id.as_str(), "guide/install");
        assert_eq!(id.to_path(), Path::new("guide").join("install"));
    }

    #[test]
    fn rejects_foreign_suffixes_and_escapes() {
        assert_eq!(
            DocumentId::from_relative_path(Path::new("conf.py"), ".md"),
            None
        );
        assert_eq!(DocumentId::from_relative_path(Path::new(".md"), ".md"), None);
        assert_eq!(
            DocumentId::from_relative_path(Path::new("../outside.md"), ".md"),
            None
        );
    }
}
