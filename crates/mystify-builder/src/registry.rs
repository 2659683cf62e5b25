//! Source document registry.
//!
//! Discovers source documents under the source directory and answers the
//! questions the staleness check needs: which documents exist now, which
//! ones the previous build already knew, and where each one lives.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::docname::DocumentId;
use crate::environment::BuildEnvironment;

/// Read access to the set of source documents.
pub trait DocumentRegistry: Sync {
    /// Every document present in the source tree right now.
    fn found_docs(&self) -> &BTreeSet<DocumentId>;

    /// Whether the previous build already knew this document.
    fn is_known(&self, id: &DocumentId) -> bool;

    /// Source file of a document.
    fn doc2path(&self, id: &DocumentId) -> PathBuf;
}

/// Errors that can occur during discovery.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Source directory not found: {0}")]
    SourceDirNotFound(String),
}

/// Registry backed by a directory walk.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    source_dir: PathBuf,
    default_suffix: String,
    found: BTreeSet<DocumentId>,
    paths: BTreeMap<DocumentId, PathBuf>,
    known: BTreeSet<DocumentId>,
}

impl SourceRegistry {
    /// Walk `source_dir` for files ending in one of `suffixes`.
    ///
    /// Hidden entries and anything under `exclude` are skipped. When two
    /// files map to the same identifier, the suffix listed first wins.
    pub fn discover(
        source_dir: &Path,
        suffixes: &[String],
        exclude: &[PathBuf],
        env: &BuildEnvironment,
    ) -> Result<Self, RegistryError> {
        if !source_dir.is_dir() {
            return Err(RegistryError::SourceDirNotFound(
                source_dir.display().to_string(),
            ));
        }

        // Compare canonical paths so `.` and `./_build` line up with exclusions
        let root = source_dir
            .canonicalize()
            .unwrap_or_else(|_| source_dir.to_path_buf());
        let exclude: Vec<PathBuf> = exclude
            .iter()
            .filter_map(|dir| dir.canonicalize().ok())
            .collect();

        // (suffix rank, path) per identifier
        let mut candidates: BTreeMap<DocumentId, (usize, PathBuf)> = BTreeMap::new();

        let walker = WalkDir::new(&root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !(is_hidden(e.path()) || is_excluded(e.path(), &exclude))
            });

        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&root).unwrap_or(path);

            for (rank, suffix) in suffixes.iter().enumerate() {
                let Some(id) = DocumentId::from_relative_path(relative, suffix) else {
                    continue;
                };

                match candidates.get(&id) {
                    Some((existing, other)) if *existing <= rank => {
                        tracing::warn!(
                            "Multiple files found for document \"{}\": {}, using {}",
                            id,
                            path.display(),
                            other.display()
                        );
                    }
                    Some((_, other)) => {
                        tracing::warn!(
                            "Multiple files found for document \"{}\": {}, using {}",
                            id,
                            other.display(),
                            path.display()
                        );
                        candidates.insert(id, (rank, path.to_path_buf()));
                    }
                    None => {
                        candidates.insert(id, (rank, path.to_path_buf()));
                    }
                }
                break;
            }
        }

        let paths: BTreeMap<DocumentId, PathBuf> = candidates
            .into_iter()
            .map(|(id, (_, path))| (id, path))
            .collect();

        tracing::debug!(
            "Found {} documents in {}",
            paths.len(),
            source_dir.display()
        );

        Ok(Self {
            source_dir: root,
            default_suffix: suffixes.first().cloned().unwrap_or_default(),
            found: paths.keys().cloned().collect(),
            paths,
            known: env.all_docs.clone(),
        })
    }
}

impl DocumentRegistry for SourceRegistry {
    fn found_docs(&self) -> &BTreeSet<DocumentId> {
        &self.found
    }

    fn is_known(&self, id: &DocumentId) -> bool {
        self.known.contains(id)
    }

    fn doc2path(&self, id: &DocumentId) -> PathBuf {
        match self.paths.get(id) {
            Some(path) => path.clone(),
            None => {
                let mut path = self.source_dir.join(id.to_path()).into_os_string();
                path.push(&self.default_suffix);
                PathBuf::from(path)
            }
        }
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn is_excluded(path: &Path, exclude: &[PathBuf]) -> bool {
    exclude.iter().any(|dir| path.starts_with(dir))
}
