//! Build state persisted between runs.
//!
//! The only thing carried from one build to the next is the set of documents
//! the previous build knew about. A document missing from that set is new and
//! always gets written, whatever its timestamps say.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::docname::DocumentId;

/// Bumped whenever the on-disk layout changes; older files are discarded.
const ENV_VERSION: u32 = 1;

/// Directory under the output dir holding builder state.
const STATE_DIR: &str = ".mystify";

const ENV_FILE: &str = "environment.json";

/// Documents known to the previous build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEnvironment {
    version: u32,

    /// Every document found by the last completed build
    pub all_docs: BTreeSet<DocumentId>,
}

impl Default for BuildEnvironment {
    fn default() -> Self {
        Self {
            version: ENV_VERSION,
            all_docs: BTreeSet::new(),
        }
    }
}

/// Errors that can occur when saving the environment.
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("Failed to write build environment {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize build environment: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl BuildEnvironment {
    /// Location of the environment file for an output directory.
    pub fn path(output_dir: &Path) -> PathBuf {
        output_dir.join(STATE_DIR).join(ENV_FILE)
    }

    /// Load the environment, falling back to an empty one.
    ///
    /// An empty environment marks every document as new, so a missing or
    /// damaged file only costs a full rebuild.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No build environment at {}", path.display());
                return Self::default();
            }
            Err(e) => {
                tracing::warn!("Failed to read build environment {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str::<Self>(&content) {
            Ok(env) if env.version == ENV_VERSION => env,
            Ok(env) => {
                tracing::info!(
                    "Build environment version {} is outdated, rebuilding everything",
                    env.version
                );
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Ignoring corrupt build environment {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), EnvironmentError> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| EnvironmentError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, json).map_err(|source| EnvironmentError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn is_known(&self, id: &DocumentId) -> bool {
        self.all_docs.contains(id)
    }

    /// Replace the known set with the documents found by this build.
    pub fn update(&mut self, found: &BTreeSet<DocumentId>) {
        self.all_docs = found.clone();
    }
}
