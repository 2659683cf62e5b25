//! Output location of each document.

use std::path::{Path, PathBuf};

use crate::docname::DocumentId;

/// Maps document identifiers to output files, one to one.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    output_dir: PathBuf,
    out_suffix: String,
}

impl TargetResolver {
    pub fn new(output_dir: impl Into<PathBuf>, out_suffix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            out_suffix: out_suffix.into(),
        }
    }

    /// `<output_dir>/<docname><out_suffix>`, with separators translated.
    pub fn resolve(&self, id: &DocumentId) -> PathBuf {
        let mut path = self.output_dir.join(id.to_path()).into_os_string();
        path.push(&self.out_suffix);
        PathBuf::from(path)
    }

    /// Link target used when other documents refer to `id`.
    pub fn target_uri(&self, id: &DocumentId) -> String {
        id.as_str().to_string()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn out_suffix(&self) -> &str {
        &self.out_suffix
    }
}
