//! Staleness detection.
//!
//! A document is out of date when the previous build did not know it, or
//! when its source was modified strictly after its output. A missing output
//! counts as infinitely old; a missing source drops the document silently.

use std::collections::btree_set;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::docname::DocumentId;
use crate::registry::DocumentRegistry;
use crate::target::TargetResolver;

/// Lazy, single-pass iterator over the documents that need writing.
pub struct OutdatedDocs<'a, R: ?Sized> {
    registry: &'a R,
    resolver: &'a TargetResolver,
    docs: btree_set::Iter<'a, DocumentId>,
}

impl<'a, R: DocumentRegistry + ?Sized> OutdatedDocs<'a, R> {
    pub fn new(registry: &'a R, resolver: &'a TargetResolver) -> Self {
        Self {
            registry,
            resolver,
            docs: registry.found_docs().iter(),
        }
    }

    fn is_outdated(&self, id: &DocumentId) -> bool {
        if !self.registry.is_known(id) {
            tracing::debug!("{}: new document", id);
            return true;
        }

        let target_mtime = modified(&self.resolver.resolve(id)).unwrap_or(UNIX_EPOCH);

        match modified(&self.registry.doc2path(id)) {
            Some(source_mtime) if source_mtime > target_mtime => {
                tracing::debug!("{}: source changed", id);
                true
            }
            Some(_) => false,
            None => {
                tracing::debug!("{}: source vanished, skipping", id);
                false
            }
        }
    }
}

impl<R: DocumentRegistry + ?Sized> Iterator for OutdatedDocs<'_, R> {
    type Item = DocumentId;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.docs.next() {
            if self.is_outdated(id) {
                return Some(id.clone());
            }
        }
        None
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::fs::File;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    /// Registry over explicit paths, independent of discovery rules.
    struct FixedRegistry {
        found: BTreeSet<DocumentId>,
        known: BTreeSet<DocumentId>,
        paths: BTreeMap<DocumentId, PathBuf>,
    }

    impl DocumentRegistry for FixedRegistry {
        fn found_docs(&self) -> &BTreeSet<DocumentId> {
            &self.found
        }

        fn is_known(&self, id: &DocumentId) -> bool {
            self.known.contains(id)
        }

        fn doc2path(&self, id: &DocumentId) -> PathBuf {
            self.paths[id].clone()
        }
    }

    struct Fixture {
        temp: TempDir,
        resolver: TargetResolver,
        registry: FixedRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = tempdir().unwrap();
            fs::create_dir_all(temp.path().join("src")).unwrap();
            fs::create_dir_all(temp.path().join("out")).unwrap();
            let resolver = TargetResolver::new(temp.path().join("out"), ".md");
            Self {
                temp,
                resolver,
                registry: FixedRegistry {
                    found: BTreeSet::new(),
                    known: BTreeSet::new(),
                    paths: BTreeMap::new(),
                },
            }
        }

        /// Register a document; `None` timestamps leave that file absent.
        fn doc(&mut self, name: &str, known: bool, source: Option<u64>, target: Option<u64>) {
            let id = DocumentId::new(name);
            let source_path = self.temp.path().join("src").join(format!("{}.md", name));
            if let Some(secs) = source {
                fs::write(&source_path, "# Source").unwrap();
                set_mtime(&source_path, secs);
            }
            if let Some(secs) = target {
                let target_path = self.resolver.resolve(&id);
                fs::write(&target_path, "# Output").unwrap();
                set_mtime(&target_path, secs);
            }
            if known {
                self.registry.known.insert(id.clone());
            }
            self.registry.found.insert(id.clone());
            self.registry.paths.insert(id, source_path);
        }

        fn outdated(&self) -> Vec<String> {
            OutdatedDocs::new(&self.registry, &self.resolver)
                .map(|id| id.to_string())
                .collect()
        }
    }

    fn set_mtime(path: &Path, secs: u64) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn newer_sources_are_outdated() {
        let mut fx = Fixture::new();
        fx.doc("changed", true, Some(2_000), Some(1_000));
        fx.doc("fresh", true, Some(1_000), Some(2_000));

        assert_eq!(fx.outdated(), vec!["changed"]);
    }

    #[test]
    fn missing_targets_are_outdated() {
        let mut fx = Fixture::new();
        fx.doc("unbuilt", true, Some(1_000), None);

        assert_eq!(fx.outdated(), vec!["unbuilt"]);
    }

    #[test]
    fn new_documents_are_always_outdated() {
        let mut fx = Fixture::new();
        fx.doc("added", false, Some(1_000), Some(5_000));

        assert_eq!(fx.outdated(), vec!["added"]);
    }

    #[test]
    fn equal_timestamps_are_not_outdated() {
        let mut fx = Fixture::new();
        fx.doc("touched", true, Some(3_000), Some(3_000));

        assert!(fx.outdated().is_empty());
    }

    #[test]
    fn vanished_sources_are_skipped() {
        let mut fx = Fixture::new();
        fx.doc("removed", true, None, Some(1_000));
        fx.doc("kept", true, Some(2_000), Some(1_000));

        assert_eq!(fx.outdated(), vec!["kept"]);
    }

    #[test]
    fn iteration_is_lazy_and_single_pass() {
        let mut fx = Fixture::new();
        fx.doc("a", false, Some(1_000), None);
        fx.doc("b", false, Some(1_000), None);

        let mut docs = OutdatedDocs::new(&fx.registry, &fx.resolver);
        assert_eq!(docs.next(), Some(DocumentId::new("a")));
        assert_eq!(docs.next(), Some(DocumentId::new("b")));
        assert_eq!(docs.next(), None);
        assert_eq!(docs.next(), None);
    }
}
