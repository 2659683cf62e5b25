//! Per-document output writing.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use mystify_doctree::Document;
use mystify_writer::{TranslateError, Translator};

use crate::docname::DocumentId;
use crate::target::TargetResolver;

/// Translation context for the document currently being rendered.
///
/// One instance exists per in-flight write, so parallel writes never share
/// a "current document".
pub struct TranslatorState<'a> {
    current_docname: &'a DocumentId,
    translator: &'a dyn Translator,
}

impl<'a> TranslatorState<'a> {
    pub fn new(current_docname: &'a DocumentId, translator: &'a dyn Translator) -> Self {
        Self {
            current_docname,
            translator,
        }
    }

    pub fn current_docname(&self) -> &DocumentId {
        self.current_docname
    }

    pub fn translate(&self, doc: &Document) -> Result<String, TranslateError> {
        self.translator.translate(self.current_docname.as_str(), doc)
    }
}

/// What happened to one document's output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(PathBuf),
    /// The output could not be written; a warning has been logged
    Failed(PathBuf),
}

/// Translates documents and writes them to their resolved targets.
#[derive(Clone, Copy)]
pub struct DocumentWriter<'a> {
    resolver: &'a TargetResolver,
    translator: &'a dyn Translator,
}

impl<'a> DocumentWriter<'a> {
    pub fn new(resolver: &'a TargetResolver, translator: &'a dyn Translator) -> Self {
        Self {
            resolver,
            translator,
        }
    }

    /// Translate `doc` and write it to the target of `id`.
    ///
    /// Translation errors are returned to the caller. I/O failures while
    /// writing are logged and reported as [`WriteOutcome::Failed`] so that
    /// one unwritable target never stops the rest of the batch.
    pub fn write(&self, id: &DocumentId, doc: &Document) -> Result<WriteOutcome, TranslateError> {
        let state = TranslatorState::new(id, self.translator);
        let output = state.translate(doc)?;

        let target = self.resolver.resolve(state.current_docname());
        match write_target(&target, &output) {
            Ok(()) => {
                tracing::debug!("Wrote {}", target.display());
                Ok(WriteOutcome::Written(target))
            }
            Err(e) => {
                tracing::warn!("error writing file {}: {}", target.display(), e);
                Ok(WriteOutcome::Failed(target))
            }
        }
    }
}

fn write_target(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)
}
