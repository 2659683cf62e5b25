//! Trait definitions for tree translators.

use mystify_doctree::Document;

/// Errors raised when a tree cannot be expressed in the target markup.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("{docname}: heading level {level} is outside 1-6")]
    HeadingLevel { docname: String, level: u8 },

    #[error("{docname}: table row has {found} cells but the header has {expected}")]
    RaggedTable {
        docname: String,
        expected: usize,
        found: usize,
    },

    #[error("{docname}: table has no header row")]
    EmptyTable { docname: String },

    #[error("{docname}: directive without a name")]
    EmptyDirectiveName { docname: String },

    #[error("{docname}: role without a name")]
    EmptyRoleName { docname: String },

    #[error("{docname}: failed to serialize frontmatter: {message}")]
    Metadata { docname: String, message: String },
}

/// Trait for target-markup translators.
///
/// Implementations hold no per-document state; the document being rendered
/// is passed to every call, so one translator can serve concurrent writes.
pub trait Translator: Send + Sync {
    /// Output format identifier (e.g., "myst")
    fn name(&self) -> &'static str;

    /// Suffix appended to a document identifier to form its output file name
    fn out_suffix(&self) -> &'static str;

    /// Render a whole document.
    ///
    /// # Arguments
    /// * `docname` - Identifier of the document in flight, used in diagnostics
    /// * `doc` - The parsed document tree
    fn translate(&self, docname: &str, doc: &Document) -> Result<String, TranslateError>;
}
