//! Incremental MyST build coordination.
//!
//! Decides which source documents are out of date, translates each of them
//! into MyST Markdown with per-document write isolation, and patches the
//! project's Sphinx configuration once the write phase is over.

pub mod builder;
pub mod docname;
pub mod environment;
pub mod outdated;
pub mod patch;
pub mod registry;
pub mod target;
pub mod tasks;
pub mod writer;

pub use builder::{BuildConfig, BuildError, BuildResult, Builder};
pub use docname::DocumentId;
pub use environment::{BuildEnvironment, EnvironmentError};
pub use outdated::OutdatedDocs;
pub use patch::{ConfigPatcher, PatchError, PatchReport};
pub use registry::{DocumentRegistry, RegistryError, SourceRegistry};
pub use target::TargetResolver;
pub use tasks::{FinishTasks, TaskError, TaskSummary};
pub use writer::{DocumentWriter, TranslatorState, WriteOutcome};

pub use mystify_doctree::{DocumentReader, MarkdownReader};
pub use mystify_writer::{MystTranslator, Translator};
