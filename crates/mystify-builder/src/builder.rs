//! MyST builder.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use rayon::prelude::*;

use mystify_doctree::{DocumentReader, MarkdownReader};
use mystify_writer::{MystTranslator, TranslateError, Translator};

use crate::docname::DocumentId;
use crate::environment::BuildEnvironment;
use crate::outdated::OutdatedDocs;
use crate::patch::ConfigPatcher;
use crate::registry::{DocumentRegistry, RegistryError, SourceRegistry};
use crate::target::TargetResolver;
use crate::tasks::FinishTasks;
use crate::writer::{DocumentWriter, WriteOutcome};

/// Configuration for a MyST build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Source docs directory
    pub source_dir: PathBuf,

    /// Directory holding conf.py and the Makefile
    pub conf_dir: PathBuf,

    /// Output directory
    pub output_dir: PathBuf,

    /// Source file suffixes, in order of preference
    pub source_suffixes: Vec<String>,

    /// Record failing documents and continue instead of aborting
    pub keep_going: bool,

    /// Worker threads for the write phase (None = rayon default)
    pub jobs: Option<usize>,

    /// Build-control file copied into the output directory
    pub control_file: String,

    /// Configuration file patched into the output directory
    pub conf_file: String,

    /// Extension added to the patched configuration
    pub capability: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            conf_dir: PathBuf::from("."),
            output_dir: PathBuf::from("_build/myst"),
            source_suffixes: vec![".md".to_string()],
            keep_going: false,
            jobs: None,
            control_file: "Makefile".to_string(),
            conf_file: "conf.py".to_string(),
            capability: "myst_parser".to_string(),
        }
    }
}

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Documents present in the source tree
    pub found: usize,

    /// Documents selected for writing
    pub outdated: usize,

    /// Documents whose output was written
    pub written: Vec<DocumentId>,

    /// Output files that could not be written
    pub write_failures: Vec<PathBuf>,

    /// Documents that failed to read or translate (keep-going builds only)
    pub failed: Vec<DocumentId>,

    /// Finish tasks that ran to completion
    pub finish_tasks: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to read source: {0}")]
    ReadError(String),

    #[error("Failed to parse document: {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Failed to translate document: {0}")]
    TranslateError(#[from] TranslateError),

    #[error("Failed to write output: {0}")]
    WriteError(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Which documents a build writes.
#[derive(Debug, Clone)]
enum BuildMode {
    /// Only out-of-date documents
    Update,
    /// Every document found
    All,
    /// The named documents, whether outdated or not
    Specific(Vec<DocumentId>),
}

/// Incremental MyST builder.
///
/// Holds no per-document state; each write gets its own translation context,
/// so the write phase runs on the rayon pool without locking.
pub struct Builder {
    config: BuildConfig,
    resolver: TargetResolver,
    reader: Box<dyn DocumentReader>,
    translator: Box<dyn Translator>,
}

impl Builder {
    /// Create a builder reading CommonMark and writing MyST.
    pub fn new(config: BuildConfig) -> Self {
        Self::with_engines(
            config,
            Box::new(MarkdownReader::new()),
            Box::new(MystTranslator::new()),
        )
    }

    /// Create a builder with a custom reader and translator.
    pub fn with_engines(
        config: BuildConfig,
        reader: Box<dyn DocumentReader>,
        translator: Box<dyn Translator>,
    ) -> Self {
        let resolver = TargetResolver::new(&config.output_dir, translator.out_suffix());
        Self {
            config,
            resolver,
            reader,
            translator,
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn resolver(&self) -> &TargetResolver {
        &self.resolver
    }

    /// Discover source documents against the persisted environment.
    pub fn load_registry(&self) -> Result<SourceRegistry, BuildError> {
        let env = BuildEnvironment::load(&BuildEnvironment::path(&self.config.output_dir));
        Ok(SourceRegistry::discover(
            &self.config.source_dir,
            &self.config.source_suffixes,
            &[self.config.output_dir.clone()],
            &env,
        )?)
    }

    /// Documents of `registry` whose output needs regenerating.
    pub fn outdated_docs<'a, R: DocumentRegistry + ?Sized>(
        &'a self,
        registry: &'a R,
    ) -> OutdatedDocs<'a, R> {
        OutdatedDocs::new(registry, &self.resolver)
    }

    /// Write documents that changed since the last build.
    pub fn build_update(&self) -> Result<BuildResult, BuildError> {
        self.build(BuildMode::Update)
    }

    /// Write every document.
    pub fn build_all(&self) -> Result<BuildResult, BuildError> {
        self.build(BuildMode::All)
    }

    /// Write the given documents only.
    pub fn build_specific(&self, docs: &[DocumentId]) -> Result<BuildResult, BuildError> {
        self.build(BuildMode::Specific(docs.to_vec()))
    }

    fn build(&self, mode: BuildMode) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        // Ensure output directory exists
        fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        let env_path = BuildEnvironment::path(&self.config.output_dir);
        let mut env = BuildEnvironment::load(&env_path);
        let registry = SourceRegistry::discover(
            &self.config.source_dir,
            &self.config.source_suffixes,
            &[self.config.output_dir.clone()],
            &env,
        )?;

        let work: BTreeSet<DocumentId> = match mode {
            BuildMode::Update => self.outdated_docs(&registry).collect(),
            BuildMode::All => registry.found_docs().clone(),
            BuildMode::Specific(docs) => docs
                .into_iter()
                .filter(|id| {
                    let found = registry.found_docs().contains(id);
                    if !found {
                        tracing::warn!("No such document: {}", id);
                    }
                    found
                })
                .collect(),
        };

        tracing::info!(
            "{} of {} documents out of date, writing {} output",
            work.len(),
            registry.found_docs().len(),
            self.translator.name()
        );

        let outcomes = self.write_phase(&registry, &work);

        let mut written = Vec::new();
        let mut write_failures = Vec::new();
        let mut failed = Vec::new();
        let mut first_error = None;

        for (id, outcome) in outcomes {
            match outcome {
                Ok(WriteOutcome::Written(_)) => written.push(id),
                Ok(WriteOutcome::Failed(path)) => write_failures.push(path),
                Err(e) => {
                    tracing::error!("{}: {}", id, e);
                    failed.push(id);
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            if !self.config.keep_going {
                return Err(e);
            }
        }

        env.update(registry.found_docs());
        if let Err(e) = env.save(&env_path) {
            tracing::warn!("{}", e);
        }

        let mut tasks = FinishTasks::new();
        self.finish(&mut tasks);
        let summary = tasks.join();

        let duration = start.elapsed();

        Ok(BuildResult {
            found: registry.found_docs().len(),
            outdated: work.len(),
            written,
            write_failures,
            failed,
            finish_tasks: summary.succeeded,
            duration_ms: duration.as_millis() as u64,
            output_dir: self.config.output_dir.clone(),
        })
    }

    /// Read, translate and write every document in `work`.
    fn write_phase(
        &self,
        registry: &SourceRegistry,
        work: &BTreeSet<DocumentId>,
    ) -> Vec<(DocumentId, Result<WriteOutcome, BuildError>)> {
        let docs: Vec<&DocumentId> = work.iter().collect();
        let writer = DocumentWriter::new(&self.resolver, self.translator.as_ref());
        let write_one = |id: &DocumentId| (id.clone(), self.write_doc(registry, &writer, id));

        match self.config.jobs {
            Some(1) => docs.iter().map(|id| write_one(id)).collect(),
            Some(jobs) => match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
                Ok(pool) => pool.install(|| docs.par_iter().map(|id| write_one(id)).collect()),
                Err(e) => {
                    tracing::warn!("Failed to start {} workers, using the global pool: {}", jobs, e);
                    docs.par_iter().map(|id| write_one(id)).collect()
                }
            },
            None => docs.par_iter().map(|id| write_one(id)).collect(),
        }
    }

    /// Build a single document.
    fn write_doc(
        &self,
        registry: &SourceRegistry,
        writer: &DocumentWriter<'_>,
        id: &DocumentId,
    ) -> Result<WriteOutcome, BuildError> {
        let path = registry.doc2path(id);

        let source = fs::read_to_string(&path)
            .map_err(|e| BuildError::ReadError(format!("{}: {}", path.display(), e)))?;

        let doc = self.reader.read(&source).map_err(|e| BuildError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Ok(writer.write(id, &doc)?)
    }

    /// Queue the end-of-build work.
    fn finish(&self, tasks: &mut FinishTasks) {
        let patcher = ConfigPatcher {
            conf_dir: self.config.conf_dir.clone(),
            output_dir: self.config.output_dir.clone(),
            control_file: self.config.control_file.clone(),
            conf_file: self.config.conf_file.clone(),
            capability: self.config.capability.clone(),
        };

        tasks.add_task("copy build files", move || {
            patcher.run()?;
            Ok(())
        });
    }
}
