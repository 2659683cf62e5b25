//! Build command.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use mystify_builder::{BuildConfig, BuildResult, Builder, DocumentId};
use serde::Deserialize;

/// Configuration file structure (mystify.toml).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub build: BuildSettings,
}

#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_source_dir")]
    pub source_dir: String,
    #[serde(default = "default_conf_dir")]
    pub conf_dir: String,
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_suffixes")]
    pub suffixes: Vec<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            conf_dir: default_conf_dir(),
            output: default_output(),
            suffixes: default_suffixes(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BuildSettings {
    #[serde(default)]
    pub keep_going: bool,
    pub jobs: Option<usize>,
    #[serde(default = "default_capability")]
    pub capability: String,
    #[serde(default = "default_control_file")]
    pub control_file: String,
    #[serde(default = "default_conf_file")]
    pub conf_file: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            keep_going: false,
            jobs: None,
            capability: default_capability(),
            control_file: default_control_file(),
            conf_file: default_conf_file(),
        }
    }
}

fn default_source_dir() -> String {
    ".".to_string()
}
fn default_conf_dir() -> String {
    ".".to_string()
}
fn default_output() -> String {
    "_build/myst".to_string()
}
fn default_suffixes() -> Vec<String> {
    vec![".md".to_string()]
}
fn default_capability() -> String {
    "myst_parser".to_string()
}
fn default_control_file() -> String {
    "Makefile".to_string()
}
fn default_conf_file() -> String {
    "conf.py".to_string()
}

impl ConfigFile {
    /// Library config, with `output` overriding the configured directory.
    pub fn to_build_config(&self, output: Option<PathBuf>) -> BuildConfig {
        BuildConfig {
            source_dir: PathBuf::from(&self.project.source_dir),
            conf_dir: PathBuf::from(&self.project.conf_dir),
            output_dir: output.unwrap_or_else(|| PathBuf::from(&self.project.output)),
            source_suffixes: self.project.suffixes.clone(),
            keep_going: self.build.keep_going,
            jobs: self.build.jobs,
            control_file: self.build.control_file.clone(),
            conf_file: self.build.conf_file.clone(),
            capability: self.build.capability.clone(),
        }
    }
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        return Ok(config);
    }
    Ok(ConfigFile::default())
}

/// Arguments of the build command.
#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Output directory (defaults to config or "_build/myst")
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write all documents, not only out-of-date ones
    #[arg(short, long)]
    pub all: bool,

    /// Keep building when a document fails
    #[arg(short, long)]
    pub keep_going: bool,

    /// Number of parallel writers
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Documents to write, by name (e.g. "guide/setup")
    pub docs: Vec<String>,
}

impl BuildArgs {
    fn apply(&self, config: &mut BuildConfig) {
        if self.keep_going {
            config.keep_going = true;
        }
        if self.jobs.is_some() {
            config.jobs = self.jobs;
        }
    }
}

/// Run the build command.
pub async fn run(config_path: &Path, args: BuildArgs) -> Result<()> {
    tracing::info!("Building MyST sources...");

    let file_config = load_config(config_path)?;
    let mut config = file_config.to_build_config(args.output.clone());
    args.apply(&mut config);

    let builder = Builder::new(config);
    let result = tokio::task::spawn_blocking(move || {
        if !args.docs.is_empty() {
            let docs: Vec<DocumentId> = args
                .docs
                .iter()
                .map(|d| DocumentId::from(d.as_str()))
                .collect();
            builder.build_specific(&docs)
        } else if args.all {
            builder.build_all()
        } else {
            builder.build_update()
        }
    })
    .await
    .context("Build task panicked")??;

    report(&result);

    Ok(())
}

/// Log the summary of a finished build.
pub fn report(result: &BuildResult) {
    tracing::info!(
        "Wrote {} of {} documents in {}ms",
        result.written.len(),
        result.found,
        result.duration_ms
    );

    for path in &result.write_failures {
        tracing::warn!("Not written: {}", path.display());
    }
    if !result.failed.is_empty() {
        tracing::warn!("{} documents failed", result.failed.len());
    }

    tracing::info!("Output: {}", result.output_dir.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_config_uses_defaults() {
        let temp = tempdir().unwrap();
        let config = load_config(&temp.path().join("mystify.toml")).unwrap();
        let build = config.to_build_config(None);

        assert_eq!(build.output_dir, PathBuf::from("_build/myst"));
        assert_eq!(build.source_suffixes, vec![".md".to_string()]);
        assert_eq!(build.capability, "myst_parser");
        assert!(!build.keep_going);
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("mystify.toml");
        fs::write(
            &path,
            "[project]\nsource_dir = \"docs\"\nsuffixes = [\".md\", \".markdown\"]\n\n[build]\njobs = 4\n",
        )
        .unwrap();

        let build = load_config(&path).unwrap().to_build_config(None);

        assert_eq!(build.source_dir, PathBuf::from("docs"));
        assert_eq!(build.conf_dir, PathBuf::from("."));
        assert_eq!(build.source_suffixes.len(), 2);
        assert_eq!(build.jobs, Some(4));
        assert_eq!(build.conf_file, "conf.py");
    }

    #[test]
    fn malformed_config_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("mystify.toml");
        fs::write(&path, "[project\nsource_dir = ").unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn flags_override_file() {
        let mut config = ConfigFile::default().to_build_config(Some(PathBuf::from("out")));
        let args = BuildArgs {
            output: None,
            all: false,
            keep_going: true,
            jobs: Some(2),
            docs: vec![],
        };
        args.apply(&mut config);

        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert!(config.keep_going);
        assert_eq!(config.jobs, Some(2));
    }
}
