//! Watch mode: rebuild on change.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use mystify_builder::{BuildConfig, Builder};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

use super::build::{load_config, report};

/// How long the event stream must stay quiet before a rebuild starts.
const QUIET_PERIOD: Duration = Duration::from_millis(100);

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A source document was created, modified or removed
    SourceChanged(PathBuf),

    /// conf.py or the Makefile changed
    ProjectFileChanged(PathBuf),
}

/// Which paths are worth a rebuild.
#[derive(Debug, Clone)]
struct WatchFilter {
    output_dir: PathBuf,
    suffixes: Vec<String>,
    project_files: Vec<String>,
}

impl WatchFilter {
    fn new(config: &BuildConfig) -> Self {
        Self {
            output_dir: config
                .output_dir
                .canonicalize()
                .unwrap_or_else(|_| config.output_dir.clone()),
            suffixes: config.source_suffixes.clone(),
            project_files: vec![config.control_file.clone(), config.conf_file.clone()],
        }
    }

    fn relevant(&self, event: &notify::Event) -> Option<WatchEvent> {
        event
            .paths
            .iter()
            .find_map(|path| self.classify(path, &event.kind))
    }

    fn classify(&self, path: &Path, kind: &notify::EventKind) -> Option<WatchEvent> {
        use notify::EventKind;

        if !matches!(
            kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return None;
        }
        // Our own output would retrigger forever
        if path.starts_with(&self.output_dir) {
            return None;
        }

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if self.project_files.iter().any(|f| f == name) {
            Some(WatchEvent::ProjectFileChanged(path.to_path_buf()))
        } else if self.suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            Some(WatchEvent::SourceChanged(path.to_path_buf()))
        } else {
            None
        }
    }
}

/// File watcher for detecting changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a new file watcher for the given paths.
    ///
    /// Returns the watcher and a channel to receive events.
    fn new(
        paths: &[PathBuf],
        filter: WatchFilter,
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        for path in paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(std::io::Error::other)?;
            }
        }

        std::thread::spawn(move || {
            while let Some(e) = next_settled(&sync_rx, &filter, QUIET_PERIOD) {
                if async_tx.blocking_send(e).is_err() {
                    break;
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Wait for the next relevant event, then keep draining until nothing has
/// arrived for `quiet`.
///
/// Returns the last relevant event of the burst, or `None` once the sender is
/// gone and nothing is pending.
fn next_settled(
    rx: &mpsc::Receiver<notify::Event>,
    filter: &WatchFilter,
    quiet: Duration,
) -> Option<WatchEvent> {
    let mut pending = loop {
        let event = rx.recv().ok()?;
        if let Some(e) = filter.relevant(&event) {
            break e;
        }
    };

    loop {
        match rx.recv_timeout(quiet) {
            Ok(event) => {
                if let Some(e) = filter.relevant(&event) {
                    pending = e;
                }
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                return Some(pending)
            }
        }
    }
}

/// Run the watch command.
pub async fn run(config_path: &Path, output: Option<PathBuf>) -> Result<()> {
    let file_config = load_config(config_path)?;
    let config = file_config.to_build_config(output);

    let builder = Arc::new(Builder::new(config));

    rebuild(&builder).await?;

    // Absolute paths, so events can be matched against the output directory
    let config = builder.config();
    let filter = WatchFilter::new(config);
    let mut paths: Vec<PathBuf> = [&config.source_dir, &config.conf_dir]
        .into_iter()
        .map(|p| p.canonicalize().unwrap_or_else(|_| p.clone()))
        .collect();
    paths.dedup();

    let (_watcher, mut rx) =
        FileWatcher::new(&paths, filter).context("Failed to start file watcher")?;
    tracing::info!("Watching for changes (Ctrl+C to stop)");

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                tracing::info!("Change detected: {:?}", event);
                if let Err(e) = rebuild(&builder).await {
                    tracing::error!("Build failed: {:#}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping");
                break;
            }
        }
    }

    Ok(())
}

async fn rebuild(builder: &Arc<Builder>) -> Result<()> {
    let builder = Arc::clone(builder);
    let result = tokio::task::spawn_blocking(move || builder.build_update())
        .await
        .context("Build task panicked")??;
    report(&result);
    Ok(())
}
