//! Sphinx project file patching.
//!
//! After the write phase the project's `Makefile` is copied next to the
//! generated Markdown and `conf.py` is rewritten so that its `extensions`
//! list also loads the MyST parser. `conf.py` is Python and is not parsed:
//! the `extensions = [` line is found by a line-level match and the new
//! entry is inserted on the line after it.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Substrings that together identify the extension list assignment.
const EXTENSIONS_TOKENS: [&str; 3] = ["extensions", "=", "["];

/// Copies the build-control file and patches the configuration file.
#[derive(Debug, Clone)]
pub struct ConfigPatcher {
    /// Directory holding `conf.py` and the `Makefile`
    pub conf_dir: PathBuf,

    /// Where the patched copies go
    pub output_dir: PathBuf,

    /// Build-control file copied verbatim
    pub control_file: String,

    /// Configuration file to patch
    pub conf_file: String,

    /// Extension inserted into the `extensions` list
    pub capability: String,
}

/// Summary of a successful patch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    /// Copied build-control file
    pub control_file: PathBuf,

    /// Patched configuration file
    pub conf_file: PathBuf,

    /// Number of entries inserted (0 or 1)
    pub insertions: usize,
}

/// Errors that can occur while patching.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("Failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConfigPatcher {
    /// Copy the control file, then stream the configuration file through
    /// [`patch_line`]. Only the first matching line is patched.
    pub fn run(&self) -> Result<PatchReport, PatchError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| PatchError::Write {
            path: self.output_dir.clone(),
            source,
        })?;

        let control_src = self.conf_dir.join(&self.control_file);
        let control_dest = self.output_dir.join(&self.control_file);
        fs::copy(&control_src, &control_dest).map_err(|source| PatchError::Copy {
            from: control_src.clone(),
            to: control_dest.clone(),
            source,
        })?;

        let conf_src = self.conf_dir.join(&self.conf_file);
        let conf_dest = self.output_dir.join(&self.conf_file);
        let insertions = self.patch_file(&conf_src, &conf_dest)?;

        if insertions == 0 {
            tracing::warn!(
                "No extensions list found in {}, '{}' was not added",
                conf_src.display(),
                self.capability
            );
        } else {
            tracing::info!("Added '{}' to {}", self.capability, conf_dest.display());
        }

        Ok(PatchReport {
            control_file: control_dest,
            conf_file: conf_dest,
            insertions,
        })
    }

    fn patch_file(&self, src: &Path, dest: &Path) -> Result<usize, PatchError> {
        let read_err = |source| PatchError::Read {
            path: src.to_path_buf(),
            source,
        };
        let write_err = |source| PatchError::Write {
            path: dest.to_path_buf(),
            source,
        };

        let mut reader = BufReader::new(File::open(src).map_err(read_err)?);
        let mut writer = BufWriter::new(File::create(dest).map_err(write_err)?);

        let mut insertions = 0;
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).map_err(read_err)? == 0 {
                break;
            }

            // Lines are copied as raw bytes; matching uses a lossy view
            writer.write_all(&line).map_err(write_err)?;
            if !declares_extensions(&String::from_utf8_lossy(&line)) {
                continue;
            }
            if insertions == 0 {
                writer
                    .write_all(insertion(&line, &self.capability).as_bytes())
                    .map_err(write_err)?;
                insertions += 1;
            } else {
                tracing::debug!(
                    "Ignoring further extensions assignment: {}",
                    String::from_utf8_lossy(&line).trim_end()
                );
            }
        }

        writer.flush().map_err(write_err)?;
        Ok(insertions)
    }
}

/// Whether `line` looks like the `extensions = [` assignment.
///
/// Any line containing all three tokens matches, including comments and
/// string literals that happen to contain them.
pub fn declares_extensions(line: &str) -> bool {
    EXTENSIONS_TOKENS.iter().all(|token| line.contains(token))
}

/// Apply the insertion rule to one line.
///
/// A matching line is followed by `'<capability>',` on a new line, using the
/// line's own terminator. Other lines come back unchanged.
pub fn patch_line<'a>(line: &'a str, capability: &str) -> Cow<'a, str> {
    if !declares_extensions(line) {
        return Cow::Borrowed(line);
    }

    let mut patched = line.to_string();
    patched.push_str(&insertion(line.as_bytes(), capability));
    Cow::Owned(patched)
}

/// Text written right after a matching line.
///
/// Reuses the line's terminator; a line without one is terminated first.
fn insertion(line: &[u8], capability: &str) -> String {
    if line.ends_with(b"\r\n") {
        format!("'{capability}',\r\n")
    } else if line.ends_with(b"\n") {
        format!("'{capability}',\n")
    } else {
        format!("\n'{capability}',\n")
    }
}
