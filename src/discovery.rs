//! Module discovery
//!
//! Recursively walks the root directory and collects every regular file with a
//! recognized source extension. Entries are visited in file-name order, so one
//! filesystem snapshot always yields the same sequence. Symlinks, sockets and
//! devices are skipped without following them.

use std::path::{Path, PathBuf};

use crate::config::HarnessConfig;
use crate::errors::HarnessError;
use crate::fs::{EntryKind, FileSystem};

/// A discovered source file, not yet known to carry a hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Path of the source file
    pub source_path: PathBuf,
    /// Directory containing `source_path`
    pub containing_directory: PathBuf,
}

impl Candidate {
    /// Source extension without the leading dot (empty if the file has none).
    pub fn extension(&self) -> &str {
        self.source_path.extension().and_then(|e| e.to_str()).unwrap_or("")
    }
}

/// Discover every source file under `root`.
///
/// ## Errors
///
/// Returns [`HarnessError::Discovery`] if `root` (or any directory below it)
/// is missing or unreadable. An empty directory yields an empty list.
#[tracing::instrument(skip_all, fields(root = %root.display()))]
pub fn discover(fs: &impl FileSystem, root: &Path, config: &HarnessConfig) -> Result<Vec<Candidate>, HarnessError> {
    let mut candidates = Vec::new();
    visit(fs, root, config, &mut candidates)?;
    tracing::debug!(count = candidates.len(), "discovery complete");
    Ok(candidates)
}

fn visit(
    fs: &impl FileSystem,
    dir: &Path,
    config: &HarnessConfig,
    out: &mut Vec<Candidate>,
) -> Result<(), HarnessError> {
    let entries = fs.read_dir(dir).map_err(|source| HarnessError::Discovery {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        match entry.kind {
            EntryKind::File if config.is_source_file(&entry.path) => {
                tracing::trace!(path = %entry.path.display(), "candidate");
                out.push(Candidate {
                    containing_directory: dir.to_path_buf(),
                    source_path: entry.path,
                });
            }
            EntryKind::Directory => visit(fs, &entry.path, config, out)?,
            EntryKind::File | EntryKind::Other => {}
        }
    }

    Ok(())
}
