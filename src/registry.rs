//! Run registry and cleanup guarantee
//!
//! A [`RunRegistry`] belongs to exactly one run. The synthesizer records each
//! path the moment it exists; [`RunRegistry::cleanup`] removes them again.
//! Cleanup also runs from `Drop`, so an early `?` return, a panic, or a
//! cancelled run future still removes every generated file.
//!
//! Teardown is best effort and idempotent: a path that is already gone is not
//! an error, and one failed removal does not stop the rest.

use std::io;
use std::path::{Path, PathBuf};

use crate::fs::FileSystem;
use crate::synthesis::SynthesizedArtifact;

/// A path that could not be removed.
#[derive(Debug)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub error: io::Error,
}

/// Outcome of a cleanup pass.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Files and directories actually removed by this pass
    pub removed: Vec<PathBuf>,
    /// Paths that still exist because removal failed
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn remove_file(&mut self, fs: &impl FileSystem, path: &Path) {
        match fs.remove_file(path) {
            Ok(()) => self.removed.push(path.to_path_buf()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "already removed");
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "failed to remove generated file");
                self.failures.push(CleanupFailure {
                    path: path.to_path_buf(),
                    error,
                });
            }
        }
    }

    /// Remove a directory if it is empty; a non-empty directory is left alone.
    pub(crate) fn remove_empty_dir(&mut self, fs: &impl FileSystem, path: &Path) {
        match fs.remove_dir(path) {
            Ok(()) => self.removed.push(path.to_path_buf()),
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::DirectoryNotEmpty) => {
                tracing::debug!(path = %path.display(), "scratch directory kept");
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "failed to remove scratch directory");
                self.failures.push(CleanupFailure {
                    path: path.to_path_buf(),
                    error,
                });
            }
        }
    }
}

/// Artifacts created by one run.
pub struct RunRegistry<'a, F: FileSystem> {
    fs: &'a F,
    artifacts: Vec<SynthesizedArtifact>,
    /// Directories this run created (and may remove once empty)
    created_dirs: Vec<PathBuf>,
    cleaned: bool,
}

impl<'a, F: FileSystem> RunRegistry<'a, F> {
    pub fn new(fs: &'a F) -> Self {
        Self {
            fs,
            artifacts: Vec::new(),
            created_dirs: Vec::new(),
            cleaned: false,
        }
    }

    /// Register an artifact. Returns it so the caller can attach the sibling path once created.
    pub fn record(&mut self, artifact: SynthesizedArtifact) -> &mut SynthesizedArtifact {
        self.cleaned = false;
        self.artifacts.push(artifact);
        let last = self.artifacts.len() - 1;
        &mut self.artifacts[last]
    }

    pub fn record_created_dir(&mut self, dir: &Path) {
        if !self.created_dirs.iter().any(|d| d == dir) {
            self.created_dirs.push(dir.to_path_buf());
        }
    }

    pub fn artifacts(&self) -> &[SynthesizedArtifact] {
        &self.artifacts
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Remove every registered path: the sibling first, then the scratch copy,
    /// then any directory this run created if it is now empty.
    #[tracing::instrument(skip_all, fields(artifacts = self.artifacts.len()))]
    pub fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();

        for artifact in &self.artifacts {
            if let Some(link) = &artifact.linked_path {
                report.remove_file(self.fs, link);
            }
            report.remove_file(self.fs, &artifact.temporary_content_path);
        }
        for dir in self.created_dirs.iter().rev() {
            report.remove_empty_dir(self.fs, dir);
        }

        self.cleaned = true;
        tracing::debug!(removed = report.removed.len(), failed = report.failures.len(), "cleanup complete");
        report
    }
}

impl<F: FileSystem> Drop for RunRegistry<'_, F> {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        let report = self.cleanup();
        if !report.is_clean() {
            tracing::warn!(
                failed = report.failures.len(),
                "some generated files could not be removed; run `inlinetest clean` to sweep them"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::fs::OsFileSystem;

    fn artifact_in(dir: &Path, name: &str, with_link: bool) -> SynthesizedArtifact {
        let scratch = dir.join(".inlinetest");
        fs::create_dir_all(&scratch).unwrap();
        let temp = scratch.join(name);
        fs::write(&temp, "x\nunitTests();").unwrap();
        let linked_path = with_link.then(|| {
            let link = dir.join(name);
            fs::hard_link(&temp, &link).unwrap();
            link
        });
        SynthesizedArtifact {
            temporary_content_path: temp,
            linked_path,
            containing_directory: dir.to_path_buf(),
            original_source: dir.join("a.ts"),
        }
    }

    #[test]
    fn test_cleanup_removes_links_and_scratch_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = artifact_in(dir.path(), "aaaaaaaaaaaa.test.ts", true);
        let b = artifact_in(dir.path(), "bbbbbbbbbbbb.test.ts", false);

        let mut registry = RunRegistry::new(&OsFileSystem);
        registry.record(a.clone());
        registry.record(b.clone());
        registry.record_created_dir(&dir.path().join(".inlinetest"));

        let report = registry.cleanup();
        assert!(report.is_clean());
        assert_eq!(report.removed.len(), 4);
        assert!(!a.temporary_content_path.exists());
        assert!(!a.linked_path.unwrap().exists());
        assert!(!b.temporary_content_path.exists());
        assert!(!dir.path().join(".inlinetest").exists());
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let a = artifact_in(dir.path(), "aaaaaaaaaaaa.test.ts", true);

        let mut registry = RunRegistry::new(&OsFileSystem);
        registry.record(a);

        let first = registry.cleanup();
        let after_first: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().path()).collect();
        let second = registry.cleanup();
        let after_second: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().path()).collect();

        assert!(first.is_clean());
        assert!(second.is_clean());
        assert!(second.removed.is_empty());
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn test_already_missing_paths_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let a = artifact_in(dir.path(), "aaaaaaaaaaaa.test.ts", true);
        fs::remove_file(a.linked_path.as_ref().unwrap()).unwrap();

        let mut registry = RunRegistry::new(&OsFileSystem);
        registry.record(a.clone());

        let report = registry.cleanup();
        assert!(report.is_clean());
        assert_eq!(report.removed, vec![a.temporary_content_path.clone()]);
    }

    #[test]
    fn test_one_failure_does_not_abort_teardown() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where a file is expected: remove_file fails, the path still exists
        let stuck = dir.path().join("cccccccccccc.test.ts");
        fs::create_dir(&stuck).unwrap();
        let stuck_artifact = SynthesizedArtifact {
            temporary_content_path: stuck.clone(),
            linked_path: None,
            containing_directory: dir.path().to_path_buf(),
            original_source: dir.path().join("c.ts"),
        };
        let b = artifact_in(dir.path(), "bbbbbbbbbbbb.test.ts", true);

        let mut registry = RunRegistry::new(&OsFileSystem);
        registry.record(stuck_artifact);
        registry.record(b.clone());

        let report = registry.cleanup();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, stuck);
        assert!(!b.temporary_content_path.exists());
        assert!(!b.linked_path.unwrap().exists());
    }

    #[test]
    fn test_drop_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let a = artifact_in(dir.path(), "aaaaaaaaaaaa.test.ts", true);
        {
            let mut registry = RunRegistry::new(&OsFileSystem);
            registry.record(a.clone());
        }
        assert!(!a.temporary_content_path.exists());
        assert!(!a.linked_path.unwrap().exists());
    }

    #[test]
    fn test_drop_cleans_up_on_panic() {
        let dir = tempfile::tempdir().unwrap();
        let a = artifact_in(dir.path(), "aaaaaaaaaaaa.test.ts", false);
        let temp = a.temporary_content_path.clone();

        let result = std::panic::catch_unwind(move || {
            let mut registry = RunRegistry::new(&OsFileSystem);
            registry.record(a);
            panic!("stage failed");
        });
        assert!(result.is_err());
        assert!(!temp.exists());
    }

    #[test]
    fn test_scratch_dir_with_foreign_files_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let a = artifact_in(dir.path(), "aaaaaaaaaaaa.test.ts", false);
        let scratch = dir.path().join(".inlinetest");
        fs::write(scratch.join("other-run.test.ts"), "").unwrap();

        let mut registry = RunRegistry::new(&OsFileSystem);
        registry.record(a);
        registry.record_created_dir(&scratch);

        let report = registry.cleanup();
        assert!(report.is_clean());
        assert!(scratch.join("other-run.test.ts").exists());
    }
}
