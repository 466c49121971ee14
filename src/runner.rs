//! Harness entry point
//!
//! [`Harness::run`] drives one run: discover → detect → synthesize → execute,
//! with cleanup afterwards on every path. Stages run one after the other, in
//! discovery order. The engine is started only after every artifact has been
//! written.
//!
//! Generated artifacts found during discovery (left by a concurrent or killed
//! run, or inside the scratch directory) are skipped before detection.
//!
//! The loader, engine and filesystem are injected, so the whole lifecycle can
//! be tested without Node.js or Jest installed.

use std::io;
use std::path::{Path, PathBuf};

use crate::config::HarnessConfig;
use crate::discovery::{Candidate, discover};
use crate::engine::{ExecutionPlan, RunResult, TestEngine};
use crate::errors::HarnessError;
use crate::fs::{EntryKind, FileSystem, OsFileSystem};
use crate::hook::{DetectedHook, ModuleLoader, detect_hook};
use crate::path::RootPath;
use crate::registry::{CleanupReport, RunRegistry};
use crate::synthesis::{ArtifactName, SynthesizedArtifact, Synthesizer};

/// Result of a completed run.
#[derive(Debug)]
pub struct RunOutcome {
    /// Artifacts generated (all already removed)
    pub artifacts: Vec<SynthesizedArtifact>,
    /// The engine's own verdict
    pub result: RunResult,
    pub cleanup: CleanupReport,
}

/// The inline-test harness.
pub struct Harness<L, E, F = OsFileSystem> {
    config: HarnessConfig,
    loader: L,
    engine: E,
    fs: F,
}

impl<L: ModuleLoader, E: TestEngine> Harness<L, E, OsFileSystem> {
    pub fn new(config: HarnessConfig, loader: L, engine: E) -> Self {
        Self {
            config,
            loader,
            engine,
            fs: OsFileSystem,
        }
    }
}

impl<L: ModuleLoader, E: TestEngine, F: FileSystem> Harness<L, E, F> {
    /// Swap the filesystem implementation.
    pub fn with_fs<G: FileSystem>(self, fs: G) -> Harness<L, E, G> {
        Harness {
            config: self.config,
            loader: self.loader,
            engine: self.engine,
            fs,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn root_dir(&self, root: &RootPath) -> PathBuf {
        self.config.base_dir.join(root.as_path())
    }

    /// Run every inline test under `root`.
    ///
    /// ## Errors
    ///
    /// Returns the first stage error ([`HarnessError::Discovery`],
    /// [`HarnessError::ModuleLoad`], [`HarnessError::Synthesis`] or
    /// [`HarnessError::Execution`]). Generated files are removed before this
    /// returns, whether it succeeds or fails. Failing tests are not an error;
    /// check [`RunOutcome::result`].
    #[tracing::instrument(skip_all, fields(root = %root))]
    pub async fn run(&self, root: &RootPath) -> Result<RunOutcome, HarnessError> {
        let mut registry = RunRegistry::new(&self.fs);
        let result = self.run_stages(root, &mut registry).await;

        let cleanup = registry.cleanup();
        if !cleanup.is_clean() {
            tracing::warn!(failed = cleanup.failures.len(), "cleanup left generated files behind");
        }

        let result = result?;
        Ok(RunOutcome {
            artifacts: registry.artifacts().to_vec(),
            result,
            cleanup,
        })
    }

    async fn run_stages(&self, root: &RootPath, registry: &mut RunRegistry<'_, F>) -> Result<RunResult, HarnessError> {
        let candidates = discover(&self.fs, &self.root_dir(root), &self.config)?;
        tracing::info!(modules = candidates.len(), "discovered modules");

        let synthesizer = Synthesizer::new(&self.fs, &self.config);
        for candidate in candidates.iter().filter(|c| !self.is_own_output(c)) {
            if let Some(hook) = detect_hook(&self.loader, candidate).await? {
                synthesizer.synthesize(&hook, registry)?;
            }
        }
        tracing::info!(artifacts = registry.len(), "synthesized inline test artifacts");

        let plan = ExecutionPlan {
            working_dir: self.config.base_dir.clone(),
            scratch_dir: self.config.scratch_dir.clone(),
            placement: self.config.placement,
            artifact_count: registry.len(),
        };
        self.engine.run(&plan).await
    }

    /// Artifacts from this or another run, which must never be loaded as modules.
    fn is_own_output(&self, candidate: &Candidate) -> bool {
        let path = &candidate.source_path;
        let own = is_generated(path, &self.config.marker) || path.starts_with(self.config.scratch_path());
        if own {
            tracing::debug!(path = %path.display(), "skipping generated artifact");
        }
        own
    }

    /// Discover and detect only; nothing is written.
    ///
    /// ## Errors
    ///
    /// Same as the first two stages of [`Harness::run`].
    #[tracing::instrument(skip_all, fields(root = %root))]
    pub async fn list(&self, root: &RootPath) -> Result<Vec<DetectedHook>, HarnessError> {
        let candidates = discover(&self.fs, &self.root_dir(root), &self.config)?;

        let mut hooks = Vec::new();
        for candidate in candidates.iter().filter(|c| !self.is_own_output(c)) {
            if let Some(hook) = detect_hook(&self.loader, candidate).await? {
                hooks.push(hook);
            }
        }
        Ok(hooks)
    }

    /// Remove artifacts orphaned by an interrupted run.
    ///
    /// Sweeps files named `<12 hex>.<marker>.<ext>` from the scratch directory
    /// and from the source tree under `root`, then removes the scratch directory
    /// if it is left empty.
    ///
    /// ## Errors
    ///
    /// Returns [`HarnessError::Discovery`] if `root` cannot be walked and
    /// [`HarnessError::Clean`] if the scratch directory cannot be listed.
    /// Individual removal failures are reported in the returned [`CleanupReport`].
    #[tracing::instrument(skip_all, fields(root = %root))]
    pub fn clean(&self, root: &RootPath) -> Result<CleanupReport, HarnessError> {
        let mut report = CleanupReport::default();
        let marker = &self.config.marker;

        for candidate in discover(&self.fs, &self.root_dir(root), &self.config)? {
            if is_generated(&candidate.source_path, marker) {
                report.remove_file(&self.fs, &candidate.source_path);
            }
        }

        let scratch = self.config.scratch_path();
        match self.fs.read_dir(&scratch) {
            Ok(entries) => {
                for entry in entries {
                    if entry.kind == EntryKind::File && is_generated(&entry.path, marker) {
                        report.remove_file(&self.fs, &entry.path);
                    }
                }
                report.remove_empty_dir(&self.fs, &scratch);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(HarnessError::Clean { path: scratch, source }),
        }

        tracing::info!(removed = report.removed.len(), "swept orphaned artifacts");
        Ok(report)
    }
}

fn is_generated(path: &Path, marker: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| ArtifactName::parse(name, marker).is_some())
}
