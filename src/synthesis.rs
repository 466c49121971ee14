//! Test artifact synthesis
//!
//! For every module with a hook, writes a copy of the module's source with one
//! trailing hook call:
//!
//! ```text
//! <original source>\nunitTests();
//! ```
//!
//! The copy is named `<12 hex>.<marker>.<ext>` and written to the scratch
//! directory. With [`Placement::Sibling`] a second entry with the same name is
//! created next to the original (a hard link, or a copy when linking is not
//! possible), so the engine's own discovery picks it up and relative imports
//! resolve exactly as they do from the original.
//!
//! The original file is only ever read. Each path is added to the
//! [`RunRegistry`] as soon as it exists, so cleanup removes exactly what was
//! created. When the sibling step fails the scratch copy is removed on the
//! spot; its registry entry stays behind in case that removal fails too.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use rand::RngCore;
use rand::rngs::OsRng;

use crate::config::{HarnessConfig, LinkMode, Placement};
use crate::errors::HarnessError;
use crate::fs::FileSystem;
use crate::hook::{DetectedHook, HOOK_INVOCATION};
use crate::registry::RunRegistry;

/// Random bytes per artifact name (48 bits, 12 hex characters).
pub const NAME_ENTROPY_BYTES: usize = 6;

/// Fresh names drawn before giving up on `AlreadyExists`.
const MAX_NAME_ATTEMPTS: usize = 3;

/// Maximum source file size (100 MB)
///
/// Files larger than this are rejected to prevent out-of-memory conditions
/// while building the artifact.
const MAX_SOURCE_SIZE: u64 = 100 * 1024 * 1024;

/// Build artifact content: the original source, a newline, and the hook call.
pub fn artifact_content(source: &str) -> String {
    let mut content = String::with_capacity(source.len() + 1 + HOOK_INVOCATION.len());
    content.push_str(source);
    content.push('\n');
    content.push_str(HOOK_INVOCATION);
    content
}

// ============================================================================
// Artifact names
// ============================================================================

/// `<hex>.<marker>.<ext>` file name of a generated artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactName {
    id: String,
    marker: String,
    extension: String,
}

impl ArtifactName {
    /// Draw a name from the OS random source.
    pub fn random(marker: &str, extension: &str) -> Self {
        let mut bytes = [0u8; NAME_ENTROPY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self::from_bytes(bytes, marker, extension)
    }

    pub fn from_bytes(bytes: [u8; NAME_ENTROPY_BYTES], marker: &str, extension: &str) -> Self {
        let id = bytes.iter().map(|b| format!("{b:02x}")).collect();
        Self {
            id,
            marker: marker.to_string(),
            extension: extension.to_string(),
        }
    }

    /// Recognize a generated file name for the given marker.
    ///
    /// Used by the orphan sweep; only names this module could have produced match.
    pub fn parse(file_name: &str, marker: &str) -> Option<Self> {
        let (id, rest) = file_name.split_once('.')?;
        let extension = rest.strip_prefix(marker)?.strip_prefix('.')?;

        let id_is_hex = id.len() == NAME_ENTROPY_BYTES * 2
            && id.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !id_is_hex || extension.is_empty() || extension.contains('.') {
            return None;
        }

        Some(Self {
            id: id.to_string(),
            marker: marker.to_string(),
            extension: extension.to_string(),
        })
    }

    /// The random hex identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}.{}", self.id, self.marker, self.extension)
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.id, self.marker, self.extension)
    }
}

// ============================================================================
// Synthesized artifacts
// ============================================================================

/// Files generated for one hooked module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedArtifact {
    /// Artifact in the scratch directory
    pub temporary_content_path: PathBuf,
    /// Same-content alias next to the original source (sibling placement)
    pub linked_path: Option<PathBuf>,
    /// Directory of the original source
    pub containing_directory: PathBuf,
    /// The module the artifact was generated from
    pub original_source: PathBuf,
}

/// Writes artifacts according to the configured placement.
pub struct Synthesizer<'a, F: FileSystem> {
    fs: &'a F,
    config: &'a HarnessConfig,
    scratch_dir: PathBuf,
}

impl<'a, F: FileSystem> Synthesizer<'a, F> {
    pub fn new(fs: &'a F, config: &'a HarnessConfig) -> Self {
        Self {
            fs,
            config,
            scratch_dir: config.scratch_path(),
        }
    }

    /// Synthesize the artifact for `hook`, recording every created path in `registry`.
    ///
    /// ## Errors
    ///
    /// Returns [`HarnessError::Synthesis`] if the source cannot be read, the
    /// scratch directory cannot be created, or the write/alias step fails.
    /// Paths created before the failure stay registered for cleanup.
    #[tracing::instrument(skip_all, fields(source = %hook.candidate.source_path.display()))]
    pub fn synthesize(
        &self,
        hook: &DetectedHook,
        registry: &mut RunRegistry<'_, F>,
    ) -> Result<SynthesizedArtifact, HarnessError> {
        let candidate = &hook.candidate;
        let source_path = &candidate.source_path;

        let source = self.read_source(source_path)?;
        let content = artifact_content(&source);

        self.ensure_scratch_dir(registry)
            .map_err(|e| HarnessError::synthesis(source_path, "cannot create scratch directory", e))?;

        let (name, temporary_content_path) = self.write_scratch(candidate.extension(), &content, registry)?;
        tracing::debug!(artifact = %temporary_content_path.display(), "wrote scratch artifact");

        let artifact = registry.record(SynthesizedArtifact {
            temporary_content_path,
            linked_path: None,
            containing_directory: candidate.containing_directory.clone(),
            original_source: source_path.clone(),
        });

        if self.config.placement == Placement::Sibling {
            let link = candidate.containing_directory.join(name.file_name());
            if let Err(e) = self.create_alias(&artifact.temporary_content_path, &link, &content) {
                // the registry entry still covers the scratch copy if this removal fails
                if let Err(remove_err) = self.fs.remove_file(&artifact.temporary_content_path) {
                    tracing::warn!(
                        path = %artifact.temporary_content_path.display(),
                        error = %remove_err,
                        "could not remove scratch artifact; left for cleanup"
                    );
                }
                return Err(HarnessError::synthesis(source_path, "cannot place artifact next to source", e));
            }
            tracing::debug!(link = %link.display(), "placed sibling artifact");
            artifact.linked_path = Some(link);
        }

        Ok(artifact.clone())
    }

    fn read_source(&self, path: &Path) -> Result<String, HarnessError> {
        let len = self
            .fs
            .file_len(path)
            .map_err(|e| HarnessError::synthesis(path, "cannot access source", e))?;
        if len > MAX_SOURCE_SIZE {
            return Err(HarnessError::synthesis(
                path,
                format!("source is too large ({len} bytes, max {MAX_SOURCE_SIZE} bytes)"),
                io::Error::new(io::ErrorKind::InvalidData, "source too large"),
            ));
        }
        self.fs
            .read_to_string(path)
            .map_err(|e| HarnessError::synthesis(path, "cannot read source", e))
    }

    fn ensure_scratch_dir(&self, registry: &mut RunRegistry<'_, F>) -> io::Result<()> {
        if self.fs.is_dir(&self.scratch_dir) {
            return Ok(());
        }
        self.fs.create_dir_all(&self.scratch_dir)?;
        registry.record_created_dir(&self.scratch_dir);
        Ok(())
    }

    /// Write `content` under a fresh name, redrawing on collision.
    fn write_scratch(
        &self,
        extension: &str,
        content: &str,
        registry: &mut RunRegistry<'_, F>,
    ) -> Result<(ArtifactName, PathBuf), HarnessError> {
        let mut attempt = 1;
        loop {
            let name = ArtifactName::random(&self.config.marker, extension);
            let path = self.scratch_dir.join(name.file_name());

            let written = match self.fs.write_new(&path, content) {
                // A concurrent run removed the scratch directory after we created it
                Err(e) if e.kind() == io::ErrorKind::NotFound => self
                    .ensure_scratch_dir(registry)
                    .and_then(|()| self.fs.write_new(&path, content)),
                other => other,
            };

            match written {
                Ok(()) => return Ok((name, path)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                    tracing::warn!(path = %path.display(), "artifact name collision; drawing a new name");
                    attempt += 1;
                }
                Err(e) => return Err(HarnessError::synthesis(&path, "cannot write artifact", e)),
            }
        }
    }

    fn create_alias(&self, original: &Path, link: &Path, content: &str) -> io::Result<()> {
        match self.config.link_mode {
            LinkMode::Hard => self.fs.hard_link(original, link),
            LinkMode::Copy => self.fs.write_new(link, content),
            LinkMode::HardOrCopy => match self.fs.hard_link(original, link) {
                Err(e) if link_unsupported(&e) => {
                    tracing::debug!(error = %e, "hard link unavailable; copying instead");
                    self.fs.write_new(link, content)
                }
                other => other,
            },
        }
    }
}

fn link_unsupported(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::CrossesDevices | io::ErrorKind::Unsupported)
}
