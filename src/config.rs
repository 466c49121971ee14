//! Harness configuration
//!
//! Defaults target a Node.js project tested with Jest: `.js`/`.ts` sources,
//! `<hex>.test.<ext>` artifacts, and `npx jest` as the engine.

use std::path::{Path, PathBuf};

/// Where synthesized artifacts are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// Only in the scratch directory; the engine is pointed at it explicitly.
    Scratch,
    /// In the scratch directory plus a same-content alias next to the original source,
    /// so the engine's own test discovery finds it and relative imports keep working.
    #[default]
    Sibling,
}

/// How the sibling alias is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkMode {
    /// Hard link only; fail when the filesystem refuses it.
    Hard,
    /// Hard link, falling back to a copy across filesystems.
    #[default]
    HardOrCopy,
    /// Always copy.
    Copy,
}

/// External test engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Program to launch
    pub program: String,
    /// Arguments passed before any harness-supplied flags
    pub args: Vec<String>,
    /// Flag used to point the engine at the scratch directory (scratch placement)
    pub scratch_root_flag: Option<String>,
    /// Flag used to hide the scratch directory from the engine (sibling placement)
    pub scratch_ignore_flag: Option<String>,
    /// Patterns passed with `scratch_ignore_flag` ahead of the scratch directory.
    ///
    /// Jest drops its built-in `/node_modules/` pattern once the flag is given,
    /// so the default restores it.
    pub ignore_patterns: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "npx".to_string(),
            args: vec!["jest".to_string()],
            scratch_root_flag: Some("--roots".to_string()),
            scratch_ignore_flag: Some("--testPathIgnorePatterns".to_string()),
            ignore_patterns: vec!["/node_modules/".to_string()],
        }
    }
}

/// Module loader (probe) invocation.
///
/// Plain `node` imports `.js` only. TypeScript sources need a loader flag in
/// `args`, for example `--import=tsx`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// JavaScript runtime used to import modules
    pub program: String,
    /// Extra runtime flags (for example a TypeScript loader)
    pub args: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            program: "node".to_string(),
            args: Vec::new(),
        }
    }
}

/// Harness configuration
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Directory the root argument is resolved against; also the engine's working directory
    pub base_dir: PathBuf,
    /// Scratch directory, relative to `base_dir` unless absolute
    pub scratch_dir: PathBuf,
    /// Recognized source extensions, without the leading dot
    pub extensions: Vec<String>,
    /// Marker inserted between the random name and the extension
    pub marker: String,
    pub placement: Placement,
    pub link_mode: LinkMode,
    pub engine: EngineConfig,
    pub loader: LoaderConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            scratch_dir: PathBuf::from(".inlinetest"),
            extensions: vec!["js".to_string(), "ts".to_string()],
            marker: "test".to_string(),
            placement: Placement::default(),
            link_mode: LinkMode::default(),
            engine: EngineConfig::default(),
            loader: LoaderConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Replace the recognized extensions. Leading dots are stripped.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_link_mode(mut self, mode: LinkMode) -> Self {
        self.link_mode = mode;
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_loader(mut self, loader: LoaderConfig) -> Self {
        self.loader = loader;
        self
    }

    /// Scratch directory resolved against `base_dir`.
    pub fn scratch_path(&self) -> PathBuf {
        if self.scratch_dir.is_absolute() {
            self.scratch_dir.clone()
        } else {
            self.base_dir.join(&self.scratch_dir)
        }
    }

    /// Whether `path` has one of the recognized source extensions.
    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|known| known == ext))
    }
}
