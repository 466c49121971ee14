//! Harness error taxonomy
//!
//! One variant per lifecycle stage. Every variant names the file or directory
//! it failed on, so the caller can tell which stage broke and where.
//!
//! Test failures reported by the engine are *not* errors; they travel back as
//! [`RunResult`](crate::engine::RunResult).

use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised by the discovery → synthesis → execution → cleanup lifecycle.
#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("invalid root path '{value}': {reason}")]
    #[diagnostic(
        code(inlinetest::invalid_path),
        help("use a relative path built from letters, digits and '.', separated by '/' (for example `src/lib`)")
    )]
    InvalidPath { value: String, reason: String },

    #[error("failed to discover modules under '{}'", path.display())]
    #[diagnostic(code(inlinetest::discovery))]
    Discovery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to load module '{}': {message}", path.display())]
    #[diagnostic(
        code(inlinetest::module_load),
        help("the module itself is broken; fix it before running its inline tests")
    )]
    ModuleLoad { path: PathBuf, message: String },

    #[error("failed to synthesize test artifact for '{}': {reason}", path.display())]
    #[diagnostic(code(inlinetest::synthesis))]
    Synthesis {
        path: PathBuf,
        reason: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to launch test engine '{program}'")]
    #[diagnostic(
        code(inlinetest::execution),
        help("check that the engine is installed, or pick another one with --engine")
    )]
    Execution {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("run interrupted; generated artifacts were removed")]
    #[diagnostic(code(inlinetest::interrupted))]
    Interrupted,

    #[error("failed to sweep orphaned artifacts under '{}'", path.display())]
    #[diagnostic(code(inlinetest::clean))]
    Clean {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl HarnessError {
    pub(crate) fn invalid_path(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn synthesis(path: impl Into<PathBuf>, reason: impl Into<String>, source: io::Error) -> Self {
        Self::Synthesis {
            path: path.into(),
            reason: reason.into(),
            source,
        }
    }

    /// Short, stable name of the lifecycle stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidPath { .. } => "path validation",
            Self::Discovery { .. } => "discovery",
            Self::ModuleLoad { .. } => "module loading",
            Self::Synthesis { .. } => "synthesis",
            Self::Execution { .. } => "execution",
            Self::Interrupted => "interrupted",
            Self::Clean { .. } => "clean",
        }
    }
}

/// Result type for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;
