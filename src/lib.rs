#![forbid(unsafe_code)]
//! inlinetest: run the self-tests that source modules carry next to their code
//!
//! A module opts in by exporting a zero-argument `unitTests` function. The
//! harness walks a source tree, probes each module for that export, writes a
//! temporary copy of every opted-in module with a trailing `unitTests();`
//! call, runs the external test engine once, and removes everything it wrote.
//!
//! ## Lifecycle
//!
//! ```text
//! RootPath ─▶ discover ─▶ detect_hook ─▶ Synthesizer ─▶ TestEngine ─▶ RunRegistry::cleanup
//!                                          │                              ▲
//!                                          └──────── records paths ───────┘
//! ```
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Cleanup**: `RunRegistry` removes generated files from `Drop` as well, so a panic or a cancelled run future
//!   still tears down its artifacts.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod hook;
pub mod path;
pub mod registry;
pub mod runner;
pub mod synthesis;
pub mod version;

pub use config::{EngineConfig, HarnessConfig, LinkMode, LoaderConfig, Placement};
pub use discovery::{Candidate, discover};
pub use engine::{CommandEngine, ExecutionPlan, RunResult, TestEngine};
pub use errors::{HarnessError, HarnessResult};
pub use fs::{EntryKind, FileSystem, OsFileSystem};
pub use hook::{DetectedHook, ExportKind, HOOK_EXPORT_NAME, LoadedModule, ModuleLoader, NodeModuleLoader, detect_hook};
pub use path::RootPath;
pub use registry::{CleanupReport, RunRegistry};
pub use runner::{Harness, RunOutcome};
pub use synthesis::{ArtifactName, SynthesizedArtifact, Synthesizer};
