//! CLI module for inlinetest
//!
//! ## Commands
//!
//! - `run <root>` - Synthesize inline test artifacts, run the engine once, clean up
//! - `list <root>` - Show which modules export a self-test hook
//! - `clean <root>` - Remove artifacts orphaned by an interrupted run
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros. The root
//! argument is parsed straight into a [`RootPath`], so a malformed root is
//! rejected before anything touches the filesystem.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{EngineConfig, HarnessConfig, LinkMode, LoaderConfig, Placement};
use crate::errors::HarnessError;
use crate::path::RootPath;
use crate::version::INLINETEST_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
    /// Conventional 128 + SIGINT
    pub const INTERRUPTED: ExitCode = ExitCode(130);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl From<HarnessError> for CliError {
    fn from(err: HarnessError) -> Self {
        let exit_code = match err {
            HarnessError::Interrupted => ExitCode::INTERRUPTED,
            _ => ExitCode::FAILURE,
        };
        Self::new(format!("{:?}", miette::Report::new(err)), exit_code)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Run the self-tests embedded in source modules
#[derive(Parser, Debug)]
#[command(name = "inlinetest")]
#[command(version = INLINETEST_VERSION)]
#[command(about = "Run the self-tests embedded in source modules", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Synthesize inline test files, run the test engine, and clean up
    ///
    /// Modules are imported with plain `node`; TypeScript sources need a
    /// loader, for example `--node-arg --import=tsx`.
    Run {
        /// Relative root directory to scan (letters, digits, '.', separated by '/')
        #[arg(value_name = "ROOT")]
        root: RootPath,
        #[command(flatten)]
        options: HarnessArgs,
    },

    /// List modules that export a self-test hook
    List {
        /// Relative root directory to scan
        #[arg(value_name = "ROOT")]
        root: RootPath,
        #[command(flatten)]
        options: HarnessArgs,
    },

    /// Remove generated files left behind by an interrupted run
    ///
    /// Any file named `<12 hex digits>.<marker>.<ext>` under ROOT or in the
    /// scratch directory is treated as generated and removed.
    Clean {
        /// Relative root directory to sweep
        #[arg(value_name = "ROOT")]
        root: RootPath,
        #[command(flatten)]
        options: HarnessArgs,
    },
}

/// Artifact placement strategy
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementArg {
    /// Scratch directory only; the engine is pointed at it
    Scratch,
    /// Scratch directory plus an alias next to each source file
    Sibling,
}

impl From<PlacementArg> for Placement {
    fn from(arg: PlacementArg) -> Self {
        match arg {
            PlacementArg::Scratch => Placement::Scratch,
            PlacementArg::Sibling => Placement::Sibling,
        }
    }
}

/// How sibling aliases are created
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkArg {
    Hard,
    HardOrCopy,
    Copy,
}

impl From<LinkArg> for LinkMode {
    fn from(arg: LinkArg) -> Self {
        match arg {
            LinkArg::Hard => LinkMode::Hard,
            LinkArg::HardOrCopy => LinkMode::HardOrCopy,
            LinkArg::Copy => LinkMode::Copy,
        }
    }
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct HarnessArgs {
    /// Directory ROOT is resolved against; also the engine's working directory
    #[arg(long, value_name = "DIR", default_value = ".", env = "INLINETEST_BASE_DIR")]
    pub base_dir: PathBuf,

    /// Scratch directory for generated files (relative to --base-dir)
    #[arg(long, value_name = "DIR", default_value = ".inlinetest", env = "INLINETEST_SCRATCH_DIR")]
    pub scratch_dir: PathBuf,

    /// Source extensions to scan (repeatable or comma-separated)
    #[arg(long = "ext", value_name = "EXT", value_delimiter = ',', default_values_t = ["js".to_string(), "ts".to_string()])]
    pub extensions: Vec<String>,

    /// Marker in generated file names: <hex>.<marker>.<ext>
    #[arg(long, value_name = "MARKER", default_value = "test", env = "INLINETEST_MARKER")]
    pub marker: String,

    /// Where generated files are placed
    #[arg(long, value_enum, default_value_t = PlacementArg::Sibling)]
    pub placement: PlacementArg,

    /// How sibling files are created
    #[arg(long = "link", value_enum, default_value_t = LinkArg::HardOrCopy)]
    pub link: LinkArg,

    /// Test engine command line (split on whitespace)
    #[arg(long, value_name = "COMMAND", default_value = "npx jest", env = "INLINETEST_ENGINE")]
    pub engine: String,

    /// Extra engine argument, passed verbatim (repeatable)
    #[arg(long = "engine-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,

    /// Do not pass the scratch directory to the engine (for engines without Jest's flags)
    #[arg(long)]
    pub no_scratch_flags: bool,

    /// JavaScript runtime used to load modules
    #[arg(long, value_name = "PROGRAM", default_value = "node", env = "INLINETEST_NODE")]
    pub node: String,

    /// Extra runtime argument for module loading, e.g. `--import=tsx` (repeatable)
    #[arg(long = "node-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub node_args: Vec<String>,
}

impl HarnessArgs {
    /// Build the harness configuration from the parsed flags.
    pub fn to_config(&self) -> CliResult<HarnessConfig> {
        let mut words = self.engine.split_whitespace().map(str::to_string);
        let Some(program) = words.next() else {
            return Err(CliError::failure("Error: --engine must name a program"));
        };
        let mut args: Vec<String> = words.collect();
        args.extend(self.engine_args.iter().cloned());

        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            program,
            args,
            scratch_root_flag: if self.no_scratch_flags { None } else { defaults.scratch_root_flag },
            scratch_ignore_flag: if self.no_scratch_flags { None } else { defaults.scratch_ignore_flag },
            ignore_patterns: defaults.ignore_patterns,
        };

        // engine paths resolve against base_dir, never the caller's cwd
        let base_dir = std::path::absolute(&self.base_dir).map_err(|e| {
            CliError::failure(format!(
                "Error: cannot resolve --base-dir '{}': {e}",
                self.base_dir.display()
            ))
        })?;

        let config = HarnessConfig::new()
            .with_base_dir(base_dir)
            .with_scratch_dir(&self.scratch_dir)
            .with_extensions(&self.extensions)
            .with_marker(&self.marker)
            .with_placement(self.placement.into())
            .with_link_mode(self.link.into())
            .with_engine(engine)
            .with_loader(LoaderConfig {
                program: self.node.clone(),
                args: self.node_args.clone(),
            });

        if config.extensions.is_empty() {
            return Err(CliError::failure("Error: at least one --ext is required"));
        }
        if config.marker.is_empty() || !config.marker.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CliError::failure(format!(
                "Error: --marker '{}' must be letters and digits only",
                config.marker
            )));
        }
        Ok(config)
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub async fn run() {
    let cli = Cli::parse();

    match execute(cli).await {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
async fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::Run { root, options } => commands::run_tests(&root, options.to_config()?).await,
        Command::List { root, options } => commands::list_hooks(&root, options.to_config()?).await,
        Command::Clean { root, options } => commands::clean_orphans(&root, options.to_config()?),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::try_parse_from(["inlinetest", "run", "src"]).unwrap();
        if let Command::Run { root, options } = cli.command {
            assert_eq!(root.as_str(), "src");
            assert_eq!(options.placement, PlacementArg::Sibling);
            assert_eq!(options.link, LinkArg::HardOrCopy);
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_rejects_escaping_root() {
        assert!(Cli::try_parse_from(["inlinetest", "run", "../etc"]).is_err());
        assert!(Cli::try_parse_from(["inlinetest", "run", "/etc"]).is_err());
        assert!(Cli::try_parse_from(["inlinetest", "list", "src;rm"]).is_err());
    }

    #[test]
    fn test_cli_parse_list_and_clean() {
        let cli = Cli::try_parse_from(["inlinetest", "list", "./lib"]).unwrap();
        assert!(matches!(cli.command, Command::List { .. }));

        let cli = Cli::try_parse_from(["inlinetest", "clean", "."]).unwrap();
        assert!(matches!(cli.command, Command::Clean { .. }));
    }

    #[test]
    fn test_cli_options_to_config() {
        let cli = Cli::try_parse_from([
            "inlinetest",
            "run",
            "src",
            "--placement",
            "scratch",
            "--link",
            "copy",
            "--ext",
            "mjs,cjs",
            "--engine",
            "npx vitest run",
            "--engine-arg",
            "--reporter=dot",
            "--no-scratch-flags",
            "--node-arg",
            "--import=tsx",
        ])
        .unwrap();
        let Command::Run { options, .. } = cli.command else {
            panic!("Expected Run command");
        };

        let config = options.to_config().unwrap();
        assert_eq!(config.placement, Placement::Scratch);
        assert_eq!(config.link_mode, LinkMode::Copy);
        assert_eq!(config.extensions, vec!["mjs", "cjs"]);
        assert_eq!(config.engine.program, "npx");
        assert_eq!(config.engine.args, vec!["vitest", "run", "--reporter=dot"]);
        assert_eq!(config.engine.scratch_root_flag, None);
        assert_eq!(config.loader.args, vec!["--import=tsx"]);
    }

    #[test]
    fn test_cli_rejects_bad_marker() {
        let cli = Cli::try_parse_from(["inlinetest", "run", "src", "--marker", "a.b"]).unwrap();
        let Command::Run { options, .. } = cli.command else {
            panic!("Expected Run command");
        };
        assert!(options.to_config().is_err());
    }

    #[test]
    fn test_relative_base_dir_is_made_absolute() {
        let cli = Cli::try_parse_from(["inlinetest", "run", "src", "--base-dir", "proj"]).unwrap();
        let Command::Run { options, .. } = cli.command else {
            panic!("Expected Run command");
        };

        let config = options.to_config().unwrap();
        assert!(config.base_dir.is_absolute());
        assert!(config.base_dir.ends_with("proj"));
        assert_eq!(config.scratch_path(), config.base_dir.join(".inlinetest"));
    }

    #[test]
    fn test_marker_must_be_alphanumeric() {
        for (marker, ok) in [("test", true), ("spec2", true), ("a.b", false), ("a/b", false), ("", false), ("é", false)] {
            let cli = Cli::try_parse_from(["inlinetest", "run", "src", "--marker", marker]).unwrap();
            let Command::Run { options, .. } = cli.command else {
                panic!("Expected Run command");
            };
            assert_eq!(options.to_config().is_ok(), ok, "{marker:?}");
        }
    }

    #[test]
    fn test_interrupted_maps_to_130() {
        let err = CliError::from(HarnessError::Interrupted);
        assert_eq!(err.exit_code, ExitCode::INTERRUPTED);
        assert!(err.message.contains("interrupted"));
    }
}
