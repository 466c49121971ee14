//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::path::Path;

use crate::config::HarnessConfig;
use crate::engine::{CommandEngine, TestEngine};
use crate::errors::HarnessError;
use crate::fs::FileSystem;
use crate::hook::{DetectedHook, ModuleLoader, NodeModuleLoader};
use crate::path::RootPath;
use crate::registry::CleanupReport;
use crate::runner::{Harness, RunOutcome};

use super::{CliError, CliResult, ExitCode};

fn build_harness(config: HarnessConfig) -> Harness<NodeModuleLoader, CommandEngine> {
    let loader = NodeModuleLoader::new(&config.loader);
    let engine = CommandEngine::new(config.engine.clone());
    Harness::new(config, loader, engine)
}

/// Run every inline test under `root`.
///
/// Ctrl-C drops the in-flight run, which removes its artifacts, and exits with 130.
pub async fn run_tests(root: &RootPath, config: HarnessConfig) -> CliResult<ExitCode> {
    let harness = build_harness(config);

    let outcome = run_until_interrupted(&harness, root, ctrl_c()).await?;

    print_cleanup_failures(&outcome.cleanup);

    if outcome.result.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        // The engine already reported the failures; forward its exit code
        let code = outcome.result.status_code.filter(|c| *c != 0).unwrap_or(ExitCode::FAILURE.0);
        Err(CliError::new("", ExitCode(code)))
    }
}

/// Race the run against `interrupt`; losing the race drops the run, which removes its artifacts.
async fn run_until_interrupted<L, E, F>(
    harness: &Harness<L, E, F>,
    root: &RootPath,
    interrupt: impl Future<Output = ()>,
) -> Result<RunOutcome, HarnessError>
where
    L: ModuleLoader,
    E: TestEngine,
    F: FileSystem,
{
    tokio::select! {
        outcome = harness.run(root) => outcome,
        () = interrupt => Err(HarnessError::Interrupted),
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Print the modules under `root` that export a self-test hook.
pub async fn list_hooks(root: &RootPath, config: HarnessConfig) -> CliResult<ExitCode> {
    let base_dir = config.base_dir.clone();
    let harness = build_harness(config);

    let hooks = harness.list(root).await?;
    if hooks.is_empty() {
        eprintln!("No inline tests found under '{}'", root);
    } else {
        println!("{}", format_hook_list(&hooks, &base_dir));
    }
    Ok(ExitCode::SUCCESS)
}

/// Remove generated files orphaned by an interrupted run.
pub fn clean_orphans(root: &RootPath, config: HarnessConfig) -> CliResult<ExitCode> {
    let harness = build_harness(config);

    let report = harness.clean(root)?;
    for path in &report.removed {
        println!("removed {}", path.display());
    }
    println!("{} path(s) removed", report.removed.len());

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        print_cleanup_failures(&report);
        Err(CliError::new("", ExitCode::FAILURE))
    }
}

/// One line per hooked module, relative to `base_dir` where possible.
pub fn format_hook_list(hooks: &[DetectedHook], base_dir: &Path) -> String {
    let mut lines: Vec<String> = hooks
        .iter()
        .map(|hook| {
            let path = &hook.candidate.source_path;
            let shown = path.strip_prefix(base_dir).unwrap_or(path);
            format!("{}::{}", shown.display(), hook.export_name())
        })
        .collect();
    lines.push(format!("{} module(s) with inline tests", hooks.len()));
    lines.join("\n")
}

fn print_cleanup_failures(report: &CleanupReport) {
    for failure in &report.failures {
        eprintln!(
            "warning: could not remove generated file {}: {}",
            failure.path.display(),
            failure.error
        );
    }
}
