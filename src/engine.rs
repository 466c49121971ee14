//! Test engine invocation
//!
//! The engine (Jest by default) is launched exactly once per run, after every
//! artifact has been written. The harness never looks at test results itself:
//! the engine's exit status is passed back unchanged as a [`RunResult`].

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use crate::config::{EngineConfig, Placement};
use crate::errors::HarnessError;

/// What the engine needs to know about the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Engine working directory
    pub working_dir: PathBuf,
    /// Scratch directory, relative to `working_dir` unless absolute
    pub scratch_dir: PathBuf,
    pub placement: Placement,
    /// Number of artifacts synthesized (informational)
    pub artifact_count: usize,
}

/// Exit signal reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    /// Exit code, or `None` if the engine was terminated by a signal
    pub status_code: Option<i32>,
}

impl RunResult {
    pub fn passed(&self) -> bool {
        self.status_code == Some(0)
    }
}

/// Runs the discovered test suite.
#[allow(async_fn_in_trait)]
pub trait TestEngine {
    /// Run the suite and wait for completion.
    ///
    /// Returns `Err` only when the engine cannot be started; failing tests are an `Ok` result.
    async fn run(&self, plan: &ExecutionPlan) -> Result<RunResult, HarnessError>;
}

/// Launches the engine as a subprocess with inherited stdio.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    config: EngineConfig,
}

impl CommandEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Arguments for `plan`: the configured args, then the scratch-directory flag for the placement.
    pub fn command_args(&self, plan: &ExecutionPlan) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.config.args.iter().map(OsString::from).collect();

        match plan.placement {
            Placement::Scratch => {
                if let Some(flag) = &self.config.scratch_root_flag {
                    args.push(OsString::from(flag));
                    args.push(plan.scratch_dir.clone().into_os_string());
                }
            }
            Placement::Sibling => {
                if let Some(flag) = &self.config.scratch_ignore_flag {
                    args.push(OsString::from(flag));
                    args.extend(self.config.ignore_patterns.iter().map(OsString::from));
                    args.push(plan.scratch_dir.clone().into_os_string());
                }
            }
        }
        args
    }
}

impl Default for CommandEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl TestEngine for CommandEngine {
    #[tracing::instrument(skip_all, fields(program = %self.config.program, artifacts = plan.artifact_count))]
    async fn run(&self, plan: &ExecutionPlan) -> Result<RunResult, HarnessError> {
        let args = self.command_args(plan);
        tracing::debug!(?args, "launching test engine");

        let status = tokio::process::Command::new(&self.config.program)
            .args(&args)
            .current_dir(&plan.working_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| HarnessError::Execution {
                program: self.config.program.clone(),
                source,
            })?;

        tracing::debug!(%status, "test engine finished");
        Ok(RunResult {
            status_code: status.code(),
        })
    }
}
