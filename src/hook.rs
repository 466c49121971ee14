//! Self-test hook detection
//!
//! A module opts into inline testing by exporting a zero-argument function
//! named [`HOOK_EXPORT_NAME`]. Detection loads the module dynamically (no
//! manifest, no static import graph) and checks its export table for that one
//! name. There are no partial matches and no name variants.
//!
//! Loading goes through the [`ModuleLoader`] trait. [`NodeModuleLoader`] is
//! the production loader: it imports the file in a short-lived Node.js process
//! and reports the module's exports back as JSON.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;

use thiserror::Error;

use crate::config::LoaderConfig;
use crate::discovery::Candidate;
use crate::errors::HarnessError;

/// Reserved export name of the self-test hook.
pub const HOOK_EXPORT_NAME: &str = "unitTests";

/// Statement appended to synthesized artifacts.
pub const HOOK_INVOCATION: &str = "unitTests();";

/// Prefix of the probe's report line; anything the module prints itself is ignored.
const PROBE_SENTINEL: &str = "@@inlinetest-probe@@";

/// ES module evaluated by `node --input-type=module -e`. The target path is the last argv entry.
const NODE_PROBE: &str = r#"
import { pathToFileURL } from "node:url";
const target = process.argv[process.argv.length - 1];
const mod = await import(pathToFileURL(target).href);
const report = {};
for (const name of Object.keys(mod)) {
    const value = mod[name];
    report[name] = typeof value === "function"
        ? { kind: "function", arity: value.length }
        : { kind: typeof value };
}
process.stdout.write("\n@@inlinetest-probe@@" + JSON.stringify(report) + "\n", () => process.exit(0));
"#;

/// Shape of one exported binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportKind {
    /// Callable, with its declared parameter count
    Function { arity: u32 },
    /// Anything else, by its runtime type name (`object`, `string`, `undefined`, ...)
    Value(String),
}

impl ExportKind {
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function { .. })
    }
}

/// Export table of a loaded module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedModule {
    exports: BTreeMap<String, ExportKind>,
}

impl LoadedModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_export(mut self, name: impl Into<String>, kind: ExportKind) -> Self {
        self.exports.insert(name.into(), kind);
        self
    }

    pub fn export(&self, name: &str) -> Option<&ExportKind> {
        self.exports.get(name)
    }

    pub fn export_names(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }
}

/// A module failed to load (syntax error, exception during initialization, loader crash).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ModuleLoadFailure(pub String);

/// Loads a module by path and returns its export table.
#[allow(async_fn_in_trait)]
pub trait ModuleLoader {
    async fn load(&self, path: &Path) -> Result<LoadedModule, ModuleLoadFailure>;
}

/// A candidate whose module exports a callable hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedHook {
    pub candidate: Candidate,
    /// Declared parameter count of the hook (expected to be zero)
    pub arity: u32,
}

impl DetectedHook {
    pub fn export_name(&self) -> &'static str {
        HOOK_EXPORT_NAME
    }

    /// The zero-argument call appended to the synthesized artifact.
    pub fn invocation(&self) -> &'static str {
        HOOK_INVOCATION
    }
}

/// Load `candidate` and return its hook, if it exports one.
///
/// ## Errors
///
/// A module that fails to load is a real defect in the code under test, so the
/// failure is returned as [`HarnessError::ModuleLoad`] tagged with the file path
/// instead of being treated as "no hook".
#[tracing::instrument(skip_all, fields(path = %candidate.source_path.display()))]
pub async fn detect_hook(
    loader: &impl ModuleLoader,
    candidate: &Candidate,
) -> Result<Option<DetectedHook>, HarnessError> {
    let module = loader
        .load(&candidate.source_path)
        .await
        .map_err(|e| HarnessError::ModuleLoad {
            path: candidate.source_path.clone(),
            message: e.0,
        })?;

    match module.export(HOOK_EXPORT_NAME) {
        Some(ExportKind::Function { arity }) => {
            if *arity != 0 {
                tracing::warn!(arity, "hook declares parameters; it will be called with none");
            }
            tracing::debug!("hook detected");
            Ok(Some(DetectedHook {
                candidate: candidate.clone(),
                arity: *arity,
            }))
        }
        Some(ExportKind::Value(type_name)) => {
            tracing::debug!(%type_name, "hook export is not callable; ignoring");
            Ok(None)
        }
        None => Ok(None),
    }
}

// ============================================================================
// Node.js loader
// ============================================================================

/// Imports modules in a Node.js subprocess.
#[derive(Debug, Clone)]
pub struct NodeModuleLoader {
    program: String,
    args: Vec<String>,
}

impl NodeModuleLoader {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
        }
    }
}

impl Default for NodeModuleLoader {
    fn default() -> Self {
        Self::new(&LoaderConfig::default())
    }
}

impl ModuleLoader for NodeModuleLoader {
    async fn load(&self, path: &Path) -> Result<LoadedModule, ModuleLoadFailure> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg("--input-type=module")
            .arg("-e")
            .arg(NODE_PROBE)
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ModuleLoadFailure(format!("failed to launch '{}': {}", self.program, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(ModuleLoadFailure(if stderr.is_empty() {
                format!("module loader exited with {}", output.status)
            } else {
                stderr.to_string()
            }));
        }

        parse_probe_report(&stdout)
    }
}

/// Decode the sentinel line written by the probe.
fn parse_probe_report(stdout: &str) -> Result<LoadedModule, ModuleLoadFailure> {
    let Some(payload) = stdout.lines().rev().find_map(|line| line.strip_prefix(PROBE_SENTINEL)) else {
        return Err(ModuleLoadFailure("module loader produced no export report".to_string()));
    };

    let report: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| ModuleLoadFailure(format!("malformed export report: {}", e)))?;
    let Some(entries) = report.as_object() else {
        return Err(ModuleLoadFailure("export report is not an object".to_string()));
    };

    let mut module = LoadedModule::new();
    for (name, entry) in entries {
        let kind = entry.get("kind").and_then(|k| k.as_str()).unwrap_or("undefined");
        let export = if kind == "function" {
            let arity = entry
                .get("arity")
                .and_then(|a| a.as_u64())
                .and_then(|a| u32::try_from(a).ok())
                .unwrap_or(0);
            ExportKind::Function { arity }
        } else {
            ExportKind::Value(kind.to_string())
        };
        module = module.with_export(name.clone(), export);
    }
    Ok(module)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    struct FixedLoader(Result<LoadedModule, ModuleLoadFailure>);

    impl ModuleLoader for FixedLoader {
        async fn load(&self, _path: &Path) -> Result<LoadedModule, ModuleLoadFailure> {
            self.0.clone()
        }
    }

    fn candidate() -> Candidate {
        Candidate {
            source_path: PathBuf::from("/src/a.ts"),
            containing_directory: PathBuf::from("/src"),
        }
    }

    #[tokio::test]
    async fn test_detects_callable_hook() {
        let loader = FixedLoader(Ok(LoadedModule::new()
            .with_export("main", ExportKind::Function { arity: 1 })
            .with_export(HOOK_EXPORT_NAME, ExportKind::Function { arity: 0 })));

        let hook = detect_hook(&loader, &candidate()).await.unwrap().unwrap();
        assert_eq!(hook.candidate, candidate());
        assert_eq!(hook.export_name(), "unitTests");
        assert_eq!(hook.invocation(), "unitTests();");
    }

    #[tokio::test]
    async fn test_absent_hook_is_none() {
        let loader = FixedLoader(Ok(LoadedModule::new().with_export("main", ExportKind::Function { arity: 0 })));
        assert!(detect_hook(&loader, &candidate()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_callable_hook_is_none() {
        let loader = FixedLoader(Ok(
            LoadedModule::new().with_export(HOOK_EXPORT_NAME, ExportKind::Value("object".to_string()))
        ));
        assert!(detect_hook(&loader, &candidate()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_name_variants_do_not_match() {
        let loader = FixedLoader(Ok(LoadedModule::new()
            .with_export("unitTest", ExportKind::Function { arity: 0 })
            .with_export("UnitTests", ExportKind::Function { arity: 0 })
            .with_export("unitTestsHelper", ExportKind::Function { arity: 0 })));
        assert!(detect_hook(&loader, &candidate()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_failure_is_module_load_error() {
        let loader = FixedLoader(Err(ModuleLoadFailure("ReferenceError: x is not defined".to_string())));
        let err = detect_hook(&loader, &candidate()).await.unwrap_err();
        match err {
            HarnessError::ModuleLoad { path, message } => {
                assert_eq!(path, PathBuf::from("/src/a.ts"));
                assert!(message.contains("ReferenceError"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_probe_report_ignores_module_output() {
        let stdout = "hello from module\n{\"not\":\"the report\"}\n\
                      @@inlinetest-probe@@{\"unitTests\":{\"kind\":\"function\",\"arity\":0},\"VERSION\":{\"kind\":\"string\"}}\n";
        let module = parse_probe_report(stdout).unwrap();
        assert_eq!(module.export(HOOK_EXPORT_NAME), Some(&ExportKind::Function { arity: 0 }));
        assert_eq!(module.export("VERSION"), Some(&ExportKind::Value("string".to_string())));
        assert_eq!(module.export_names().collect::<Vec<_>>(), vec!["VERSION", "unitTests"]);
    }

    #[test]
    fn test_parse_probe_report_without_sentinel_fails() {
        assert!(parse_probe_report("{}\n").is_err());
        assert!(parse_probe_report("@@inlinetest-probe@@not json").is_err());
        assert!(parse_probe_report("@@inlinetest-probe@@[1,2]").is_err());
    }

    #[tokio::test]
    async fn test_missing_runtime_is_load_failure() {
        let loader = NodeModuleLoader::new(&LoaderConfig {
            program: "inlinetest-no-such-runtime".to_string(),
            args: Vec::new(),
        });
        let err = loader.load(Path::new("/src/a.ts")).await.unwrap_err();
        assert!(err.0.contains("failed to launch"));
    }
}
