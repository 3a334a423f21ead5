use crate::core::command::JobCommand;
use crate::core::error::LaunchError;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub const PYTHONPATH: &str = "PYTHONPATH";
pub const MODULEPATH: &str = "MODULEPATH";

/// argv[0] handed to the module shell so that `"$@"` holds the real command
const MODULE_SHELL_ARGV0: &str = "dclaunch";

/// What the child process environment should look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSpec {
    pub work_dir: PathBuf,
    /// Environment modules to load before running the command
    pub modules: Vec<String>,
    /// Shell used to evaluate `module load` (must provide the `module` function)
    pub module_shell: String,
    /// Entries prepended to `MODULEPATH`
    pub modulepath: Vec<PathBuf>,
    /// Entries prepended to `PYTHONPATH`
    pub pythonpath: Vec<PathBuf>,
    pub vars: BTreeMap<String, String>,
}

impl Default for EnvironmentSpec {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            modules: vec![],
            module_shell: "bash".to_string(),
            modulepath: vec![],
            pythonpath: vec![],
            vars: BTreeMap::new(),
        }
    }
}

/// A validated environment, ready to be applied to child processes.
#[derive(Debug, Clone)]
pub struct PreparedEnvironment {
    work_dir: PathBuf,
    modules: Vec<String>,
    module_shell: String,
    vars: Vec<(String, OsString)>,
}

/// Validates the working directory and computes the variables the child
/// will see. Nothing is changed in the current process.
pub fn configure_environment(spec: &EnvironmentSpec) -> Result<PreparedEnvironment, LaunchError> {
    if !spec.work_dir.is_dir() {
        return Err(LaunchError::MissingWorkDir(spec.work_dir.clone()));
    }

    // An explicit PYTHONPATH or MODULEPATH in `vars` replaces the inherited
    // value; the configured entries still go in front of it.
    let mut vars = Vec::new();
    let mut prepended = Vec::new();
    for (var, entries) in [(MODULEPATH, &spec.modulepath), (PYTHONPATH, &spec.pythonpath)] {
        let entries: Vec<PathBuf> = entries.iter().map(|p| spec.work_dir.join(p)).collect();
        let base = spec.vars.get(var).map(OsString::from).or_else(|| env::var_os(var));
        if let Some(value) = prepend_search_path(var, &entries, base)? {
            vars.push((var.to_string(), value));
            prepended.push(var);
        }
    }
    vars.extend(
        spec.vars
            .iter()
            .filter(|(key, _)| !prepended.iter().any(|var| *var == key.as_str()))
            .map(|(key, value)| (key.clone(), OsString::from(value))),
    );

    tracing::debug!(
        work_dir = %spec.work_dir.display(),
        modules = ?spec.modules,
        vars = ?vars,
        "Configured child environment"
    );

    Ok(PreparedEnvironment {
        work_dir: spec.work_dir.clone(),
        modules: spec.modules.clone(),
        module_shell: spec.module_shell.clone(),
        vars,
    })
}

/// Joins `entries` in front of an inherited search path value.
///
/// Returns `None` when there is nothing to prepend so the inherited value
/// passes through untouched.
pub fn prepend_search_path(
    var: &'static str,
    entries: &[PathBuf],
    inherited: Option<OsString>,
) -> Result<Option<OsString>, LaunchError> {
    if entries.is_empty() {
        return Ok(None);
    }

    let mut paths = entries.to_vec();
    if let Some(inherited) = inherited.filter(|value| !value.is_empty()) {
        paths.extend(env::split_paths(&inherited));
    }

    env::join_paths(paths)
        .map(Some)
        .map_err(|source| LaunchError::InvalidPath { var, source })
}

impl PreparedEnvironment {
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn vars(&self) -> &[(String, OsString)] {
        &self.vars
    }

    /// `module load a b && exec "$@"`, or `None` when no modules are configured.
    pub fn module_script(&self) -> Option<String> {
        if self.modules.is_empty() {
            return None;
        }
        let modules = self
            .modules
            .iter()
            .map(|m| shell_escape::escape(Cow::Borrowed(m.as_str())).into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        Some(format!("module load {modules} && exec \"$@\""))
    }

    /// Builds the child process for `job` with this environment applied.
    pub fn command(&self, job: &JobCommand) -> Command {
        let mut command = match self.module_script() {
            Some(script) => {
                let mut command = Command::new(&self.module_shell);
                command
                    .arg("-lc")
                    .arg(script)
                    .arg(MODULE_SHELL_ARGV0)
                    .arg(job.program())
                    .args(job.arguments());
                command
            }
            None => {
                let mut command = Command::new(job.program());
                command.args(job.arguments());
                command
            }
        };

        command.current_dir(&self.work_dir);
        command.envs(self.vars.iter().map(|(key, value)| (key, value)));
        command
    }
}
