use crate::core::descriptor::{Memory, ResourceDescriptor};
use crate::core::environment::EnvironmentSpec;
use crate::core::get_config_dir;
use crate::core::pbs::PbsDirectives;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const PROFILE_FILENAME: &str = "dclaunch.toml";

/// Commented profile written by `dclaunch new`
pub const PROFILE_TEMPLATE: &str = include_str!("profile_template.toml");

#[derive(Deserialize, Debug, Default, Clone)]
pub struct Config {
    /// Project directory every command runs in (default: current directory)
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    /// Resources for datacube-stats submissions
    #[serde(default)]
    pub job: ResourceDescriptor,
    /// Resources and mail settings for minor PBS jobs
    #[serde(default)]
    pub minor: MinorJobConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_stats_program")]
    pub program: String,
    /// Statistics YAML used when none is given on the command line
    #[serde(default)]
    pub config: Option<PathBuf>,
    #[serde(default)]
    pub extra_flags: Vec<String>,
    #[serde(default)]
    pub tasks_file: Option<PathBuf>,
    #[serde(default)]
    pub tile_index_file: Option<PathBuf>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            program: default_stats_program(),
            config: None,
            extra_flags: vec![],
            tasks_file: None,
            tile_index_file: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct EnvironmentConfig {
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default = "default_module_shell")]
    pub module_shell: String,
    #[serde(default)]
    pub modulepath: Vec<PathBuf>,
    #[serde(default)]
    pub pythonpath: Vec<PathBuf>,
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            modules: vec![],
            module_shell: default_module_shell(),
            modulepath: vec![],
            pythonpath: vec![],
            vars: BTreeMap::new(),
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct MinorJobConfig {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub walltime: Option<String>,
    #[serde(default)]
    pub mem: Option<Memory>,
    #[serde(default)]
    pub ncpus: Option<u32>,
    #[serde(default)]
    pub queue: Option<String>,
    /// PBS mail events, e.g. `abe`
    #[serde(default)]
    pub mail_events: Option<String>,
    #[serde(default)]
    pub mail_to: Option<String>,
    /// Interpreter for the job script's command, e.g. `python`
    #[serde(default)]
    pub interpreter: Option<String>,
}

impl MinorJobConfig {
    pub fn directives(&self) -> PbsDirectives {
        PbsDirectives {
            resources: ResourceDescriptor {
                project: self.project.clone(),
                walltime: self.walltime.clone(),
                mem: self.mem.clone(),
                ncpus: self.ncpus,
                queue: self.queue.clone(),
                ..Default::default()
            },
            mail_events: self.mail_events.clone(),
            mail_to: self.mail_to.clone(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_qsub")]
    pub qsub: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { qsub: default_qsub() }
    }
}

fn default_stats_program() -> String {
    "datacube-stats".to_string()
}

fn default_module_shell() -> String {
    "bash".to_string()
}

fn default_qsub() -> String {
    "qsub".to_string()
}

impl Config {
    /// The configured working directory, or the current one.
    pub fn work_dir(&self) -> Result<PathBuf> {
        match &self.work_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("Failed to get current directory"),
        }
    }

    pub fn environment_spec(&self) -> Result<EnvironmentSpec> {
        Ok(EnvironmentSpec {
            work_dir: self.work_dir()?,
            modules: self.environment.modules.clone(),
            module_shell: self.environment.module_shell.clone(),
            modulepath: self.environment.modulepath.clone(),
            pythonpath: self.environment.pythonpath.clone(),
            vars: self.environment.vars.clone(),
        })
    }
}

fn environment_source() -> config::Environment {
    config::Environment::with_prefix("DCLAUNCH")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("stats.extra_flags")
        .with_list_parse_key("environment.modules")
        .with_list_parse_key("environment.modulepath")
        .with_list_parse_key("environment.pythonpath")
}

/// Loads the profile from, in increasing precedence: the user config
/// directory, `./dclaunch.toml`, `config_path`, and `DCLAUNCH_*` variables.
pub fn load_config(config_path: Option<&PathBuf>) -> Result<Config> {
    let mut config_vec = vec![];

    // Default config file
    if let Ok(default_config_path) = get_config_dir().map(|d| d.join(PROFILE_FILENAME)) {
        if default_config_path.exists() {
            config_vec.push(default_config_path);
        }
    }

    // Project-local config file
    let local_config_path = PathBuf::from(PROFILE_FILENAME);
    if local_config_path.exists() {
        config_vec.push(local_config_path);
    }

    // User-provided config file
    if let Some(config_path) = config_path {
        if !config_path.exists() {
            anyhow::bail!("Profile {config_path:?} does not exist");
        }
        config_vec.push(config_path.clone());
    }

    tracing::debug!(sources = ?config_vec, "Loading profile");
    build_config(&config_vec, environment_source())
}

fn build_config(paths: &[PathBuf], environment: config::Environment) -> Result<Config> {
    let settings = config::Config::builder();
    let settings = paths.iter().fold(settings, |s, path| {
        s.add_source(config::File::from(path.as_path()))
    });

    settings
        .add_source(environment)
        .build()
        .context("Failed to read profile")?
        .try_deserialize()
        .context("Invalid profile")
}

/// Resolves `path` against `base` unless it is already absolute.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
