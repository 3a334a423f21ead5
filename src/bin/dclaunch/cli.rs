use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use clap_verbosity_flag::Verbosity;
use dclaunch::core::descriptor::{Memory, ResourceDescriptor};
use dclaunch::core::pbs::PbsDirectives;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "dclaunch",
    author,
    version = dclaunch::core::version(),
    about = "Runs datacube-stats and helper scripts in the project environment, directly or through qsub."
)]
#[command(styles = dclaunch::utils::STYLES)]
pub struct DcLaunch {
    #[command(subcommand)]
    pub command: Commands,

    /// Profile to load on top of the default profiles
    #[arg(short, long, global = true)]
    pub profile: Option<PathBuf>,

    #[command(flatten)]
    pub verbosity: Verbosity,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run datacube-stats through its qsub mode (or locally with --local)
    #[command(alias = "qsub")]
    Submit(SubmitArgs),
    /// Save a task list, or submit a saved one
    #[command(subcommand)]
    Tasks(TasksCommands),
    /// Run a local script directly, without arguments
    Run(RunArgs),
    /// Submit a script as a minor PBS job with #PBS directives
    Minor(MinorArgs),
    /// Show the resolved resources and the command `submit` would run
    Show(ShowArgs),
    /// Create a directory holding a template profile
    New(NewArgs),
    /// Generate shell completion scripts
    Completion {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
pub enum TasksCommands {
    /// Precompute the task list locally (datacube-stats --save-tasks)
    Save(TasksSaveArgs),
    /// Submit a saved task list (datacube-stats --qsub --load-tasks)
    Submit(TasksSubmitArgs),
}

/// Resource overrides for datacube-stats' qsub mode.
#[derive(Debug, Args, Clone, Default)]
pub struct ResourceArgs {
    /// Full qsub value, e.g. "project=r78,nodes=3"; the flags below win over it
    #[arg(long, value_name = "KEY=VALUE,...")]
    pub qsub: Option<String>,

    /// Accounting project code
    #[arg(long)]
    pub project: Option<String>,

    /// Number of nodes
    #[arg(long)]
    pub nodes: Option<u32>,

    /// Wall-clock limit, e.g. "24h"
    #[arg(long)]
    pub walltime: Option<String>,

    /// Memory class (small, medium, large) or explicit amount
    #[arg(long)]
    pub mem: Option<String>,

    /// Scheduler queue
    #[arg(long)]
    pub queue: Option<String>,

    /// Workers per node
    #[arg(long)]
    pub workers_per_node: Option<u32>,
}

impl ResourceArgs {
    pub fn descriptor(&self) -> Result<ResourceDescriptor> {
        let base = match &self.qsub {
            Some(value) => value.parse::<ResourceDescriptor>()?,
            None => ResourceDescriptor::default(),
        };

        Ok(base.overlay(&ResourceDescriptor {
            project: self.project.clone(),
            nodes: self.nodes,
            walltime: self.walltime.clone(),
            mem: self.mem.clone().map(Memory::from),
            queue: self.queue.clone(),
            workers_per_node: self.workers_per_node,
            ..Default::default()
        }))
    }
}

#[derive(Debug, Args, Clone, Default)]
pub struct TaskFileArgs {
    /// Task list written by --save-tasks and read by --load-tasks
    #[arg(long)]
    pub tasks_file: Option<PathBuf>,

    /// Tile index file restricting the run
    #[arg(long)]
    pub tile_index_file: Option<PathBuf>,
}

#[derive(Debug, Args, Clone, Default)]
pub struct LaunchArgs {
    /// Print what would be run instead of running it
    #[arg(long)]
    pub dry_run: bool,

    /// Extra environment variable for the child process (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = dclaunch::utils::parse_env_assignment)]
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Args, Clone, Default)]
pub struct SubmitArgs {
    /// Statistics configuration YAML (default: stats.config from the profile)
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub resources: ResourceArgs,

    /// Run datacube-stats on this node instead of submitting it
    #[arg(long, conflicts_with_all = ["qsub", "two_phase"])]
    pub local: bool,

    /// Save the task list first, then submit it
    #[arg(long)]
    pub two_phase: bool,

    #[command(flatten)]
    pub tasks: TaskFileArgs,

    #[command(flatten)]
    pub launch: LaunchArgs,

    /// Extra flags passed through to datacube-stats
    #[arg(last = true)]
    pub extra: Vec<String>,
}

#[derive(Debug, Args, Clone, Default)]
pub struct TasksSaveArgs {
    /// Statistics configuration YAML (default: stats.config from the profile)
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub tasks: TaskFileArgs,

    #[command(flatten)]
    pub launch: LaunchArgs,
}

#[derive(Debug, Args, Clone, Default)]
pub struct TasksSubmitArgs {
    /// Statistics configuration YAML (default: stats.config from the profile)
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub resources: ResourceArgs,

    #[command(flatten)]
    pub tasks: TaskFileArgs,

    #[command(flatten)]
    pub launch: LaunchArgs,

    /// Extra flags passed through to datacube-stats
    #[arg(last = true)]
    pub extra: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// The script to run, relative to the working directory
    pub script: PathBuf,

    /// Interpreter to run the script with, e.g. "python"
    #[arg(long)]
    pub interpreter: Option<String>,

    #[command(flatten)]
    pub launch: LaunchArgs,

    /// Arguments passed to the script
    #[arg(last = true)]
    pub script_args: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct MinorArgs {
    /// The script the job runs, relative to the working directory
    pub script: PathBuf,

    /// Accounting project code (-P)
    #[arg(long)]
    pub project: Option<String>,

    /// Wall-clock limit (-l walltime=), e.g. "02:00:00"
    #[arg(long)]
    pub walltime: Option<String>,

    /// Memory (-l mem=), e.g. "32GB"
    #[arg(long)]
    pub mem: Option<String>,

    /// CPU count (-l ncpus=)
    #[arg(long)]
    pub ncpus: Option<u32>,

    /// Scheduler queue (-q)
    #[arg(long)]
    pub queue: Option<String>,

    /// Mail events (-m), e.g. "abe"
    #[arg(long)]
    pub mail_events: Option<String>,

    /// Mail recipient (-M)
    #[arg(long)]
    pub mail_to: Option<String>,

    /// Interpreter for the script, e.g. "python"
    #[arg(long)]
    pub interpreter: Option<String>,

    /// Where to write the job script (default: <work_dir>/<script stem>.pbs)
    #[arg(long)]
    pub script_out: Option<PathBuf>,

    #[command(flatten)]
    pub launch: LaunchArgs,

    /// Arguments the job passes to the script
    #[arg(last = true)]
    pub script_args: Vec<String>,
}

impl MinorArgs {
    /// Layers the command-line directives over `base`.
    pub fn directives(&self, base: PbsDirectives) -> PbsDirectives {
        let overrides = ResourceDescriptor {
            project: self.project.clone(),
            walltime: self.walltime.clone(),
            mem: self.mem.clone().map(Memory::from),
            ncpus: self.ncpus,
            queue: self.queue.clone(),
            ..Default::default()
        };

        PbsDirectives {
            resources: base.resources.overlay(&overrides),
            mail_events: self.mail_events.clone().or(base.mail_events),
            mail_to: self.mail_to.clone().or(base.mail_to),
        }
    }
}

#[derive(Debug, Args, Clone, Default)]
pub struct ShowArgs {
    /// Statistics configuration YAML (default: stats.config from the profile)
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub resources: ResourceArgs,

    /// Show the local command instead of the qsub submission
    #[arg(long)]
    pub local: bool,
}

#[derive(Debug, Args, Clone)]
pub struct NewArgs {
    /// Directory to create
    pub name: String,
}
