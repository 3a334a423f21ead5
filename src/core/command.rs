use crate::core::descriptor::ResourceDescriptor;
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

/// An external program and its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCommand {
    program: String,
    args: Vec<String>,
}

impl JobCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Renders the command as a single shell-escaped line.
impl fmt::Display for JobCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = self
            .argv()
            .into_iter()
            .map(|word| shell_escape::escape(Cow::Owned(word)).into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        f.write_str(&line)
    }
}

/// Files shared by the save-tasks and load-tasks phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFiles {
    pub tasks_file: PathBuf,
    pub tile_index_file: Option<PathBuf>,
}

impl TaskFiles {
    fn tile_index_args(&self) -> Vec<String> {
        match &self.tile_index_file {
            Some(path) => vec!["--tile-index-file".to_string(), path_arg(path)],
            None => vec![],
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn resource_flags(descriptor: Option<&ResourceDescriptor>) -> (Option<String>, Option<String>) {
    match descriptor {
        Some(d) => (Some(d.qsub_flag()), d.workers_flag()),
        None => (None, None),
    }
}

/// Builds a statistics run:
/// `<program> [--qsub=<value>] <config> [--workers-per-node=N] [extra...]`.
///
/// Without a descriptor the tool runs locally and no scheduler flags are
/// emitted. Values are not validated.
///
/// # Examples
///
/// ```
/// use dclaunch::core::command::build_job_command;
/// use dclaunch::core::descriptor::ResourceDescriptor;
/// use std::path::Path;
///
/// let mut descriptor: ResourceDescriptor =
///     "project=r78,nodes=3,walltime=24h,mem=small,queue=normal".parse().unwrap();
/// descriptor.workers_per_node = Some(5);
///
/// let command = build_job_command(
///     "datacube-stats",
///     Some(&descriptor),
///     Path::new("murrumbidgee_DCstats.yaml"),
///     &[],
/// );
/// assert_eq!(
///     command.to_string(),
///     "datacube-stats --qsub=project=r78,nodes=3,walltime=24h,mem=small,queue=normal murrumbidgee_DCstats.yaml --workers-per-node=5"
/// );
/// ```
pub fn build_job_command(
    program: &str,
    descriptor: Option<&ResourceDescriptor>,
    config_path: &Path,
    extra_flags: &[String],
) -> JobCommand {
    let (qsub, workers) = resource_flags(descriptor);
    JobCommand::new(program)
        .args(qsub)
        .arg(path_arg(config_path))
        .args(workers)
        .args(extra_flags.iter().cloned())
}

/// First phase of the two-phase flow: precompute the task list locally.
pub fn build_save_tasks_command(program: &str, tasks: &TaskFiles, config_path: &Path) -> JobCommand {
    JobCommand::new(program)
        .arg("--save-tasks")
        .arg(path_arg(&tasks.tasks_file))
        .args(tasks.tile_index_args())
        .arg(path_arg(config_path))
}

/// Second phase of the two-phase flow: submit the saved task list.
pub fn build_load_tasks_command(
    program: &str,
    descriptor: Option<&ResourceDescriptor>,
    tasks: &TaskFiles,
    config_path: &Path,
    extra_flags: &[String],
) -> JobCommand {
    let (qsub, workers) = resource_flags(descriptor);
    JobCommand::new(program)
        .args(qsub)
        .arg(format!("--load-tasks={}", path_arg(&tasks.tasks_file)))
        .args(tasks.tile_index_args())
        .arg(path_arg(config_path))
        .args(workers)
        .args(extra_flags.iter().cloned())
}

/// Direct execution of a local script, optionally through an interpreter
/// such as `python`. `script_args` follow the script verbatim.
pub fn build_script_command(
    script: &Path,
    interpreter: Option<&str>,
    script_args: &[String],
) -> JobCommand {
    let command = match interpreter {
        Some(interpreter) => JobCommand::new(interpreter).arg(path_arg(script)),
        None => JobCommand::new(path_arg(script)),
    };
    command.args(script_args.iter().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::{MemClass, Memory};

    fn murrumbidgee() -> ResourceDescriptor {
        ResourceDescriptor {
            project: Some("r78".to_string()),
            nodes: Some(3),
            walltime: Some("24h".to_string()),
            mem: Some(Memory::Class(MemClass::Small)),
            queue: Some("normal".to_string()),
            workers_per_node: Some(5),
            ..Default::default()
        }
    }

    fn tasks() -> TaskFiles {
        TaskFiles {
            tasks_file: PathBuf::from("/g/data/r78/tasks/mdb.pickle"),
            tile_index_file: Some(PathBuf::from("tiles/mdb_tiles.txt")),
        }
    }

    #[test]
    fn builds_end_to_end_example() {
        let command = build_job_command(
            "datacube-stats",
            Some(&murrumbidgee()),
            Path::new("murrumbidgee_DCstats.yaml"),
            &[],
        );
        assert_eq!(
            command.argv(),
            vec![
                "datacube-stats",
                "--qsub=project=r78,nodes=3,walltime=24h,mem=small,queue=normal",
                "murrumbidgee_DCstats.yaml",
                "--workers-per-node=5",
            ]
        );
        assert_eq!(
            command.to_string(),
            "datacube-stats --qsub=project=r78,nodes=3,walltime=24h,mem=small,queue=normal murrumbidgee_DCstats.yaml --workers-per-node=5"
        );
    }

    #[test]
    fn local_run_has_no_scheduler_flags() {
        let command = build_job_command(
            "datacube-stats",
            None,
            Path::new("ndvi_max.yaml"),
            &["--tile-index".to_string(), "15,-40".to_string()],
        );
        assert_eq!(
            command.argv(),
            vec!["datacube-stats", "ndvi_max.yaml", "--tile-index", "15,-40"]
        );
    }

    #[test]
    fn extra_flags_follow_workers_flag() {
        let command = build_job_command(
            "datacube-stats",
            Some(&murrumbidgee()),
            Path::new("cfg.yaml"),
            &["--queue-size=50".to_string()],
        );
        assert_eq!(
            &command.arguments()[2..],
            &["--workers-per-node=5".to_string(), "--queue-size=50".to_string()]
        );
    }

    #[test]
    fn builds_save_tasks_phase() {
        let command =
            build_save_tasks_command("datacube-stats", &tasks(), Path::new("mdb.yaml"));
        assert_eq!(
            command.to_string(),
            "datacube-stats --save-tasks /g/data/r78/tasks/mdb.pickle --tile-index-file tiles/mdb_tiles.txt mdb.yaml"
        );
    }

    #[test]
    fn builds_load_tasks_phase() {
        let descriptor = ResourceDescriptor {
            workers_per_node: None,
            ..murrumbidgee()
        };
        let command = build_load_tasks_command(
            "datacube-stats",
            Some(&descriptor),
            &tasks(),
            Path::new("mdb.yaml"),
            &[],
        );
        assert_eq!(
            command.argv(),
            vec![
                "datacube-stats",
                "--qsub=project=r78,nodes=3,walltime=24h,mem=small,queue=normal",
                "--load-tasks=/g/data/r78/tasks/mdb.pickle",
                "--tile-index-file",
                "tiles/mdb_tiles.txt",
                "mdb.yaml",
            ]
        );
    }

    #[test]
    fn save_tasks_without_tile_index() {
        let files = TaskFiles {
            tasks_file: PathBuf::from("tasks.pickle"),
            tile_index_file: None,
        };
        let command = build_save_tasks_command("datacube-stats", &files, Path::new("a.yaml"));
        assert_eq!(
            command.argv(),
            vec!["datacube-stats", "--save-tasks", "tasks.pickle", "a.yaml"]
        );
    }

    #[test]
    fn script_command_with_and_without_interpreter() {
        let direct = build_script_command(Path::new("./build_mosaic.py"), None, &[]);
        assert_eq!(direct.program(), "./build_mosaic.py");
        assert!(direct.arguments().is_empty());

        let python = build_script_command(Path::new("build_mosaic.py"), Some("python"), &[]);
        assert_eq!(python.argv(), vec!["python", "build_mosaic.py"]);
    }

    #[test]
    fn script_arguments_follow_the_script() {
        let part = vec!["3".to_string()];
        let command = build_script_command(
            Path::new("AppendDamTimeHistoryParallel.py"),
            Some("python"),
            &part,
        );
        assert_eq!(
            command.argv(),
            vec!["python", "AppendDamTimeHistoryParallel.py", "3"]
        );

        let shapefile = vec!["catchments/murray.shp".to_string(), "--dry".to_string()];
        let direct = build_script_command(Path::new("/work/sica.sh"), None, &shapefile);
        assert_eq!(direct.argv(), vec!["/work/sica.sh", "catchments/murray.shp", "--dry"]);
    }

    #[test]
    fn display_quotes_words_with_spaces() {
        let command = JobCommand::new("echo").arg("two words");
        assert_eq!(command.to_string(), "echo 'two words'");
    }
}
