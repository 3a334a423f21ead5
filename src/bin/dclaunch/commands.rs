use crate::cli::{Commands, LaunchArgs, ResourceArgs, TaskFileArgs, TasksCommands};
use anyhow::{anyhow, bail, Result};
use dclaunch::config::{load_config, Config};
use dclaunch::core::command::{JobCommand, TaskFiles};
use dclaunch::core::descriptor::ResourceDescriptor;
use dclaunch::core::environment::{configure_environment, EnvironmentSpec, PreparedEnvironment};
use dclaunch::core::executor::{run_sequence, DryRunExecutor, ProcessExecutor};
use std::path::PathBuf;

mod completions;
mod minor;
mod new;
mod run;
mod show;
mod submit;
mod tasks;

/// Dispatches a subcommand and returns the exit code to report.
pub async fn handle_commands(profile: Option<&PathBuf>, command: Commands) -> Result<i32> {
    match command {
        Commands::Completion { shell } => completions::handle_completions(shell),
        Commands::New(new_args) => new::handle_new(new_args),
        command => {
            let config = load_config(profile)?;
            match command {
                Commands::Submit(args) => submit::handle_submit(&config, args).await,
                Commands::Tasks(TasksCommands::Save(args)) => {
                    tasks::handle_save(&config, args).await
                }
                Commands::Tasks(TasksCommands::Submit(args)) => {
                    tasks::handle_submit(&config, args).await
                }
                Commands::Run(args) => run::handle_run(&config, args).await,
                Commands::Minor(args) => minor::handle_minor(&config, args).await,
                Commands::Show(args) => show::handle_show(&config, args),
                Commands::Completion { .. } | Commands::New(_) => unreachable!(),
            }
        }
    }
}

/// Profile environment plus `--env` assignments from the command line.
pub(crate) fn environment_spec(config: &Config, launch: &LaunchArgs) -> Result<EnvironmentSpec> {
    let mut spec = config.environment_spec()?;
    spec.vars.extend(launch.env.iter().cloned());
    Ok(spec)
}

pub(crate) fn prepare(config: &Config, launch: &LaunchArgs) -> Result<PreparedEnvironment> {
    let spec = environment_spec(config, launch)?;
    Ok(configure_environment(&spec)?)
}

/// Runs `commands` in order, or prints them with `--dry-run`.
pub(crate) async fn execute(
    launch: &LaunchArgs,
    environment: &PreparedEnvironment,
    commands: &[JobCommand],
) -> Result<i32> {
    let code = if launch.dry_run {
        run_sequence(&DryRunExecutor, environment, commands).await?
    } else {
        run_sequence(&ProcessExecutor, environment, commands).await?
    };
    Ok(code)
}

/// The statistics YAML from the command line, falling back to the profile.
///
/// The path is handed to datacube-stats verbatim and is resolved by it
/// relative to the working directory.
pub(crate) fn stats_config_path(config: &Config, cli: Option<&PathBuf>) -> Result<PathBuf> {
    cli.or(config.stats.config.as_ref())
        .cloned()
        .ok_or_else(|| {
            anyhow!("No statistics configuration given. Pass a YAML file or set stats.config in the profile")
        })
}

/// Profile flags first, then the ones given after `--`.
pub(crate) fn extra_flags(config: &Config, cli: &[String]) -> Vec<String> {
    config
        .stats
        .extra_flags
        .iter()
        .chain(cli.iter())
        .cloned()
        .collect()
}

/// The `[job]` table overlaid with the resource flags, for datacube-stats'
/// qsub mode. An empty `--qsub=` value is refused.
pub(crate) fn job_resources(config: &Config, resources: &ResourceArgs) -> Result<ResourceDescriptor> {
    let descriptor = config.job.clone().overlay(&resources.descriptor()?);
    if descriptor.to_qsub_value().is_empty() {
        bail!("No job resources given. Set the [job] table in the profile, pass resource flags such as --project, or use --local");
    }
    Ok(descriptor)
}

pub(crate) fn task_files(config: &Config, args: &TaskFileArgs) -> Result<TaskFiles> {
    let tasks_file = args
        .tasks_file
        .as_ref()
        .or(config.stats.tasks_file.as_ref())
        .cloned()
        .ok_or_else(|| anyhow!("No task file given. Pass --tasks-file or set stats.tasks_file"))?;

    Ok(TaskFiles {
        tasks_file,
        tile_index_file: args
            .tile_index_file
            .as_ref()
            .or(config.stats.tile_index_file.as_ref())
            .cloned(),
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::murrumbidgee_config;
    use super::*;

    #[test]
    fn cli_config_wins_over_profile() {
        let config = murrumbidgee_config();
        let cli = PathBuf::from("other.yaml");
        assert_eq!(stats_config_path(&config, Some(&cli)).unwrap(), cli);
        assert_eq!(
            stats_config_path(&config, None).unwrap(),
            PathBuf::from("murrumbidgee_DCstats.yaml")
        );
    }

    #[test]
    fn missing_stats_config_is_reported() {
        let err = stats_config_path(&Config::default(), None).unwrap_err();
        assert!(err.to_string().contains("No statistics configuration given"));
    }

    #[test]
    fn profile_extra_flags_come_first() {
        let mut config = Config::default();
        config.stats.extra_flags = vec!["--queue-size=50".to_string()];
        assert_eq!(
            extra_flags(&config, &["--year".to_string(), "2018".to_string()]),
            vec!["--queue-size=50", "--year", "2018"]
        );
    }

    #[test]
    fn job_resources_overlay_flags_on_profile() {
        let resources = ResourceArgs {
            nodes: Some(6),
            ..Default::default()
        };
        let descriptor = job_resources(&murrumbidgee_config(), &resources).unwrap();
        assert_eq!(descriptor.nodes, Some(6));
        assert_eq!(descriptor.project.as_deref(), Some("r78"));
    }

    #[test]
    fn empty_job_resources_are_refused() {
        let err = job_resources(&Config::default(), &ResourceArgs::default()).unwrap_err();
        assert!(err.to_string().contains("--local"));

        // Workers alone do not make a qsub value
        let workers_only = ResourceArgs {
            workers_per_node: Some(5),
            ..Default::default()
        };
        assert!(job_resources(&Config::default(), &workers_only).is_err());
    }

    #[test]
    fn task_files_fall_back_to_profile() {
        let mut config = Config::default();
        config.stats.tasks_file = Some(PathBuf::from("tasks.pickle"));
        let files = task_files(&config, &TaskFileArgs::default()).unwrap();
        assert_eq!(files.tasks_file, PathBuf::from("tasks.pickle"));
        assert_eq!(files.tile_index_file, None);

        assert!(task_files(&Config::default(), &TaskFileArgs::default()).is_err());
    }

    #[test]
    fn env_flags_extend_profile_vars() {
        let mut config = Config::default();
        config
            .environment
            .vars
            .insert("A".to_string(), "1".to_string());
        let launch = LaunchArgs {
            dry_run: false,
            env: vec![("A".to_string(), "2".to_string()), ("B".to_string(), "3".to_string())],
        };
        let spec = environment_spec(&config, &launch).unwrap();
        assert_eq!(spec.vars.get("A").map(String::as_str), Some("2"));
        assert_eq!(spec.vars.get("B").map(String::as_str), Some("3"));
    }
}
