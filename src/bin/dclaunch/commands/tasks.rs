use crate::cli;
use crate::commands;
use anyhow::Result;
use dclaunch::config::Config;
use dclaunch::core::command::{build_load_tasks_command, build_save_tasks_command, JobCommand};

pub(crate) async fn handle_save(config: &Config, args: cli::TasksSaveArgs) -> Result<i32> {
    let command = plan_save(config, &args)?;
    let environment = commands::prepare(config, &args.launch)?;
    commands::execute(&args.launch, &environment, &[command]).await
}

pub(crate) async fn handle_submit(config: &Config, args: cli::TasksSubmitArgs) -> Result<i32> {
    let command = plan_load(config, &args)?;
    let environment = commands::prepare(config, &args.launch)?;
    commands::execute(&args.launch, &environment, &[command]).await
}

fn plan_save(config: &Config, args: &cli::TasksSaveArgs) -> Result<JobCommand> {
    let stats_config = commands::stats_config_path(config, args.config.as_ref())?;
    let tasks = commands::task_files(config, &args.tasks)?;
    Ok(build_save_tasks_command(
        &config.stats.program,
        &tasks,
        &stats_config,
    ))
}

fn plan_load(config: &Config, args: &cli::TasksSubmitArgs) -> Result<JobCommand> {
    let stats_config = commands::stats_config_path(config, args.config.as_ref())?;
    let tasks = commands::task_files(config, &args.tasks)?;
    let descriptor = commands::job_resources(config, &args.resources)?;
    let extra = commands::extra_flags(config, &args.extra);
    Ok(build_load_tasks_command(
        &config.stats.program,
        Some(&descriptor),
        &tasks,
        &stats_config,
        &extra,
    ))
}
