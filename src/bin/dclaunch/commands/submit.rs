use crate::cli;
use crate::commands;
use anyhow::Result;
use dclaunch::config::Config;
use dclaunch::core::command::{
    build_job_command, build_load_tasks_command, build_save_tasks_command, JobCommand,
};

pub(crate) async fn handle_submit(config: &Config, args: cli::SubmitArgs) -> Result<i32> {
    let plan = plan_submit(config, &args)?;
    let environment = commands::prepare(config, &args.launch)?;
    commands::execute(&args.launch, &environment, &plan).await
}

/// The commands `submit` runs, in order.
pub(crate) fn plan_submit(config: &Config, args: &cli::SubmitArgs) -> Result<Vec<JobCommand>> {
    let stats_config = commands::stats_config_path(config, args.config.as_ref())?;
    let extra = commands::extra_flags(config, &args.extra);
    let program = config.stats.program.as_str();

    let descriptor = if args.local {
        None
    } else {
        Some(commands::job_resources(config, &args.resources)?)
    };

    if args.two_phase {
        let tasks = commands::task_files(config, &args.tasks)?;
        return Ok(vec![
            build_save_tasks_command(program, &tasks, &stats_config),
            build_load_tasks_command(program, descriptor.as_ref(), &tasks, &stats_config, &extra),
        ]);
    }

    Ok(vec![build_job_command(
        program,
        descriptor.as_ref(),
        &stats_config,
        &extra,
    )])
}
