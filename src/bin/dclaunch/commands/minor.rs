use crate::cli;
use crate::commands;
use anyhow::{Context, Result};
use dclaunch::config::{resolve_path, Config};
use dclaunch::core::command::{build_script_command, JobCommand};
use dclaunch::core::environment::{configure_environment, EnvironmentSpec};
use dclaunch::core::pbs::{build_qsub_command, render_job_script};
use std::fs;
use std::path::{Path, PathBuf};

/// A rendered job script and the qsub call that submits it.
pub(crate) struct MinorJob {
    pub script_path: PathBuf,
    pub script: String,
    pub qsub: JobCommand,
    pub work_dir: PathBuf,
}

pub(crate) async fn handle_minor(config: &Config, args: cli::MinorArgs) -> Result<i32> {
    let job = plan_minor(config, &args)?;

    // The job script carries the environment; qsub itself only needs the
    // working directory.
    let submit_env = configure_environment(&EnvironmentSpec {
        work_dir: job.work_dir.clone(),
        ..Default::default()
    })?;

    if args.launch.dry_run {
        println!("# {}", job.script_path.display());
        print!("{}", job.script);
    } else {
        fs::write(&job.script_path, &job.script).with_context(|| {
            format!("Failed to write job script {}", job.script_path.display())
        })?;
        tracing::info!("Wrote job script {}", job.script_path.display());
    }

    commands::execute(&args.launch, &submit_env, &[job.qsub]).await
}

pub(crate) fn plan_minor(config: &Config, args: &cli::MinorArgs) -> Result<MinorJob> {
    let spec = commands::environment_spec(config, &args.launch)?;
    let directives = args.directives(config.minor.directives());

    let interpreter = args
        .interpreter
        .as_deref()
        .or(config.minor.interpreter.as_deref());
    // A bare script name would be looked up on PATH inside the job.
    let script_file = resolve_path(&spec.work_dir, &args.script);
    let command = build_script_command(&script_file, interpreter, &args.script_args);
    let script = render_job_script(&directives, &spec, &command);

    let script_path = match &args.script_out {
        Some(path) => resolve_path(&spec.work_dir, path),
        None => default_job_script_path(&spec.work_dir, &args.script),
    };
    let qsub = build_qsub_command(&config.scheduler.qsub, &script_path);

    Ok(MinorJob {
        script_path,
        script,
        qsub,
        work_dir: spec.work_dir,
    })
}

fn default_job_script_path(work_dir: &Path, script: &Path) -> PathBuf {
    let stem = script
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "job".to_string());
    work_dir.join(format!("{stem}.pbs"))
}
