use crate::cli;
use crate::commands;
use anyhow::Result;
use dclaunch::config::{resolve_path, Config};
use dclaunch::core::command::build_script_command;

pub(crate) async fn handle_run(config: &Config, args: cli::RunArgs) -> Result<i32> {
    let environment = commands::prepare(config, &args.launch)?;

    // Resolve against the working directory so the child finds the script
    // regardless of where dclaunch was started.
    let script = resolve_path(environment.work_dir(), &args.script);
    let command = build_script_command(&script, args.interpreter.as_deref(), &args.script_args);

    commands::execute(&args.launch, &environment, &[command]).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn runs_script_in_work_dir_and_returns_its_code() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("build_mosaic.sh");
        fs::write(&script, "[ -f marker ] || exit 9\nexit 4\n").unwrap();
        fs::write(dir.path().join("marker"), "").unwrap();

        let config = Config {
            work_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let args = cli::RunArgs {
            script: "build_mosaic.sh".into(),
            interpreter: Some("sh".to_string()),
            launch: cli::LaunchArgs::default(),
            script_args: vec![],
        };

        assert_eq!(handle_run(&config, args).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn missing_work_dir_fails_before_running() {
        let config = Config {
            work_dir: Some("/no/such/project".into()),
            ..Default::default()
        };
        let args = cli::RunArgs {
            script: "build_mosaic.py".into(),
            interpreter: Some("python".to_string()),
            launch: cli::LaunchArgs::default(),
            script_args: vec![],
        };

        let err = handle_run(&config, args).await.unwrap_err();
        let launch_err = err
            .downcast_ref::<dclaunch::core::error::LaunchError>()
            .unwrap();
        assert!(launch_err.is_environment());
    }

    #[tokio::test]
    async fn forwards_script_arguments() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("append_dam_history.sh"),
            "[ \"$1\" = 3 ] || exit 9\n[ $# -eq 1 ] || exit 8\nexit 0\n",
        )
        .unwrap();

        let config = Config {
            work_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let args = cli::RunArgs {
            script: "append_dam_history.sh".into(),
            interpreter: Some("sh".to_string()),
            launch: cli::LaunchArgs::default(),
            script_args: vec!["3".to_string()],
        };

        assert_eq!(handle_run(&config, args).await.unwrap(), 0);
    }
}
