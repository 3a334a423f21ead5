use crate::core::command::JobCommand;
use crate::core::environment::PreparedEnvironment;
use crate::core::error::LaunchError;
use std::borrow::Cow;
use std::process::{ExitStatus, Stdio};

/// Runs a command in a prepared environment and reports its exit code.
#[allow(async_fn_in_trait)]
pub trait Executor {
    async fn execute(
        &self,
        environment: &PreparedEnvironment,
        command: &JobCommand,
    ) -> Result<i32, LaunchError>;
}

/// Spawns the command and waits for it, sharing the wrapper's stdio.
pub struct ProcessExecutor;

impl Executor for ProcessExecutor {
    async fn execute(
        &self,
        environment: &PreparedEnvironment,
        command: &JobCommand,
    ) -> Result<i32, LaunchError> {
        let mut process = environment.command(command);
        let program = process.as_std().get_program().to_string_lossy().into_owned();

        tracing::info!(
            work_dir = %environment.work_dir().display(),
            "Running {command}"
        );

        let mut child = process
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: program.clone(),
                source,
            })?;

        let status = child
            .wait()
            .await
            .map_err(|source| LaunchError::Wait { program, source })?;

        let code = exit_code(status);
        if code == 0 {
            tracing::debug!("`{}` finished successfully", command.program());
        } else {
            tracing::warn!(code, "`{}` exited with a non-zero status", command.program());
        }
        Ok(code)
    }
}

/// Prints what would be run instead of running it.
pub struct DryRunExecutor;

impl Executor for DryRunExecutor {
    async fn execute(
        &self,
        environment: &PreparedEnvironment,
        command: &JobCommand,
    ) -> Result<i32, LaunchError> {
        print!("{}", render_dry_run(environment, command));
        Ok(0)
    }
}

/// Shell lines equivalent to running `command` in `environment`.
pub fn render_dry_run(environment: &PreparedEnvironment, command: &JobCommand) -> String {
    let escape = |word: String| shell_escape::escape(Cow::Owned(word)).into_owned();

    let mut lines = vec![format!(
        "cd {}",
        escape(environment.work_dir().to_string_lossy().into_owned())
    )];
    lines.extend(environment.vars().iter().map(|(key, value)| {
        format!("export {key}={}", escape(value.to_string_lossy().into_owned()))
    }));
    if !environment.modules().is_empty() {
        let modules: Vec<String> = environment.modules().iter().cloned().map(escape).collect();
        lines.push(format!("module load {}", modules.join(" ")));
    }
    lines.push(command.to_string());

    lines.into_iter().map(|line| line + "\n").collect()
}

/// Runs `commands` in order, stopping at the first non-zero exit code.
pub async fn run_sequence<E: Executor>(
    executor: &E,
    environment: &PreparedEnvironment,
    commands: &[JobCommand],
) -> Result<i32, LaunchError> {
    for (phase, command) in commands.iter().enumerate() {
        tracing::info!("Phase {}/{}: {}", phase + 1, commands.len(), command.program());
        let code = executor.execute(environment, command).await?;
        if code != 0 {
            tracing::warn!(code, "Stopping after phase {}", phase + 1);
            return Ok(code);
        }
    }
    Ok(0)
}

/// Exit code of a finished child; signal deaths map to `128 + signal`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

/// Truncates an exit code to the byte a process can actually return.
pub fn process_exit_code(code: i32) -> u8 {
    (code & 0xff) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::environment::{configure_environment, EnvironmentSpec};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn prepared(dir: &std::path::Path) -> PreparedEnvironment {
        configure_environment(&EnvironmentSpec {
            work_dir: dir.to_path_buf(),
            ..Default::default()
        })
        .unwrap()
    }

    fn sh(script: &str) -> JobCommand {
        JobCommand::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn propagates_success() {
        let dir = tempdir().unwrap();
        let code = ProcessExecutor
            .execute(&prepared(dir.path()), &sh("exit 0"))
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn propagates_failure_code() {
        let dir = tempdir().unwrap();
        let code = ProcessExecutor
            .execute(&prepared(dir.path()), &sh("exit 3"))
            .await
            .unwrap();
        assert_eq!(code, 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn signal_death_maps_to_128_plus_signal() {
        let dir = tempdir().unwrap();
        let code = ProcessExecutor
            .execute(&prepared(dir.path()), &sh("kill -TERM $$"))
            .await
            .unwrap();
        assert_eq!(code, 128 + 15);
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let dir = tempdir().unwrap();
        let err = ProcessExecutor
            .execute(
                &prepared(dir.path()),
                &JobCommand::new("dclaunch-no-such-program-xyz"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
        assert_eq!(err.exit_code(), 127);
    }

    #[test]
    fn dry_run_lists_environment_then_command() {
        let dir = tempdir().unwrap();
        let mut spec = EnvironmentSpec {
            work_dir: dir.path().to_path_buf(),
            modules: vec!["dea".to_string()],
            pythonpath: vec![PathBuf::from("/opt/scripts")],
            ..Default::default()
        };
        spec.vars.insert("FOO".to_string(), "bar".to_string());
        let environment = configure_environment(&spec).unwrap();

        let rendered = render_dry_run(&environment, &JobCommand::new("datacube-stats").arg("a.yaml"));
        let lines: Vec<&str> = rendered.lines().collect();

        assert!(lines[0].starts_with("cd "));
        assert!(lines[1].starts_with("export PYTHONPATH="));
        assert!(lines[1].contains("/opt/scripts"));
        assert_eq!(lines[2], "export FOO=bar");
        assert_eq!(lines[3], "module load dea");
        assert_eq!(lines[4], "datacube-stats a.yaml");
    }

    #[test]
    fn exit_codes_are_truncated_to_a_byte() {
        assert_eq!(process_exit_code(0), 0);
        assert_eq!(process_exit_code(3), 3);
        assert_eq!(process_exit_code(143), 143);
        assert_eq!(process_exit_code(256), 0);
        assert_eq!(process_exit_code(-1), 255);
    }

    /// Returns scripted exit codes and records what it was asked to run.
    struct ScriptedExecutor {
        codes: RefCell<VecDeque<i32>>,
        ran: RefCell<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn new(codes: &[i32]) -> Self {
            Self {
                codes: RefCell::new(codes.iter().copied().collect()),
                ran: RefCell::new(vec![]),
            }
        }
    }

    impl Executor for ScriptedExecutor {
        async fn execute(
            &self,
            _environment: &PreparedEnvironment,
            command: &JobCommand,
        ) -> Result<i32, LaunchError> {
            self.ran.borrow_mut().push(command.to_string());
            Ok(self.codes.borrow_mut().pop_front().unwrap_or(0))
        }
    }

    #[tokio::test]
    async fn sequence_stops_at_first_failure() {
        let dir = tempdir().unwrap();
        let executor = ScriptedExecutor::new(&[2, 0]);
        let commands = [
            JobCommand::new("datacube-stats").arg("--save-tasks"),
            JobCommand::new("datacube-stats").arg("--load-tasks=t"),
        ];

        let code = run_sequence(&executor, &prepared(dir.path()), &commands)
            .await
            .unwrap();
        assert_eq!(code, 2);
        assert_eq!(executor.ran.borrow().len(), 1);
    }

    #[tokio::test]
    async fn sequence_runs_every_phase_on_success() {
        let dir = tempdir().unwrap();
        let executor = ScriptedExecutor::new(&[0, 5]);
        let commands = [JobCommand::new("first"), JobCommand::new("second")];

        let code = run_sequence(&executor, &prepared(dir.path()), &commands)
            .await
            .unwrap();
        assert_eq!(code, 5);
        assert_eq!(*executor.ran.borrow(), vec!["first", "second"]);
    }
}
