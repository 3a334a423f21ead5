//! PBS directive handling for minor jobs: small single-node jobs submitted
//! with plain `qsub` and `#PBS` directives instead of datacube-stats' own
//! qsub mode.

use crate::core::command::JobCommand;
use crate::core::descriptor::ResourceDescriptor;
use crate::core::environment::{EnvironmentSpec, MODULEPATH, PYTHONPATH};
use std::borrow::Cow;
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PbsDirectives {
    pub resources: ResourceDescriptor,
    /// Mail events for `-m`, e.g. `abe`
    pub mail_events: Option<String>,
    /// Mail recipient for `-M`
    pub mail_to: Option<String>,
}

impl PbsDirectives {
    /// Option/value pairs in directive order: `-P`, `-l walltime`, `-l mem`,
    /// `-l ncpus`, `-q`, `-m`, `-M`.
    pub fn directives(&self) -> Vec<(&'static str, String)> {
        let resources = &self.resources;
        let mut directives = Vec::new();

        if let Some(project) = &resources.project {
            directives.push(("-P", project.clone()));
        }
        if let Some(walltime) = &resources.walltime {
            directives.push(("-l", format!("walltime={walltime}")));
        }
        if let Some(mem) = &resources.mem {
            directives.push(("-l", format!("mem={mem}")));
        }
        if let Some(ncpus) = resources.ncpus {
            directives.push(("-l", format!("ncpus={ncpus}")));
        }
        if let Some(queue) = &resources.queue {
            directives.push(("-q", queue.clone()));
        }
        if let Some(events) = &self.mail_events {
            directives.push(("-m", events.clone()));
        }
        if let Some(to) = &self.mail_to {
            directives.push(("-M", to.clone()));
        }
        directives
    }

    /// The directives as command-line arguments for `qsub`.
    pub fn qsub_args(&self) -> Vec<String> {
        self.directives()
            .into_iter()
            .flat_map(|(option, value)| [option.to_string(), value])
            .collect()
    }

    /// The directives as a `#PBS` header block, one per line.
    pub fn header(&self) -> String {
        self.directives()
            .into_iter()
            .map(|(option, value)| format!("#PBS {option} {value}\n"))
            .collect()
    }
}

fn escape(word: &str) -> Cow<'_, str> {
    shell_escape::escape(Cow::Borrowed(word))
}

/// Renders a complete job script: directives, environment setup, working
/// directory and the command.
pub fn render_job_script(
    directives: &PbsDirectives,
    environment: &EnvironmentSpec,
    command: &JobCommand,
) -> String {
    let mut script = String::from("#!/bin/bash\n");
    script.push_str(&directives.header());
    script.push('\n');

    // Explicit search paths are the base that `module use` and the
    // PYTHONPATH entries below are prepended to.
    let is_search_path = |key: &str| key == MODULEPATH || key == PYTHONPATH;
    for (key, value) in environment.vars.iter().filter(|(key, _)| is_search_path(key)) {
        let _ = writeln!(script, "export {key}={}", escape(value));
    }

    for path in &environment.modulepath {
        let path = environment.work_dir.join(path);
        let _ = writeln!(script, "module use {}", escape(&path.to_string_lossy()));
    }
    if !environment.modules.is_empty() {
        let modules: Vec<Cow<'_, str>> = environment.modules.iter().map(|m| escape(m)).collect();
        let _ = writeln!(script, "module load {}", modules.join(" "));
    }

    if !environment.pythonpath.is_empty() {
        let entries: Vec<String> = environment
            .pythonpath
            .iter()
            .map(|p| escape(&environment.work_dir.join(p).to_string_lossy()).into_owned())
            .collect();
        let _ = writeln!(
            script,
            "export {PYTHONPATH}={}${{{PYTHONPATH}:+:${PYTHONPATH}}}",
            entries.join(":")
        );
    }
    for (key, value) in environment.vars.iter().filter(|(key, _)| !is_search_path(key)) {
        let _ = writeln!(script, "export {key}={}", escape(value));
    }

    let _ = writeln!(
        script,
        "cd {}",
        escape(&environment.work_dir.to_string_lossy())
    );
    let _ = writeln!(script, "{command}");
    script
}

/// `qsub <script>`; resources come from the script's `#PBS` header.
pub fn build_qsub_command(qsub: &str, script: &Path) -> JobCommand {
    JobCommand::new(qsub).arg(script.to_string_lossy().into_owned())
}
