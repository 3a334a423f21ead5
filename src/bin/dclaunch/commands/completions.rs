use crate::cli::DcLaunch;
use anyhow::Result;
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io;

pub(crate) fn handle_completions(shell: Shell) -> Result<i32> {
    let mut cmd = DcLaunch::command();
    generate(shell, &mut cmd, env!("CARGO_PKG_NAME"), &mut io::stdout());
    Ok(0)
}
