use clap::Parser;
use dclaunch::core::error::LaunchError;
use dclaunch::core::executor::process_exit_code;
use std::process::ExitCode;

mod cli;
mod commands;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = cli::DcLaunch::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.verbosity)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("{:?}", args.command);

    match commands::handle_commands(args.profile.as_ref(), args.command).await {
        Ok(code) => ExitCode::from(process_exit_code(code)),
        Err(err) => {
            eprintln!("{err:?}");
            let code = err
                .downcast_ref::<LaunchError>()
                .map(LaunchError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}
