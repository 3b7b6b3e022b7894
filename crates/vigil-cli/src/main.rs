//! Vigil CLI binary entrypoint.

use std::io;
use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vigil_cli::cli::{Cli, Commands};
use vigil_cli::commands::{
    DispatchCommand, FilterCommand, MediaCommand, ProfileCommand, ScheduleCommand,
};
use vigil_cli::fixture::Context;
use vigil_cli::output::OutputFormat;

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), vigil_cli::CliError> {
    let ctx = Context::from_cli(&cli)?;
    let at = cli.at.unwrap_or_else(Utc::now);
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Filter { command } => {
            FilterCommand::new(&ctx, at).execute(&mut stdout, &format, &command)?;
        }
        Commands::Schedule { command } => {
            ScheduleCommand::new(&ctx, at).execute(&mut stdout, &format, &command)?;
        }
        Commands::Profile { command } => {
            ProfileCommand::new(&ctx, at).execute(&mut stdout, &format, &command)?;
        }
        Commands::Dispatch(args) => {
            DispatchCommand::new(&ctx, at)
                .execute(&mut stdout, &format, &args)
                .await?;
        }
        Commands::Media { command } => {
            MediaCommand::new(&ctx).execute(&mut stdout, &format, &command)?;
        }
    }

    Ok(())
}
