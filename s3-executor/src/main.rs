use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser as _;
use color_eyre::eyre::Result;
use dotenvy::dotenv;
use s3_executor::cli::{Cli, Commands, OutputFormat, RunCmd};
use s3_executor::config::load_step;
use s3_executor::utils::logging::init_logging;
use s3_executor::{available_commands, Executor, StepResult};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    if let Err(e) = init_logging() {
        report_without_logging(&e);
        return ExitCode::FAILURE;
    }
    let cli = Cli::parse();

    let outcome = match &cli.command {
        Commands::Run { run_command } => run_step(run_command).await,
        Commands::Commands => list_commands(),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "s3-executor failed");
            ExitCode::FAILURE
        }
    }
}

async fn run_step(run_cmd: &RunCmd) -> Result<()> {
    let step = load_step(run_cmd)?;
    info!(command = %step.command, "Running step");

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let result = Executor::new().run(cancel, &step).await?;
    write_result(&result, run_cmd.output)?;
    info!(command = %step.command, "Step finished");
    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("Received ctrl+c, cancelling step");
            cancel.cancel();
        }
        Err(e) => error!(error = %e, "Failed to listen for ctrl+c"),
    }
}

fn write_result(result: &StepResult, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
        OutputFormat::Yaml => serde_yaml::to_string(result)?,
    };
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", rendered.trim_end())?;
    Ok(())
}

// Logging is not up yet, so stderr is the only place the error can go
#[allow(clippy::print_stderr)]
fn report_without_logging(e: &color_eyre::Report) {
    eprintln!("Failed to initialize logging: {:?}", e);
}

fn list_commands() -> Result<()> {
    let mut stdout = io::stdout().lock();
    for command in available_commands() {
        writeln!(stdout, "{}", command)?;
    }
    Ok(())
}
