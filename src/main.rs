use clap::Parser;
use colored::*;
use std::process;
use tracing_subscriber::EnvFilter;

use caduceus::cli::Cli;
use caduceus::core::resources::host_capacity_warnings;
use caduceus::{LaunchPlan, PipelineConfig};

fn main() {
    // Initialize logging with CADUCEUS_LOG environment variable support
    let log_level = std::env::var("CADUCEUS_LOG").unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);

        // Use appropriate exit codes based on error type
        let exit_code = match e.downcast_ref::<caduceus::CaduceusError>() {
            Some(caduceus::CaduceusError::Config(_)) => 2,
            Some(caduceus::CaduceusError::Io(_)) => 3,
            _ => 1,
        };
        process::exit(exit_code);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = PipelineConfig::resolve(&cli)?;
    config.validate()?;

    for note in host_capacity_warnings(&config.ceiling) {
        tracing::warn!("{}", note);
    }

    let plan = LaunchPlan::build(&config)?;

    if cli.plan_only {
        println!("{}", plan.to_json()?);
        return Ok(());
    }

    let snapshot = plan.write_snapshot(&config.output_dir)?;
    tracing::info!("launch plan written to {}", snapshot.display());

    plan.render_summary(cli.verbose > 0);
    Ok(())
}
