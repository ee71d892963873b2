use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wr_cli::commands::{export_events, parse, scan, show, watch};
use wr_cli::{Cli, Commands, Config};

/// Load and check the configuration.
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so command output stays clean
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Some(Commands::Scan { json }) => {
            let config = load_config(cli.config.as_deref())?;
            scan::run(&mut out, &config, *json)?;
        }
        Some(Commands::Show { event, heat, json }) => {
            let config = load_config(cli.config.as_deref())?;
            show::run(&mut out, &config, event, *heat, *json)?;
        }
        Some(Commands::Parse { file, json }) => {
            // Parse doesn't need config - it reads a single file
            parse::run(&mut out, file, *json)?;
        }
        Some(Commands::ExportEvents { output }) => {
            let config = load_config(cli.config.as_deref())?;
            export_events::run(&mut out, &config, output.as_deref())?;
        }
        Some(Commands::Watch {
            interval_ms,
            iterations,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            watch::run(
                &mut out,
                &config,
                Duration::from_millis(*interval_ms),
                *iterations,
            )?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            writeln!(out)?;
        }
    }

    Ok(())
}
