use std::io::Write;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use wls_cli::commands::{export, mapping, push, status, util};
use wls_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match command {
        Commands::Export(args) => {
            let stderr = std::io::stderr();
            export::run(&mut out, &mut stderr.lock(), args, &config)?;
        }
        Commands::Push(args) => push::run(&mut out, args, &config)?,
        Commands::Mapping(command) => {
            let mut db = util::open_database(&config)?;
            mapping::run(&mut out, &mut db, command)?;
        }
        Commands::Status => status::run(&mut out, &config)?,
    }
    out.flush()?;

    Ok(())
}
