//! Command-line front end for a toonshelf library.

mod commands;
mod error;

use crate::commands::Command;
use crate::error::{ErrorKind, Result};
use clap::{ArgAction, Parser};
use exn::ResultExt;
use std::path::PathBuf;
use std::process::ExitCode;
use toonshelf_catalog::Database;
use toonshelf_config::Config;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "toonshelf", version, about = "Catalog and read a comic library")]
struct Cli {
    /// Config file (toml, yaml or json)
    #[arg(long, global = true, env = "TOONSHELF_CONFIG")]
    config: Option<PathBuf>,
    /// Log more; repeat for even more
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

/// `RUST_LOG` wins over `-v`/`-q` when set.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let db = open_catalog(&config).await?;
    let outcome = cli.command.run(&config, &db).await;
    db.close().await;
    outcome
}

async fn open_catalog(config: &Config) -> Result<Database> {
    let path = &config.catalog.path;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Catalog)?;
    }
    tracing::debug!(path = %path.display(), "Opening catalog");
    Database::connect_with(path, config.catalog.max_connections).await.or_raise(|| ErrorKind::Catalog)
}
