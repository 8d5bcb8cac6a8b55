use crate::error::{ErrorKind, Result};
use clap::Args;
use exn::ResultExt;
use std::process::ExitCode;
use toonshelf_catalog::Repository;
use toonshelf_config::Config;
use toonshelf_library::{Context, ScanJobController, ScanMode};

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Re-index every episode instead of only adding new ones
    #[arg(long)]
    thorough: bool,
    /// Print the final status as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(args: ScanArgs, config: &Config, catalog: Repository) -> Result<ExitCode> {
    let ctx = Context::new(&config.library.root).with_archive_open_timeout(config.scan.archive_open_timeout());
    let jobs = ScanJobController::new(ctx, catalog);
    let mode = if args.thorough { ScanMode::Thorough } else { ScanMode::Regular };
    jobs.start(mode);

    let mut ticker = tokio::time::interval(config.scan.poll_interval());
    let mut last_message = String::new();
    loop {
        tokio::select! {
            _ = ticker.tick() => {},
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Stopping scan...");
                jobs.stop().await;
                break;
            },
        }
        let status = jobs.status();
        if !status.running {
            break;
        }
        if !args.json && status.message != last_message {
            eprintln!("[{:>3}%] {}", status.progress, status.message);
            last_message = status.message;
        }
    }
    jobs.join().await;

    let status = jobs.status();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&status).or_raise(|| ErrorKind::Output)?);
    } else {
        println!("{} ({}/{} titles, {} errors)", status.message, status.done, status.total, status.errors);
    }
    Ok(if status.completed && status.errors == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
