use crate::error::{ErrorKind, Result};
use clap::Args;
use exn::ResultExt;
use futures::StreamExt;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use toonshelf_catalog::Repository;
use toonshelf_config::Config;
use toonshelf_library::MediaResolver;

#[derive(Debug, Args)]
pub struct PageArgs {
    episode_id: i64,
    /// Page file name, or member path for archive episodes
    filename: String,
    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub async fn run(args: PageArgs, config: &Config, catalog: Repository) -> Result<ExitCode> {
    let resolver = MediaResolver::new(catalog).with_archive_open_timeout(config.scan.archive_open_timeout());
    let page = match resolver.resolve(args.episode_id, &args.filename).await {
        Ok(page) => page,
        Err(err) if err.is_not_found() => {
            tracing::debug!(error = ?err, "Page lookup failed");
            exn::bail!(ErrorKind::NotFound(format!("page {} of episode {}", args.filename, args.episode_id)));
        },
        Err(err) => return Err(err).or_raise(|| ErrorKind::Media),
    };
    tracing::debug!(content_type = page.content_type, "Writing page");

    let mut out: Box<dyn AsyncWrite + Unpin + Send> = match &args.output {
        Some(path) => Box::new(tokio::fs::File::create(path).await.or_raise(|| ErrorKind::Output)?),
        None => Box::new(tokio::io::stdout()),
    };
    let mut stream = page.stream;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.or_raise(|| ErrorKind::Media)?;
        out.write_all(&chunk).await.or_raise(|| ErrorKind::Output)?;
    }
    out.flush().await.or_raise(|| ErrorKind::Output)?;
    Ok(ExitCode::SUCCESS)
}
