use crate::error::{ErrorKind, Result};
use clap::Args;
use exn::{OptionExt, ResultExt};
use std::process::ExitCode;
use toonshelf_catalog::Repository;

#[derive(Debug, Args)]
pub struct TitlesArgs {
    /// Include titles that have no readable pages
    #[arg(long)]
    all: bool,
}

#[derive(Debug, Args)]
pub struct EpisodesArgs {
    title_id: i64,
}

#[derive(Debug, Args)]
pub struct PagesArgs {
    episode_id: i64,
}

fn flag(available: bool) -> &'static str {
    if available { "" } else { "  (unavailable)" }
}

pub async fn titles(args: TitlesArgs, catalog: &Repository) -> Result<ExitCode> {
    let titles = if args.all { catalog.list_titles().await } else { catalog.list_readable_titles().await }
        .or_raise(|| ErrorKind::Catalog)?;
    for title in titles {
        println!("{:>6}  {}{}", title.id, title.name, flag(title.available));
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn episodes(args: EpisodesArgs, catalog: &Repository) -> Result<ExitCode> {
    let title = catalog
        .get_title(args.title_id)
        .await
        .or_raise(|| ErrorKind::Catalog)?
        .ok_or_raise(|| ErrorKind::NotFound(format!("title {}", args.title_id)))?;
    println!("{}", title.name);
    for episode in catalog.list_episodes(title.id).await.or_raise(|| ErrorKind::Catalog)? {
        println!("{:>6}  {:<9}  {}{}", episode.id, episode.kind().as_str(), episode.name, flag(episode.available));
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn pages(args: PagesArgs, catalog: &Repository) -> Result<ExitCode> {
    let episode = catalog
        .get_episode(args.episode_id)
        .await
        .or_raise(|| ErrorKind::Catalog)?
        .ok_or_raise(|| ErrorKind::NotFound(format!("episode {}", args.episode_id)))?;
    let (previous, next) = catalog.adjacent_episodes(&episode).await.or_raise(|| ErrorKind::Catalog)?;
    println!("{}{}", episode.name, flag(episode.available));
    if let Some(previous) = previous {
        println!("  previous: {} ({})", previous.name, previous.id);
    }
    if let Some(next) = next {
        println!("  next:     {} ({})", next.name, next.id);
    }
    for page in catalog.list_pages(episode.id).await.or_raise(|| ErrorKind::Catalog)? {
        println!("{:>6}  {}{}", page.position, page.filename, flag(page.available));
    }
    Ok(ExitCode::SUCCESS)
}
