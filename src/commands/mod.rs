mod browse;
mod page;
mod scan;

use crate::error::Result;
use clap::Subcommand;
use std::process::ExitCode;
use toonshelf_catalog::{Database, Repository};
use toonshelf_config::Config;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Bring the catalog in line with the library on disk
    Scan(scan::ScanArgs),
    /// List titles
    Titles(browse::TitlesArgs),
    /// List the episodes of a title, in reading order
    Episodes(browse::EpisodesArgs),
    /// List the pages of an episode
    Pages(browse::PagesArgs),
    /// Write one page to a file or to stdout
    Page(page::PageArgs),
}
impl Command {
    pub async fn run(self, config: &Config, db: &Database) -> Result<ExitCode> {
        let catalog = Repository::from(db);
        match self {
            Command::Scan(args) => scan::run(args, config, catalog).await,
            Command::Titles(args) => browse::titles(args, &catalog).await,
            Command::Episodes(args) => browse::episodes(args, &catalog).await,
            Command::Pages(args) => browse::pages(args, &catalog).await,
            Command::Page(args) => page::run(args, config, catalog).await,
        }
    }
}
