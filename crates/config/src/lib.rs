//! Layered configuration for toonshelf.
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults (data files under the platform data directory).
//! 2. A config file: `toml`, `yaml`/`yml` or `json`, picked by extension.
//!    Defaults to `config.toml` in the platform config directory, which may
//!    be absent. A file named explicitly must exist.
//! 3. The legacy `WEBTOON_LIBRARY` variable, for the library root only.
//! 4. `TOONSHELF_*` environment variables, nesting with `__`
//!    (`TOONSHELF_CATALOG__MAX_CONNECTIONS=8`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "TOONSHELF_";
pub const LEGACY_LIBRARY_ENV: &str = "WEBTOON_LIBRARY";
const APPLICATION: &str = "toonshelf";
const DEFAULT_CONFIG_FILE: &str = "config.toml";
const DEFAULT_CATALOG_FILE: &str = "catalog.db";

/// Where to look for a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigFile {
    /// Named by the user; must exist.
    Required(PathBuf),
    /// The default location; skipped when absent.
    Optional(PathBuf),
}
impl ConfigFile {
    pub fn path(&self) -> &Path {
        match self {
            ConfigFile::Required(path) | ConfigFile::Optional(path) => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub library: LibraryConfig,
    pub catalog: CatalogConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Content root: one directory per title.
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// SQLite database file.
    pub path: PathBuf,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Seconds an archive may take to open before it counts as unreadable.
    pub archive_open_timeout: u64,
    /// Milliseconds between progress refreshes on the command line.
    pub poll_interval: u64,
}
impl ScanConfig {
    pub fn archive_open_timeout(&self) -> Duration {
        Duration::from_secs(self.archive_open_timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval)
    }
}

impl Config {
    /// Built-in defaults, keeping the catalog inside `data_dir`.
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            library: LibraryConfig { root: PathBuf::from("library") },
            catalog: CatalogConfig { path: data_dir.join(DEFAULT_CATALOG_FILE), max_connections: 5 },
            scan: ScanConfig { archive_open_timeout: 30, poll_interval: 250 },
        }
    }

    /// Load from every source, using the platform directories for defaults.
    ///
    /// `file` overrides the default config file location and must exist.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let dirs = ProjectDirs::from("", "", APPLICATION).ok_or_raise(|| ErrorKind::NoHomeDirectory)?;
        let file = match file {
            Some(path) => ConfigFile::Required(path.to_path_buf()),
            None => ConfigFile::Optional(dirs.config_dir().join(DEFAULT_CONFIG_FILE)),
        };
        Self::from_figment(Self::figment(Self::with_data_dir(dirs.data_dir()), &file)?)
    }

    /// Layer `defaults`, the config file and the environment.
    pub fn figment(defaults: Config, file: &ConfigFile) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(defaults));
        let figment = match file {
            ConfigFile::Optional(path) if !path.exists() => {
                tracing::debug!(path = %path.display(), "No config file; using defaults");
                figment
            },
            ConfigFile::Required(path) if !path.exists() => exn::bail!(ErrorKind::MissingFile(path.clone())),
            _ => merge_file(figment, file.path())?,
        };
        Ok(figment
            .merge(Env::raw().only(&[LEGACY_LIBRARY_ENV]).map(|_| "library.root".into()))
            .merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.library.root.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("library.root must not be empty"));
        }
        if self.catalog.path.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("catalog.path must not be empty"));
        }
        if self.catalog.max_connections == 0 {
            exn::bail!(ErrorKind::Invalid("catalog.max_connections must be at least 1"));
        }
        if self.scan.archive_open_timeout == 0 {
            exn::bail!(ErrorKind::Invalid("scan.archive_open_timeout must be at least 1 second"));
        }
        if self.scan.poll_interval == 0 {
            exn::bail!(ErrorKind::Invalid("scan.poll_interval must be at least 1 millisecond"));
        }
        Ok(())
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file_exact(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
        Some("json") => figment.merge(Json::file_exact(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    })
}
