use dirs_next as dirs;
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

#[derive(Debug, Clone)]
pub struct CatalogFile(Option<PathBuf>);

impl CatalogFile {
    pub fn path(&self) -> eyre::Result<&Path> {
        self.0
            .as_deref()
            .ok_or_else(|| eyre::eyre!("failed to get default catalog file path"))
    }
}

impl Default for CatalogFile {
    fn default() -> Self {
        let default_path = dirs::config_dir().map(|dir| dir.join("catvault").join("catalog.toml"));
        CatalogFile(default_path)
    }
}

impl FromStr for CatalogFile {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CatalogFile(Some(PathBuf::from(s))))
    }
}

impl std::fmt::Display for CatalogFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(path) => write!(f, "{}", path.display()),
            None => write!(f, "<none>"),
        }
    }
}

/// Asynchronous backup and restore for a layered catalog.
#[derive(clap::Parser)]
pub struct Cli {
    /// Sets a custom catalog file path
    #[arg(short, long, env = "CATVAULT_CATALOG_FILE", default_value_t)]
    pub catalog_file: CatalogFile,

    /// Sets the catalog from a string
    #[arg(long, env = "CATVAULT_CATALOG")]
    pub catalog_string: Option<String>,

    #[command(subcommand)]
    pub subcommand: Cmd,
}

#[derive(clap::Subcommand)]
pub enum Cmd {
    /// Backs up catalog entries into an archive
    Backup(backup::Cli),

    /// Restores catalog entries from an archive
    Restore(restore::Cli),

    /// Prints the active catalog
    Config,

    /// Prints version information
    Version,
}

#[derive(clap::Args)]
pub struct Selectors {
    /// Only includes the workspace with this name
    #[arg(long, value_name = "NAME")]
    pub workspace: Option<String>,

    /// Only includes the store with this name
    #[arg(long, value_name = "NAME")]
    pub store: Option<String>,

    /// Only includes the layer with this name
    #[arg(long, value_name = "NAME")]
    pub layer: Option<String>,
}

pub mod backup {
    use std::path::PathBuf;

    #[derive(clap::Args)]
    pub struct Cli {
        /// The archive file to write
        #[arg(value_name = "ARCHIVE")]
        pub archive: PathBuf,

        #[command(flatten)]
        pub selectors: super::Selectors,

        /// Replaces the archive if it already exists
        #[arg(long)]
        pub overwrite: bool,

        /// Keeps going past failed entries instead of aborting
        #[arg(long)]
        pub best_effort: bool,

        /// Removes staging files when the job finishes
        #[arg(long)]
        pub cleanup_temp: bool,
    }
}

pub mod restore {
    use std::path::PathBuf;

    #[derive(clap::Args)]
    pub struct Cli {
        /// The archive file to read
        #[arg(value_name = "ARCHIVE")]
        pub archive: PathBuf,

        #[command(flatten)]
        pub selectors: super::Selectors,

        /// Overwrites entries that already exist in the catalog
        #[arg(long)]
        pub overwrite: bool,

        /// Keeps going past failed entries instead of aborting
        #[arg(long)]
        pub best_effort: bool,

        /// Removes staging files when the job finishes
        #[arg(long)]
        pub cleanup_temp: bool,

        /// Validates the restore without touching the catalog
        #[arg(long)]
        pub dry_run: bool,
    }
}
