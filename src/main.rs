use catvault_core::{catalog::Catalog, engine::manifest::ManifestEngine};
use catvault_daemon::Daemon;
use clap::Parser;
use std::sync::Arc;

mod cli;
mod commands;

fn setup_logger() -> eyre::Result<()> {
    use tracing::Level;
    use tracing_subscriber::{
        filter::LevelFilter, fmt::layer, layer::SubscriberExt, util::SubscriberInitExt, Registry,
    };

    Registry::default()
        .with(LevelFilter::from(Level::INFO))
        .with(layer().with_ansi(true).with_target(false).without_time())
        .try_init()?;
    Ok(())
}

async fn load_catalog(args: &cli::Cli) -> eyre::Result<Catalog> {
    let catalog = match &args.catalog_string {
        Some(catalog_string) => Catalog::parse(catalog_string)?,
        None => Catalog::parse_file(args.catalog_file.path()?).await?,
    };
    Ok(catalog)
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    setup_logger()?;
    let args = cli::Cli::parse();
    let catalog = Arc::new(load_catalog(&args).await?);

    match args.subcommand {
        cli::Cmd::Backup(backup_args) => {
            let daemon = Daemon::new(catalog.clone(), Arc::new(ManifestEngine::new(catalog)));
            commands::backup(&daemon, backup_args).await
        }
        cli::Cmd::Restore(restore_args) => {
            let daemon = Daemon::new(catalog.clone(), Arc::new(ManifestEngine::new(catalog)));
            commands::restore(&daemon, restore_args).await
        }
        cli::Cmd::Config => commands::config(&catalog),
        cli::Cmd::Version => commands::version(),
    }
}
