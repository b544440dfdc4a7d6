use crate::cli;
use catvault_core::{
    catalog::Catalog,
    descriptor::{Descriptor, Direction, OptionFlags},
    filter::Selectors,
};
use catvault_daemon::{job::controller::ControlError, poll::Outcome, Daemon};

pub async fn backup(daemon: &Daemon, args: cli::backup::Cli) -> eyre::Result<()> {
    let descriptor = Descriptor::new(
        Direction::Backup,
        args.archive,
        selectors(args.selectors),
        OptionFlags {
            overwrite: args.overwrite,
            best_effort: args.best_effort,
            cleanup_temp: args.cleanup_temp,
            dry_run: false,
        },
    )?;
    run_job(daemon, descriptor).await
}

pub async fn restore(daemon: &Daemon, args: cli::restore::Cli) -> eyre::Result<()> {
    let descriptor = Descriptor::new(
        Direction::Restore,
        args.archive,
        selectors(args.selectors),
        OptionFlags {
            overwrite: args.overwrite,
            best_effort: args.best_effort,
            cleanup_temp: args.cleanup_temp,
            dry_run: args.dry_run,
        },
    )?;
    run_job(daemon, descriptor).await
}

pub fn config(catalog: &Catalog) -> eyre::Result<()> {
    print!("{}", toml::to_string_pretty(catalog)?);
    Ok(())
}

pub fn version() -> eyre::Result<()> {
    if let Some(version) = catvault_core::VERSION {
        println!("catvault: {}", version);
    } else {
        println!("catvault: [untagged build]");
    }
    Ok(())
}

fn selectors(args: cli::Selectors) -> Selectors {
    Selectors {
        workspace: args.workspace,
        store: args.store,
        layer: args.layer,
    }
}

/// Launches the job and polls it until a terminal observation, forwarding
/// Ctrl-C as a cooperative stop request. The poll loop keeps running after a
/// stop request so the final state is still observed.
async fn run_job(daemon: &Daemon, descriptor: Descriptor) -> eyre::Result<()> {
    let id = daemon.controller.launch(descriptor).await?;
    let poller = daemon.poller();

    let mut last_reported = None;
    let watch = poller.watch(id, |snapshot| {
        let report = (snapshot.state, (snapshot.progress * 100.0) as u8);
        if last_reported != Some(report) {
            tracing::info!(state = %snapshot.state, progress = %format_args!("{}%", report.1));
            last_reported = Some(report);
        }
    });
    tokio::pin!(watch);

    let outcome = loop {
        tokio::select! {
            outcome = &mut watch => break outcome?,
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("interrupt received, stopping job");
                match daemon.controller.stop(id).await {
                    Ok(()) => {}
                    // the job reached a terminal state on its own
                    Err(ControlError::NotRunning(_)) => {}
                    Err(error) => return Err(error.into()),
                }
            }
        }
    };

    match outcome {
        Outcome::Failed(failure) => Err(eyre::eyre!("job failed: {}", failure.message())),
        Outcome::QuietStop => {
            tracing::info!("job stopped");
            Ok(())
        }
        Outcome::Detail { id, direction } => {
            let time_format =
                time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
            let snapshot = daemon.controller.status(id).await?;
            println!("{} job {}: {}", direction, id, snapshot.state);
            println!("started: {}", snapshot.started.format(&time_format)?);
            for warning in &snapshot.warnings {
                println!("warning: {}", warning.message());
            }
            Ok(())
        }
    }
}
