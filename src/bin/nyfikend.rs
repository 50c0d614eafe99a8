//! nyfikend - keeps the pending-update set and answers nyfikenc.

use anyhow::{Context, Result};
use clap::Parser;
use nyfiken::common::logging::init_logging;
use nyfiken::common::paths::Paths;
use nyfiken::common::settings::Config;
use nyfiken::daemon::scheduler::{IdleScraper, Scheduler};
use nyfiken::daemon::server::DaemonServer;
use nyfiken::daemon::state::UpdateStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "nyfikend")]
#[command(about = "Watch pages and keep track of which ones changed")]
struct Args {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Use this directory instead of the platform nyfiken root
    #[arg(long)]
    root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let paths = match args.root {
        Some(root) => Paths::from_root(root),
        None => Paths::resolve(),
    };
    paths
        .ensure_layout()
        .context("Failed to create nyfiken directories")?;
    let config = Config::load(paths).context("Failed to load settings")?;

    let store = UpdateStore::load(&config.paths.updates)
        .context("Failed to load pending updates")?
        .with_file_perms(config.settings.file_perms);
    info!(
        "{} pending updates from {}",
        store.updates().len(),
        store.path().display()
    );

    let store = Arc::new(RwLock::new(store));
    let recheck = Arc::new(Notify::new());
    let shutdown = Arc::new(Notify::new());

    // Set up signal handler for graceful shutdown
    let on_signal = shutdown.clone();
    ctrlc::set_handler(move || on_signal.notify_one())
        .context("Error setting Ctrl-C handler")?;

    let server = DaemonServer::bind(
        config.settings.daemon_addr(),
        store.clone(),
        recheck.clone(),
    )
    .await?;

    let scheduler = Scheduler::new(
        store,
        recheck,
        config.settings.interval(),
        Arc::new(IdleScraper),
    );
    tokio::spawn(scheduler.run());

    server.run(shutdown).await
}
