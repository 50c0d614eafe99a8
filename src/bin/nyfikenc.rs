//! nyfikenc - check and handle updates from nyfikend.

use anyhow::{Context, Result};
use clap::Parser;
use nyfiken::client::browser::ProcessLauncher;
use nyfiken::client::session::{Action, Outcome, Session};
use nyfiken::common::logging::init_logging;
use nyfiken::common::paths::Paths;
use nyfiken::common::settings::Config;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "nyfikenc")]
#[command(about = "Check and handle updates from nyfikend")]
struct Args {
    /// Force a recheck of all pages
    #[arg(short = 'f')]
    force: bool,

    /// Clear the list of updated pages
    #[arg(short = 'c')]
    clear: bool,

    /// Read all updated pages in your browser
    #[arg(short = 'r')]
    read: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Use this directory instead of the platform nyfiken root
    #[arg(long)]
    root: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(outcome) => {
            println!("{}", outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("nyfikenc: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<Outcome> {
    let paths = match &args.root {
        Some(root) => Paths::from_root(root),
        None => Paths::resolve(),
    };
    let config = Config::load(paths).context("Failed to load settings")?;

    let action = Action::from_flags(args.force, args.clear, args.read);
    let mut session = Session::new(&config, ProcessLauncher);
    session.run(action).with_context(|| match action {
        Action::List => "Failed to list updates",
        Action::ForceRecheck => "Failed to request a recheck",
        Action::ClearAll => "Failed to clear updates",
        Action::OpenInBrowser => "Failed to open updates",
    })
}
