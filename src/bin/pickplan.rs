// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use pickplan::{Git2Backend, PlanStore, Settings};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "pickplan <command> [<args>]...",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let backend = Git2Backend::discover(".")?;
        let settings = Settings::load(&backend)?;
        let detector = settings.detector()?;
        let file = |file: Option<PathBuf>| -> Result<PathBuf> {
            match file {
                Some(file) => Ok(file),
                None => Ok(settings.default_plan_file(&backend)?),
            }
        };

        match self.command {
            Command::Make(opts) => {
                let path = file(opts.file)?;
                let store = PlanStore::new(backend, detector);
                run_make(&store, opts.branch, opts.limit, path)
            }
            Command::Pull(opts) => {
                let path = file(opts.file)?;
                let store = PlanStore::new(backend, detector);
                run_pull(&store, opts.branch, path)
            }
            Command::Apply(opts) => {
                let path = file(opts.file)?;
                let store = PlanStore::new(backend, detector);
                run_apply(&store, path)
            }
            Command::Mark(opts) => {
                let path = file(opts.file)?;
                let store = PlanStore::new(backend, detector);
                run_mark(&store, path, opts.branch)
            }
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Create new plan of commits to cherry-pick from a branch.
    #[command(override_usage = "pickplan make <branch> [<limit> [<file>]]")]
    Make(MakeOptions),

    /// Append commits that appeared on a branch since the plan was built.
    #[command(override_usage = "pickplan pull <branch> [<file>]")]
    Pull(PullOptions),

    /// Cherry-pick every pick line of a plan.
    #[command(override_usage = "pickplan apply [<file>]")]
    Apply(ApplyOptions),

    /// Mark commits of a plan that were already applied as noop.
    #[command(override_usage = "pickplan mark [options] [<file>]")]
    Mark(MarkOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct MakeOptions {
    /// Branch to cherry-pick commits from.
    #[arg(value_name = "branch")]
    pub branch: String,

    /// Leave out commits reachable from this revision [default: HEAD].
    #[arg(value_name = "limit")]
    pub limit: Option<String>,

    /// Plan file to create [default: <dir>/<current-branch>.plan].
    #[arg(value_name = "file")]
    pub file: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PullOptions {
    /// Branch to pull new commits from.
    #[arg(value_name = "branch")]
    pub branch: String,

    /// Plan file to extend [default: <dir>/<current-branch>.plan].
    #[arg(value_name = "file")]
    pub file: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ApplyOptions {
    /// Plan file to apply [default: <dir>/<current-branch>.plan].
    #[arg(value_name = "file")]
    pub file: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct MarkOptions {
    /// Plan file to mark [default: <dir>/<current-branch>.plan].
    #[arg(value_name = "file")]
    pub file: Option<PathBuf>,

    /// Source branch to compare against instead of the one in the header.
    #[arg(short, long, value_name = "branch")]
    pub branch: Option<String>,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_make(
    store: &PlanStore<Git2Backend>,
    branch: String,
    limit: Option<String>,
    path: PathBuf,
) -> Result<()> {
    let path = store.make(&branch, limit.as_deref(), path)?;
    println!("{}", path.display());

    Ok(())
}

fn run_pull(store: &PlanStore<Git2Backend>, branch: String, path: PathBuf) -> Result<()> {
    store.pull(&branch, path)?;

    Ok(())
}

fn run_apply(store: &PlanStore<Git2Backend>, path: PathBuf) -> Result<()> {
    store.apply(path)?;

    Ok(())
}

fn run_mark(store: &PlanStore<Git2Backend>, path: PathBuf, branch: Option<String>) -> Result<()> {
    store.mark(path, branch.as_deref())?;

    Ok(())
}
