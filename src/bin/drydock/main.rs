//! Drydock CLI - a source-based package manager for C/C++

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use drydock::util::signal;

mod cli;
mod commands;

use cli::{CatalogCommands, Cli, Commands, RepoCommands, SdistCommands};

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("drydock=debug")
    } else {
        EnvFilter::new("drydock=info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    signal::install_signal_handlers();

    match run(cli) {
        Ok(()) => {}
        Err(e) => {
            std::process::exit(report_error(&e));
        }
    }
}

/// Translate a failure into an exit code: 1 for classified user errors,
/// 2 for cancellation and internal failures.
fn report_error(e: &anyhow::Error) -> i32 {
    if let Some(err) = e.downcast_ref::<drydock::Error>() {
        if err.kind() == drydock::Errc::UserCancelled {
            tracing::error!("operation cancelled by user");
            return 2;
        }
        tracing::error!("{}", err);
        tracing::error!("{}", err.explanation());
        tracing::error!("refer: {}", err.reference());
        return 1;
    }
    tracing::error!("{:#}", e);
    2
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build(args) => commands::build::execute(args),
        Commands::BuildDeps(args) => commands::build_deps::execute(args),
        Commands::Sdist { command } => match command {
            SdistCommands::Create(args) => commands::sdist::create(args),
            SdistCommands::Export(args) => commands::sdist::export(args),
        },
        Commands::Repo { command } => match command {
            RepoCommands::Init(args) => commands::repo::init(args),
            RepoCommands::Ls(args) => commands::repo::ls(args),
        },
        Commands::Catalog { command } => match command {
            CatalogCommands::Create(args) => commands::catalog::create(args),
            CatalogCommands::Import(args) => commands::catalog::import(args),
            CatalogCommands::Get(args) => commands::catalog::get(args),
            CatalogCommands::Add(args) => commands::catalog::add(args),
            CatalogCommands::List(args) => commands::catalog::list(args),
            CatalogCommands::Show(args) => commands::catalog::show(args),
        },
    }
}
