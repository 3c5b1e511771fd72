//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "drydock",
    version,
    about = "A source-based package manager and build system for C/C++"
)]
pub struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a project
    Build(BuildArgs),
    /// Build a set of dependencies and emit a library index
    BuildDeps(BuildDepsArgs),
    /// Work with source distributions
    Sdist {
        #[command(subcommand)]
        command: SdistCommands,
    },
    /// Manage the local package repository
    Repo {
        #[command(subcommand)]
        command: RepoCommands,
    },
    /// Manage the package catalog
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
}

#[derive(Args)]
pub struct BuildArgs {
    /// Path to the directory containing the project
    #[arg(short = 'p', long, default_value = ".")]
    pub project_dir: PathBuf,

    /// Path/identifier of the toolchain to use (`:name` for a built-in)
    #[arg(short, long)]
    pub toolchain: Option<String>,

    /// Override the path to the catalog database
    #[arg(short, long)]
    pub catalog: Option<PathBuf>,

    /// Path to the package repository directory
    #[arg(long)]
    pub repo_dir: Option<PathBuf>,

    /// Do not build and run tests
    #[arg(long)]
    pub no_tests: bool,

    /// Do not compile and link applications
    #[arg(long)]
    pub no_apps: bool,

    /// Disable build warnings
    #[arg(long)]
    pub no_warnings: bool,

    /// Path to an existing library index from which to load deps
    /// (usually INDEX.lmi)
    #[arg(short = 'I', long)]
    pub lm_index: Option<PathBuf>,

    /// Set the number of parallel jobs when compiling files
    #[arg(short = 'j', long, default_value_t = 0)]
    pub jobs: i32,

    /// The root build directory
    #[arg(long, default_value = "_build")]
    pub out: PathBuf,
}

#[derive(Args)]
pub struct BuildDepsArgs {
    /// Path/identifier of the toolchain to use (`:name` for a built-in)
    #[arg(short, long)]
    pub toolchain: Option<String>,

    /// Override the path to the catalog database
    #[arg(short, long)]
    pub catalog: Option<PathBuf>,

    /// Path to the package repository directory
    #[arg(long)]
    pub repo_dir: Option<PathBuf>,

    /// Set the number of parallel jobs when compiling files
    #[arg(short = 'j', long, default_value_t = 0)]
    pub jobs: i32,

    /// Install dependencies from the named files
    #[arg(short, long = "deps")]
    pub deps_files: Vec<PathBuf>,

    /// Directory where build results should be placed
    #[arg(short, long, default_value = "_deps")]
    pub out: PathBuf,

    /// Path to the output library index file (INDEX.lmi)
    #[arg(long, default_value = "INDEX.lmi")]
    pub lmi_path: PathBuf,

    /// List of dependencies to build (`name@version`)
    pub dependencies: Vec<String>,
}

#[derive(Subcommand)]
pub enum SdistCommands {
    /// Create a source distribution from a project
    Create(SdistCreateArgs),
    /// Create a source distribution and install it into a repository
    Export(SdistExportArgs),
}

#[derive(Args)]
pub struct SdistCreateArgs {
    /// Path to the directory containing the project
    #[arg(short = 'p', long, default_value = ".")]
    pub project_dir: PathBuf,

    /// The destination of the source distribution
    #[arg(long, default_value = "project.sdist")]
    pub out: PathBuf,

    /// Forcibly replace an existing distribution
    #[arg(long)]
    pub replace: bool,
}

#[derive(Args)]
pub struct SdistExportArgs {
    /// Path to the directory containing the project
    #[arg(short = 'p', long, default_value = ".")]
    pub project_dir: PathBuf,

    /// Path to the package repository directory
    #[arg(long)]
    pub repo_dir: Option<PathBuf>,

    /// Replace an existing export in the repository
    #[arg(long)]
    pub replace: bool,
}

#[derive(Subcommand)]
pub enum RepoCommands {
    /// Initialize a directory as a repository
    Init(RepoArgs),
    /// List repository contents
    Ls(RepoArgs),
}

#[derive(Args)]
pub struct RepoArgs {
    /// Path to the package repository directory
    #[arg(long)]
    pub repo_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// Create a catalog database
    Create(CatalogPathArgs),
    /// Import entries into a catalog
    Import(CatalogImportArgs),
    /// Obtain source distributions from catalog listings
    Get(CatalogGetArgs),
    /// Manually add an entry to the catalog database
    Add(CatalogAddArgs),
    /// List the contents of the catalog
    List(CatalogListArgs),
    /// Show information about a single package in the catalog
    Show(CatalogShowArgs),
}

#[derive(Args)]
pub struct CatalogPathArgs {
    /// Override the path to the catalog database
    #[arg(short, long)]
    pub catalog: Option<PathBuf>,
}

#[derive(Args)]
pub struct CatalogImportArgs {
    /// Override the path to the catalog database
    #[arg(short, long)]
    pub catalog: Option<PathBuf>,

    /// Import catalog entries from the given JSON files
    #[arg(short, long = "json")]
    pub json_paths: Vec<PathBuf>,

    /// Import JSON from stdin
    #[arg(long)]
    pub stdin: bool,
}

#[derive(Args)]
pub struct CatalogGetArgs {
    /// Override the path to the catalog database
    #[arg(short, long)]
    pub catalog: Option<PathBuf>,

    /// The directory where the source distributions will be placed
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    /// The package IDs to obtain
    #[arg(required = true)]
    pub requirements: Vec<String>,
}

#[derive(Args)]
pub struct CatalogAddArgs {
    /// Override the path to the catalog database
    #[arg(short, long)]
    pub catalog: Option<PathBuf>,

    /// The name@version ID of the package to add
    pub id: String,

    /// The dependencies of this package (`name@version`)
    #[arg(short, long = "depends")]
    pub depends: Vec<String>,

    /// The Git url for the package
    #[arg(long)]
    pub git_url: Option<String>,

    /// The Git ref from which the source distribution should be created
    #[arg(long)]
    pub git_ref: Option<String>,

    /// Set the auto-library information (`namespace/name`) for this package
    #[arg(long)]
    pub auto_lib: Option<String>,

    /// A description of the package
    #[arg(long = "desc", default_value = "")]
    pub description: String,
}

#[derive(Args)]
pub struct CatalogListArgs {
    /// Override the path to the catalog database
    #[arg(short, long)]
    pub catalog: Option<PathBuf>,

    /// Only list packages with the given name
    #[arg(short, long)]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct CatalogShowArgs {
    /// Override the path to the catalog database
    #[arg(short, long)]
    pub catalog: Option<PathBuf>,

    /// The package ID to show
    pub id: String,
}
