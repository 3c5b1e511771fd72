//! `drydock build-deps`

use anyhow::Result;

use drydock::ops::{build_deps, BuildDepsOptions};

use crate::cli::BuildDepsArgs;
use crate::commands::{catalog_path, repo_path, resolve_toolchain};

pub fn execute(args: BuildDepsArgs) -> Result<()> {
    let toolchain = resolve_toolchain(&args.toolchain)?;

    build_deps(&BuildDepsOptions {
        catalog_path: catalog_path(&args.catalog),
        repo_path: repo_path(&args.repo_dir),
        toolchain,
        out_root: args.out,
        parallel_jobs: args.jobs,
        lmi_path: args.lmi_path,
        deps: args.dependencies,
        deps_files: args.deps_files,
    })
}
