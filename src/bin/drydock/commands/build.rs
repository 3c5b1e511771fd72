//! `drydock build`

use anyhow::Result;

use drydock::ops::{build_project, ProjectBuildOptions};

use crate::cli::BuildArgs;
use crate::commands::{catalog_path, repo_path, resolve_toolchain};

pub fn execute(args: BuildArgs) -> Result<()> {
    let toolchain = resolve_toolchain(&args.toolchain)?;

    build_project(&ProjectBuildOptions {
        project_dir: args.project_dir,
        catalog_path: catalog_path(&args.catalog),
        repo_path: repo_path(&args.repo_dir),
        toolchain,
        out_root: args.out,
        build_apps: !args.no_apps,
        build_tests: !args.no_tests,
        enable_warnings: !args.no_warnings,
        parallel_jobs: args.jobs,
        lm_index: args.lm_index,
        emit_lmi: None,
    })
}
