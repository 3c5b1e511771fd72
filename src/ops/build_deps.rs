//! The `build-deps` operation: build an explicit dependency set (without a
//! project) and emit an interchange index for other build systems to
//! consume.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::build::{Builder, BuildParams, SdistBuildParams};
use crate::catalog::Catalog;
use crate::core::dependency::Dependency;
use crate::fetch::get_package_sdist;
use crate::repo::{with_repository, IfExists, RepoFlags};
use crate::toolchain::Toolchain;

/// Options for a dependency-only build.
#[derive(Debug, Clone)]
pub struct BuildDepsOptions {
    pub catalog_path: PathBuf,
    pub repo_path: PathBuf,
    pub toolchain: Toolchain,
    pub out_root: PathBuf,
    pub parallel_jobs: i32,
    pub lmi_path: PathBuf,
    /// `name@version` strings given on the command line.
    pub deps: Vec<String>,
    /// Files of newline-separated `name@version` strings.
    pub deps_files: Vec<PathBuf>,
}

/// Read a dependency manifest file: one `name@version` per line, with
/// blank lines and `#` comments ignored.
fn read_deps_file(path: &Path) -> Result<Vec<Dependency>> {
    let content = crate::util::fs::slurp_file(path)?;
    let mut deps = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        deps.push(Dependency::parse_depends_string(line)?);
    }
    Ok(deps)
}

/// Build all requested dependencies and write the index.
pub fn build_deps(opts: &BuildDepsOptions) -> Result<()> {
    let mut all_deps = Vec::new();
    for path in &opts.deps_files {
        tracing::info!("reading deps from {}", path.display());
        all_deps.extend(read_deps_file(path)?);
    }
    for dep_str in &opts.deps {
        all_deps.push(Dependency::parse_depends_string(dep_str)?);
    }
    tracing::info!("loading {} dependencies", all_deps.len());

    let catalog = Catalog::open(&opts.catalog_path)?;
    let mut builder = Builder::new();

    with_repository(
        &opts.repo_path,
        RepoFlags::WRITE_LOCK | RepoFlags::CREATE_IF_ABSENT,
        |repo| {
            let deps = repo.solve(&all_deps, &catalog)?;
            for pk in deps {
                if repo.find(&pk).is_none() {
                    tracing::info!("downloading dependency: {}", pk);
                    let info = catalog.get_or_error(&pk)?;
                    let tsd = get_package_sdist(&info)?;
                    repo.add_sdist(&tsd.sdist, IfExists::Throw)?;
                }
                let sdist = repo
                    .find(&pk)
                    .with_context(|| format!("sdist for {} vanished from the repository", pk))?;
                tracing::info!("dependency: {}", pk);
                builder.add(
                    sdist,
                    SdistBuildParams {
                        subdir: PathBuf::from(pk.to_string()),
                        ..Default::default()
                    },
                );
            }
            Ok(())
        },
    )?;

    builder.build(&BuildParams {
        out_root: opts.out_root.clone(),
        toolchain: opts.toolchain.clone(),
        parallel_jobs: opts.parallel_jobs,
        emit_lmi: Some(opts.lmi_path.clone()),
    })
}
