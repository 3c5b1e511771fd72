//! The project build operation.
//!
//! Manifest -> solver(catalog) -> repository (fetching missing sdists) ->
//! build plan -> executor -> interchange index.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::build::{lmi, Builder, BuildParams, SdistBuildParams};
use crate::catalog::Catalog;
use crate::core::manifest::PackageManifest;
use crate::error::{user_error, Errc};
use crate::fetch::get_package_sdist;
use crate::repo::{with_repository, IfExists, RepoFlags, Repository};
use crate::sdist::Sdist;
use crate::toolchain::Toolchain;

/// Options for building a project directory.
#[derive(Debug, Clone)]
pub struct ProjectBuildOptions {
    pub project_dir: PathBuf,
    pub catalog_path: PathBuf,
    pub repo_path: PathBuf,
    pub toolchain: Toolchain,
    pub out_root: PathBuf,
    pub build_apps: bool,
    pub build_tests: bool,
    pub enable_warnings: bool,
    pub parallel_jobs: i32,
    /// Reuse an existing interchange index instead of solving and building
    /// dependencies.
    pub lm_index: Option<PathBuf>,
    /// Where to write the interchange index of this build, if anywhere.
    pub emit_lmi: Option<PathBuf>,
}

/// Build the project at `opts.project_dir`.
pub fn build_project(opts: &ProjectBuildOptions) -> Result<()> {
    let manifest = PackageManifest::load_from_directory(&opts.project_dir)?.ok_or_else(|| {
        user_error(
            Errc::InvalidPkgManifest,
            format!(
                "directory {} contains no package manifest",
                opts.project_dir.display()
            ),
        )
    })?;
    tracing::info!("building {}", manifest.id);

    let mut builder = Builder::new();
    builder.add(
        Sdist {
            manifest: manifest.clone(),
            path: opts.project_dir.clone(),
        },
        SdistBuildParams {
            subdir: PathBuf::new(),
            build_apps: opts.build_apps,
            build_tests: opts.build_tests,
            enable_warnings: opts.enable_warnings,
        },
    );

    if let Some(lm_index) = &opts.lm_index {
        tracing::info!("loading existing library index from {}", lm_index.display());
        builder.add_external_libs(lmi::load_index(lm_index)?);
    } else {
        let catalog = Catalog::open(&opts.catalog_path)?;
        with_repository(
            &opts.repo_path,
            RepoFlags::WRITE_LOCK | RepoFlags::CREATE_IF_ABSENT,
            |repo| {
                add_dependency_sdists(repo, &catalog, &manifest, &mut builder)
            },
        )?;
    }

    builder.build(&BuildParams {
        out_root: opts.out_root.clone(),
        toolchain: opts.toolchain.clone(),
        parallel_jobs: opts.parallel_jobs,
        emit_lmi: opts.emit_lmi.clone(),
    })
}

/// Solve the manifest's dependencies, materialize any missing sdists from
/// the catalog's remotes, and register them all with the builder.
fn add_dependency_sdists(
    repo: &mut Repository,
    catalog: &Catalog,
    manifest: &PackageManifest,
    builder: &mut Builder,
) -> Result<()> {
    let deps = repo.solve(&manifest.dependencies, catalog)?;
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
        builder.add(
            sdist,
            SdistBuildParams {
                subdir: Path::new("_deps").join(pk.to_string()),
                ..Default::default()
            },
        );
    }
    Ok(())
}
