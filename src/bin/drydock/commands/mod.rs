//! Command implementations.

pub mod build;
pub mod build_deps;
pub mod catalog;
pub mod repo;
pub mod sdist;

use std::path::PathBuf;

use anyhow::Result;
use drydock::Toolchain;

/// Resolve the `--toolchain` argument or fall back to the default.
pub fn resolve_toolchain(arg: &Option<String>) -> Result<Toolchain> {
    match arg {
        Some(spec) => Ok(Toolchain::from_arg(spec)?),
        None => match Toolchain::get_default()? {
            Some(tc) => Ok(tc),
            None => Err(drydock::error::user_error(
                drydock::Errc::NoDefaultToolchain,
                "no toolchain was specified and no default could be found",
            )
            .into()),
        },
    }
}

/// Resolve the `--catalog` argument or fall back to the default path.
pub fn catalog_path(arg: &Option<PathBuf>) -> PathBuf {
    arg.clone()
        .unwrap_or_else(drydock::catalog::default_catalog_path)
}

/// Resolve the `--repo-dir` argument or fall back to the default path.
pub fn repo_path(arg: &Option<PathBuf>) -> PathBuf {
    arg.clone()
        .unwrap_or_else(drydock::repo::default_local_path)
}
