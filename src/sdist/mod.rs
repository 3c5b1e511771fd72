//! Source distributions.
//!
//! An sdist is an immutable directory holding a verbatim copy of a package
//! source tree plus its manifest. Creating one copies the declared subset
//! of a project directory; verifying one re-parses the manifest, whose
//! parsed ID is the sdist's identity.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::manifest::PackageManifest;
use crate::core::package_id::PackageId;
use crate::error::{user_error, Errc};
use crate::util::fs::{copy_dir_all, safe_rename};

/// An unpacked source distribution on disk.
#[derive(Debug, Clone)]
pub struct Sdist {
    pub manifest: PackageManifest,
    pub path: PathBuf,
}

impl Sdist {
    /// Open and verify an sdist rooted at `path`. The manifest must exist
    /// and parse; its ID is the sdist's identity.
    pub fn from_directory(path: &Path) -> Result<Self> {
        let manifest = PackageManifest::load_from_directory(path)?.ok_or_else(|| {
            user_error(
                Errc::InvalidPkgManifest,
                format!("directory {} contains no package manifest", path.display()),
            )
        })?;
        Ok(Sdist {
            manifest,
            path: path.to_path_buf(),
        })
    }

    pub fn id(&self) -> &PackageId {
        &self.manifest.id
    }
}

/// Parameters for creating a source distribution.
#[derive(Debug, Clone)]
pub struct SdistParams {
    pub project_dir: PathBuf,
    pub dest_path: PathBuf,
    pub force: bool,
}

/// Subdirectories of a project that an sdist carries.
const SDIST_DIRS: &[&str] = &["src", "include", "apps", "libs"];

/// Create a source distribution from a project directory.
///
/// The sdist is staged in a temporary directory next to the destination and
/// renamed into place, so the destination is never observable half-written.
pub fn create_sdist(params: &SdistParams) -> Result<Sdist> {
    let dest = &params.dest_path;
    if dest.exists() && !params.force {
        return Err(user_error(
            Errc::SdistExists,
            format!(
                "source distribution destination already exists: {}",
                dest.display()
            ),
        )
        .into());
    }

    let manifest_path =
        PackageManifest::find_in_directory(&params.project_dir).ok_or_else(|| {
            user_error(
                Errc::InvalidPkgManifest,
                format!(
                    "directory {} contains no package manifest",
                    params.project_dir.display()
                ),
            )
        })?;
    // Validate before copying anything.
    let manifest = PackageManifest::load_from_file(&manifest_path)?;
    tracing::info!("creating source distribution for {}", manifest.id);

    let stage_parent = dest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&stage_parent)
        .with_context(|| format!("failed to create {}", stage_parent.display()))?;
    let staging = tempfile::Builder::new()
        .prefix(".drydock-sdist-")
        .tempdir_in(&stage_parent)
        .context("failed to create sdist staging directory")?;

    populate_sdist(&params.project_dir, &manifest_path, staging.path())?;

    // `into_path` keeps the staging tree alive through the rename.
    let staged = staging.into_path();
    safe_rename(&staged, dest)?;

    Sdist::from_directory(dest)
}

fn populate_sdist(project_dir: &Path, manifest_path: &Path, out: &Path) -> Result<()> {
    let manifest_name = manifest_path.file_name().expect("manifest has a file name");
    std::fs::copy(manifest_path, out.join(manifest_name))
        .with_context(|| format!("failed to copy {}", manifest_path.display()))?;

    for dir in SDIST_DIRS {
        let src = project_dir.join(dir);
        if src.is_dir() {
            copy_dir_all(&src, &out.join(dir))?;
        }
    }

    // License-like files ride along.
    for entry in std::fs::read_dir(project_dir)
        .with_context(|| format!("failed to read {}", project_dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let fname = entry.file_name();
        let upper = fname.to_string_lossy().to_uppercase();
        if upper.starts_with("LICENSE") || upper.starts_with("COPYING") {
            std::fs::copy(entry.path(), out.join(&fname))
                .with_context(|| format!("failed to copy {}", entry.path().display()))?;
        }
    }

    Ok(())
}
