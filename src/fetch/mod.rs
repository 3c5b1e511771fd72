//! Materializing catalog remotes into source distributions.
//!
//! A catalog entry names a git URL and ref. Fetching clones the repository
//! into a temporary directory, checks out the ref, strips the `.git`
//! metadata, and packages the tree as an sdist. For upstreams without a
//! native manifest, the catalog's auto-lib pair supplies one.

use std::path::Path;

use anyhow::{bail, Context, Result};
use git2::{build::RepoBuilder, ResetType};
use tempfile::TempDir;

use crate::catalog::PackageInfo;
use crate::core::manifest::PackageManifest;
use crate::core::remote::{GitRemote, RemoteListing};
use crate::error::{user_error, Errc};
use crate::sdist::{create_sdist, Sdist, SdistParams};

/// An sdist whose backing directory lives in a temporary location.
///
/// Dropping the value removes the tree; callers move it into a repository
/// (or elsewhere) first.
pub struct TemporarySdist {
    pub tmpdir: TempDir,
    pub sdist: Sdist,
}

/// Clone `url` at `ref_` into `dest`.
///
/// The ref may be a tag, a branch, or a commit hash; branch names are also
/// tried under `origin/`.
pub fn git_clone(url: &str, ref_: &str, dest: &Path) -> Result<()> {
    tracing::info!("cloning {} (at {})", url, ref_);

    let repo = RepoBuilder::new()
        .clone(url, dest)
        .with_context(|| format!("failed to clone {}", url))?;

    let object = repo
        .revparse_single(ref_)
        .or_else(|_| repo.revparse_single(&format!("origin/{}", ref_)))
        .with_context(|| format!("failed to resolve ref '{}' in {}", ref_, url))?;

    repo.reset(&object, ResetType::Hard, None)
        .with_context(|| format!("failed to check out '{}' from {}", ref_, url))?;

    Ok(())
}

/// Fetch the sources for one catalog package and package them as an sdist.
pub fn get_package_sdist(info: &PackageInfo) -> Result<TemporarySdist> {
    match &info.remote {
        RemoteListing::Git(git) => get_git_sdist(info, git),
    }
}

fn get_git_sdist(info: &PackageInfo, git: &GitRemote) -> Result<TemporarySdist> {
    let tmpdir = tempfile::Builder::new()
        .prefix("drydock-fetch-")
        .tempdir()
        .context("failed to create fetch directory")?;

    let checkout = tmpdir.path().join("checkout");
    git_clone(&git.url, &git.ref_, &checkout)?;

    // The sdist is a source snapshot; the git metadata does not ride along.
    crate::util::fs::remove_dir_all_if_exists(&checkout.join(".git"))?;

    if PackageManifest::find_in_directory(&checkout).is_none() {
        let Some(auto_lib) = &git.auto_lib else {
            return Err(user_error(
                Errc::InvalidPkgManifest,
                format!(
                    "the repository for {} contains no package manifest and the catalog \
                     listing provides no auto-lib information",
                    info.id
                ),
            )
            .into());
        };
        synthesize_manifest(&checkout, info, auto_lib)?;
    }

    let sdist = create_sdist(&SdistParams {
        project_dir: checkout,
        dest_path: tmpdir.path().join("sdist"),
        force: true,
    })?;

    if sdist.id() != &info.id {
        bail!(
            "the manifest in {} identifies itself as {}, but the catalog listing is for {}",
            git.url,
            sdist.id(),
            info.id
        );
    }

    Ok(TemporarySdist { tmpdir, sdist })
}

/// Write a manifest derived from the catalog listing into a manifest-less
/// checkout.
fn synthesize_manifest(
    checkout: &Path,
    info: &PackageInfo,
    auto_lib: &crate::core::remote::AutoLib,
) -> Result<()> {
    tracing::info!(
        "generating manifest for {} from auto-lib {}",
        info.id,
        auto_lib
    );
    let doc = serde_json::json!({
        "name": info.id.name,
        "namespace": auto_lib.namespace,
        "version": info.id.version.to_string(),
    });
    let path = checkout.join("package.json");
    std::fs::write(&path, serde_json::to_string_pretty(&doc)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::package_id::PackageId;
    use crate::core::remote::AutoLib;

    #[test]
    fn test_synthesize_manifest() {
        let tmp = TempDir::new().unwrap();
        let info = PackageInfo {
            id: PackageId::parse("neo-fun@0.3.2").unwrap(),
            deps: vec![],
            description: String::new(),
            remote: RemoteListing::Git(GitRemote {
                url: "u".into(),
                ref_: "r".into(),
                auto_lib: None,
            }),
        };
        let auto_lib = AutoLib {
            namespace: "neo".into(),
            name: "fun".into(),
        };

        synthesize_manifest(tmp.path(), &info, &auto_lib).unwrap();

        let man = PackageManifest::load_from_directory(tmp.path())
            .unwrap()
            .unwrap();
        assert_eq!(man.id.to_string(), "neo-fun@0.3.2");
        assert_eq!(man.namespace, "neo");
    }

    // Cloning real remotes is exercised by hand; unit tests stay offline.
    #[test]
    #[ignore]
    fn test_git_clone_live() {
        let tmp = TempDir::new().unwrap();
        git_clone(
            "https://github.com/vector-of-bool/neo-fun.git",
            "0.3.2",
            &tmp.path().join("co"),
        )
        .unwrap();
    }
}
