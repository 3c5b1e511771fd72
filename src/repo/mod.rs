//! The local repository of source distributions.
//!
//! A repository is a directory of `<name>@<version>/` sdist trees guarded
//! by a `.lock` file: shared for readers, exclusive for writers. All access
//! goes through [`with_repository`], which scopes the lock to a closure so
//! it is released on every exit path.

use std::fs::{File, OpenOptions};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bitflags::bitflags;
use fs4::FileExt;

use crate::catalog::Catalog;
use crate::core::dependency::Dependency;
use crate::core::package_id::PackageId;
use crate::error::{user_error, Errc};
use crate::sdist::Sdist;
use crate::util::fs::{copy_dir_all, ensure_dir, remove_dir_all_if_exists, safe_rename};

bitflags! {
    /// How a repository is opened.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RepoFlags: u32 {
        /// Shared lock; may enumerate and read sdists.
        const READ = 1;
        /// Exclusive lock; may add or remove sdists.
        const WRITE_LOCK = 1 << 1;
        /// Create the repository directory if it does not exist.
        const CREATE_IF_ABSENT = 1 << 2;
    }
}

/// What `add_sdist` does when the destination already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfExists {
    Throw,
    Replace,
    Ignore,
}

/// A handle to a locked repository.
///
/// The handle is deliberately neither `Send` nor `Sync`: the underlying
/// file lock belongs to the opening thread and must not outlive the
/// [`with_repository`] closure.
pub struct Repository {
    root: PathBuf,
    writable: bool,
    _not_send: PhantomData<*mut ()>,
}

struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("failed to release repository lock: {}", e);
        }
    }
}

/// The default repository location under the user data directory.
pub fn default_local_path() -> PathBuf {
    directories::ProjectDirs::from("dev", "drydock", "drydock")
        .map(|dirs| dirs.data_dir().join("repo"))
        .unwrap_or_else(|| PathBuf::from(".drydock/repo"))
}

/// Open the repository at `path` under the requested lock, run `f` with a
/// handle, and release the lock however `f` exits.
pub fn with_repository<T>(
    path: &Path,
    flags: RepoFlags,
    f: impl FnOnce(&mut Repository) -> Result<T>,
) -> Result<T> {
    if !path.is_dir() {
        if flags.contains(RepoFlags::CREATE_IF_ABSENT) {
            ensure_dir(path)?;
        } else {
            bail!("repository directory does not exist: {}", path.display());
        }
    }

    let lock_path = path.join(".lock");
    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .with_context(|| format!("failed to open repository lock {}", lock_path.display()))?;

    let writable = flags.contains(RepoFlags::WRITE_LOCK);
    if writable {
        FileExt::lock_exclusive(&lock_file)
            .with_context(|| format!("failed to lock {}", lock_path.display()))?;
    } else {
        FileExt::lock_shared(&lock_file)
            .with_context(|| format!("failed to lock {}", lock_path.display()))?;
    }
    let _guard = LockGuard { file: lock_file };

    let mut repo = Repository {
        root: path.to_path_buf(),
        writable,
        _not_send: PhantomData,
    };
    f(&mut repo)
}

impl Repository {
    /// The repository root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Install an sdist into the repository.
    ///
    /// The tree is staged under the repository root (so the final rename
    /// stays on one filesystem) and renamed into place, making the add
    /// atomic: the destination either does not exist or is complete.
    pub fn add_sdist(&mut self, sdist: &Sdist, if_exists: IfExists) -> Result<()> {
        if !self.writable {
            bail!("repository was opened read-only");
        }

        let dest = self.root.join(sdist.id().to_string());
        if dest.exists() {
            match if_exists {
                IfExists::Throw => {
                    return Err(user_error(
                        Errc::SdistExists,
                        format!(
                            "source distribution for {} already exists in repository {}",
                            sdist.id(),
                            self.root.display()
                        ),
                    )
                    .into());
                }
                IfExists::Ignore => {
                    tracing::debug!("sdist {} already present, ignoring", sdist.id());
                    return Ok(());
                }
                IfExists::Replace => {
                    tracing::info!("replacing existing sdist {}", sdist.id());
                }
            }
        }

        let staging = tempfile::Builder::new()
            .prefix(".tmp-")
            .tempdir_in(&self.root)
            .context("failed to create repository staging directory")?;
        let staged = staging.path().join("sdist");
        copy_dir_all(&sdist.path, &staged)?;

        remove_dir_all_if_exists(&dest)?;
        safe_rename(&staged, &dest)?;
        tracing::info!("added sdist {} to repository", sdist.id());
        Ok(())
    }

    /// O(1) probe for one package.
    pub fn find(&self, id: &PackageId) -> Option<Sdist> {
        let path = self.root.join(id.to_string());
        if !path.is_dir() {
            return None;
        }
        match Sdist::from_directory(&path) {
            Ok(sdist) => Some(sdist),
            Err(e) => {
                tracing::warn!("repository entry {} is not a valid sdist: {}", id, e);
                None
            }
        }
    }

    /// Lazily enumerate the repository's sdists. Entries that fail to
    /// verify are skipped with a warning.
    pub fn iter_sdists(&self) -> Result<impl Iterator<Item = Sdist> + '_> {
        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("failed to read repository {}", self.root.display()))?;

        Ok(entries.filter_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();
            let name = entry.file_name();
            if !path.is_dir() || name.to_string_lossy().starts_with('.') {
                return None;
            }
            match Sdist::from_directory(&path) {
                Ok(sdist) => {
                    if name.to_string_lossy() != sdist.id().to_string() {
                        tracing::warn!(
                            "repository entry {} does not match its manifest ID {}",
                            path.display(),
                            sdist.id()
                        );
                    }
                    Some(sdist)
                }
                Err(e) => {
                    tracing::warn!("skipping invalid repository entry {}: {}", path.display(), e);
                    None
                }
            }
        }))
    }

    /// Resolve a dependency set against a catalog. See the solver module.
    pub fn solve(&self, deps: &[Dependency], catalog: &Catalog) -> Result<Vec<PackageId>> {
        Ok(crate::solve::solve(deps, catalog)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdist::{create_sdist, SdistParams};
    use tempfile::TempDir;

    fn make_sdist(tmp: &Path, name: &str, version: &str) -> Sdist {
        let project = tmp.join(format!("{}-project", name));
        std::fs::create_dir_all(project.join("src")).unwrap();
        std::fs::write(
            project.join("package.json5"),
            format!(r#"{{"name": "{}", "version": "{}"}}"#, name, version),
        )
        .unwrap();
        std::fs::write(project.join("src/lib.cpp"), "int f();\n").unwrap();
        create_sdist(&SdistParams {
            project_dir: project,
            dest_path: tmp.join(format!("{}.sdist", name)),
            force: false,
        })
        .unwrap()
    }

    #[test]
    fn test_create_if_absent() {
        let tmp = TempDir::new().unwrap();
        let repo_dir = tmp.path().join("repo");

        let err = with_repository(&repo_dir, RepoFlags::READ, |_| Ok(()));
        assert!(err.is_err());

        with_repository(
            &repo_dir,
            RepoFlags::READ | RepoFlags::CREATE_IF_ABSENT,
            |_| Ok(()),
        )
        .unwrap();
        assert!(repo_dir.is_dir());
        assert!(repo_dir.join(".lock").exists());
    }

    #[test]
    fn test_add_find_iter() {
        let tmp = TempDir::new().unwrap();
        let repo_dir = tmp.path().join("repo");
        let sdist = make_sdist(tmp.path(), "alib", "1.2.3");

        with_repository(
            &repo_dir,
            RepoFlags::WRITE_LOCK | RepoFlags::CREATE_IF_ABSENT,
            |repo| {
                repo.add_sdist(&sdist, IfExists::Throw)?;
                Ok(())
            },
        )
        .unwrap();

        with_repository(&repo_dir, RepoFlags::READ, |repo| {
            let found = repo.find(&PackageId::parse("alib@1.2.3").unwrap()).unwrap();
            assert_eq!(found.manifest, sdist.manifest);
            assert!(found.path.join("src/lib.cpp").exists());

            let all: Vec<_> = repo.iter_sdists()?.collect();
            assert_eq!(all.len(), 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_add_if_exists_modes() {
        let tmp = TempDir::new().unwrap();
        let repo_dir = tmp.path().join("repo");
        let sdist = make_sdist(tmp.path(), "alib", "1.2.3");

        with_repository(
            &repo_dir,
            RepoFlags::WRITE_LOCK | RepoFlags::CREATE_IF_ABSENT,
            |repo| {
                repo.add_sdist(&sdist, IfExists::Throw)?;

                let err = repo.add_sdist(&sdist, IfExists::Throw).unwrap_err();
                let err = err.downcast::<crate::error::Error>().unwrap();
                assert_eq!(err.kind(), Errc::SdistExists);

                repo.add_sdist(&sdist, IfExists::Ignore)?;
                repo.add_sdist(&sdist, IfExists::Replace)?;
                Ok(())
            },
        )
        .unwrap();
    }

    #[test]
    fn test_read_handle_cannot_write() {
        let tmp = TempDir::new().unwrap();
        let repo_dir = tmp.path().join("repo");
        let sdist = make_sdist(tmp.path(), "alib", "1.2.3");

        with_repository(
            &repo_dir,
            RepoFlags::READ | RepoFlags::CREATE_IF_ABSENT,
            |repo| {
                assert!(repo.add_sdist(&sdist, IfExists::Throw).is_err());
                Ok(())
            },
        )
        .unwrap();
    }

    #[test]
    fn test_find_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        let repo_dir = tmp.path().join("repo");

        with_repository(
            &repo_dir,
            RepoFlags::READ | RepoFlags::CREATE_IF_ABSENT,
            |repo| {
                assert!(repo.find(&PackageId::parse("ghost@1.0.0").unwrap()).is_none());
                Ok(())
            },
        )
        .unwrap();
    }

    #[test]
    fn test_lock_released_on_error_path() {
        let tmp = TempDir::new().unwrap();
        let repo_dir = tmp.path().join("repo");

        let res: Result<()> = with_repository(
            &repo_dir,
            RepoFlags::WRITE_LOCK | RepoFlags::CREATE_IF_ABSENT,
            |_| bail!("boom"),
        );
        assert!(res.is_err());

        // A second exclusive acquisition must not deadlock.
        with_repository(&repo_dir, RepoFlags::WRITE_LOCK, |_| Ok(())).unwrap();
    }
}
