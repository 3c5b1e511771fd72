//! `drydock repo`

use std::collections::BTreeMap;

use anyhow::Result;

use drydock::repo::{with_repository, RepoFlags};

use crate::cli::RepoArgs;
use crate::commands::repo_path;

pub fn init(args: RepoArgs) -> Result<()> {
    let path = repo_path(&args.repo_dir);
    with_repository(&path, RepoFlags::CREATE_IF_ABSENT, |_| Ok(()))?;
    tracing::info!("initialized repository at {}", path.display());
    Ok(())
}

pub fn ls(args: RepoArgs) -> Result<()> {
    with_repository(&repo_path(&args.repo_dir), RepoFlags::READ, |repo| {
        let mut by_name: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for sdist in repo.iter_sdists()? {
            by_name
                .entry(sdist.id().name.clone())
                .or_default()
                .push(sdist.id().version.to_string());
        }

        for (name, mut versions) in by_name {
            versions.sort();
            println!("{}:", name);
            for version in versions {
                println!("  - {}", version);
            }
        }
        Ok(())
    })
}
