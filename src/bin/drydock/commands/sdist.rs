//! `drydock sdist`

use anyhow::Result;
use tempfile::TempDir;

use drydock::repo::{with_repository, IfExists, RepoFlags};
use drydock::sdist::{create_sdist, SdistParams};

use crate::cli::{SdistCreateArgs, SdistExportArgs};
use crate::commands::repo_path;

pub fn create(args: SdistCreateArgs) -> Result<()> {
    let sdist = create_sdist(&SdistParams {
        project_dir: args.project_dir,
        dest_path: args.out.clone(),
        force: args.replace,
    })?;
    tracing::info!("created source distribution {} at {}", sdist.id(), args.out.display());
    Ok(())
}

pub fn export(args: SdistExportArgs) -> Result<()> {
    let staging = TempDir::new()?;
    let sdist = create_sdist(&SdistParams {
        project_dir: args.project_dir,
        dest_path: staging.path().join("sdist"),
        force: true,
    })?;

    let if_exists = if args.replace {
        IfExists::Replace
    } else {
        IfExists::Throw
    };

    with_repository(
        &repo_path(&args.repo_dir),
        RepoFlags::WRITE_LOCK | RepoFlags::CREATE_IF_ABSENT,
        |repo| repo.add_sdist(&sdist, if_exists),
    )?;
    tracing::info!("exported {} to the repository", sdist.id());
    Ok(())
}
