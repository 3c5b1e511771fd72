//! `drydock catalog`

use std::io::Read;

use anyhow::Result;

use drydock::core::remote::{AutoLib, RemoteListing};
use drydock::core::Dependency;
use drydock::fetch::get_package_sdist;
use drydock::util::fs::{copy_dir_all, remove_dir_all_if_exists};
use drydock::{Catalog, PackageId, PackageInfo};

use crate::cli::{
    CatalogAddArgs, CatalogGetArgs, CatalogImportArgs, CatalogListArgs, CatalogPathArgs,
    CatalogShowArgs,
};
use crate::commands::catalog_path;

pub fn create(args: CatalogPathArgs) -> Result<()> {
    // Opening the database initializes and migrates the catalog.
    let path = catalog_path(&args.catalog);
    Catalog::open(&path)?;
    tracing::info!("catalog ready at {}", path.display());
    Ok(())
}

pub fn import(args: CatalogImportArgs) -> Result<()> {
    let catalog = Catalog::open(&catalog_path(&args.catalog))?;
    for json_path in &args.json_paths {
        tracing::info!("importing {}", json_path.display());
        catalog.import_json_file(json_path)?;
    }
    if args.stdin {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        catalog.import_json_str(&content)?;
    }
    Ok(())
}

pub fn get(args: CatalogGetArgs) -> Result<()> {
    let catalog = Catalog::open(&catalog_path(&args.catalog))?;
    for req in &args.requirements {
        let id = PackageId::parse(req)?;
        let info = catalog.get_or_error(&id)?;
        let tsd = get_package_sdist(&info)?;

        let dest = args.out_dir.join(id.to_string());
        tracing::info!("creating sdist at {}", dest.display());
        remove_dir_all_if_exists(&dest)?;
        copy_dir_all(&tsd.sdist.path, &dest)?;
    }
    Ok(())
}

pub fn add(args: CatalogAddArgs) -> Result<()> {
    let id = PackageId::parse(&args.id)?;

    let deps = args
        .depends
        .iter()
        .map(|d| Dependency::parse_depends_string(d))
        .collect::<drydock::error::Result<Vec<_>>>()?;

    let auto_lib = args
        .auto_lib
        .as_deref()
        .map(AutoLib::split_usage_string)
        .transpose()?;
    let remote = RemoteListing::git(args.git_url.clone(), args.git_ref.clone(), auto_lib)?;

    let catalog = Catalog::open(&catalog_path(&args.catalog))?;
    catalog.store(&PackageInfo {
        id,
        deps,
        description: args.description,
        remote,
    })?;
    Ok(())
}

pub fn list(args: CatalogListArgs) -> Result<()> {
    let catalog = Catalog::open(&catalog_path(&args.catalog))?;
    let ids = match &args.name {
        Some(name) => catalog.by_name(name)?,
        None => catalog.all()?,
    };
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}

pub fn show(args: CatalogShowArgs) -> Result<()> {
    let id = PackageId::parse(&args.id)?;
    let catalog = Catalog::open(&catalog_path(&args.catalog))?;
    let pkg = catalog.get_or_error(&id)?;

    println!("Name:     {}", pkg.id.name);
    println!("Version:  {}", pkg.id.version);
    for dep in &pkg.deps {
        println!("Depends:  {}", dep);
    }
    match &pkg.remote {
        RemoteListing::Git(git) => {
            println!("Git URL:  {}", git.url);
            println!("Git Ref:  {}", git.ref_);
            if let Some(auto_lib) = &git.auto_lib {
                println!("Auto-lib: {}", auto_lib);
            }
        }
    }
    if !pkg.description.is_empty() {
        println!("Description:\n    {}", pkg.description);
    }
    Ok(())
}
