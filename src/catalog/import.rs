//! Catalog JSON import.
//!
//! Grammar:
//!
//! ```json
//! { "version": 1,
//!   "packages": {
//!      "<name>": {
//!         "<version>": {
//!            "depends": { "<dep-name>": "<range-string>", ... },
//!            "git": { "url": "...", "ref": "...", "auto-lib": "ns/name" },
//!            "description": "..."
//!         }
//!      }
//!   }
//! }
//! ```
//!
//! Validation failures name the offending location with a JSON-pointer-like
//! path. The caller stores all parsed packages inside one transaction, so a
//! failing document leaves the catalog untouched.

use serde_json::Value;

use super::PackageInfo;
use crate::core::dependency::{Dependency, VersionRange};
use crate::core::package_id::{parse_version, validate_name, PackageId};
use crate::core::remote::{AutoLib, GitRemote, RemoteListing};
use crate::error::{user_error, Errc, Result};
use crate::util::dym::{did_you_mean, dym_suffix};

fn invalid(what: impl Into<String>) -> crate::error::Error {
    user_error(
        Errc::InvalidCatalogJson,
        format!("catalog JSON is invalid: {}", what.into()),
    )
}

/// Parse and validate a whole catalog import document.
pub fn parse_catalog_json(content: &str) -> Result<Vec<PackageInfo>> {
    let root: Value = serde_json::from_str(content)
        .map_err(|e| invalid(format!("document is not valid JSON: {}", e)))?;

    let root = root
        .as_object()
        .ok_or_else(|| invalid("root of JSON must be an object (key-value mapping)"))?;

    let version = root
        .get("version")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| invalid("/version must be an integral value"))?;
    if version > 1 {
        return Err(user_error(
            Errc::CatalogTooNew,
            "/version is too new. We don't know how to parse this.",
        ));
    }

    let packages = root
        .get("packages")
        .and_then(|v| v.as_object())
        .ok_or_else(|| invalid("/packages must be an object"))?;

    let mut out = Vec::new();

    for (pkg_name, versions_map) in packages {
        validate_name(pkg_name).map_err(|_| {
            invalid(format!("/packages/{} is not a valid package name", pkg_name))
        })?;
        let versions_map = versions_map
            .as_object()
            .ok_or_else(|| invalid(format!("/packages/{} must be an object", pkg_name)))?;

        for (version_str, pkg_info) in versions_map {
            let path = format!("/packages/{}/{}", pkg_name, version_str);
            let version = parse_version(version_str)
                .map_err(|_| invalid(format!("{} is not a valid version", path)))?;
            let pkg_info = pkg_info
                .as_object()
                .ok_or_else(|| invalid(format!("{} must be an object", path)))?;

            const KNOWN_KEYS: &[&str] = &["depends", "git", "description"];
            for key in pkg_info.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    let dym = did_you_mean(key, KNOWN_KEYS.iter().copied());
                    return Err(invalid(format!(
                        "unknown key `{}` at {}{}",
                        key,
                        path,
                        dym_suffix(&dym)
                    )));
                }
            }

            let mut deps = Vec::new();
            if let Some(depends) = pkg_info.get("depends") {
                let depends = depends
                    .as_object()
                    .ok_or_else(|| invalid(format!("{}/depends must be an object", path)))?;
                for (dep_name, range_val) in depends {
                    let range_str = range_val.as_str().ok_or_else(|| {
                        invalid(format!("{}/depends/{} must be a string", path, dep_name))
                    })?;
                    let range = VersionRange::parse(range_str).map_err(|e| {
                        invalid(format!("{}/depends/{}: {}", path, dep_name, e))
                    })?;
                    deps.push(Dependency::new(dep_name.clone(), range)?);
                }
            }

            let remote = match pkg_info.get("git") {
                Some(git) => parse_git_listing(git, &path)?,
                None => {
                    return Err(user_error(
                        Errc::NoCatalogRemoteInfo,
                        format!("no remote info for {}", path),
                    ))
                }
            };

            let description = match pkg_info.get("description") {
                Some(d) => d
                    .as_str()
                    .ok_or_else(|| invalid(format!("{}/description must be a string", path)))?
                    .to_string(),
                None => String::new(),
            };

            out.push(PackageInfo {
                id: PackageId::new(pkg_name.clone(), version)?,
                deps,
                description,
                remote,
            });
        }
    }

    Ok(out)
}

fn parse_git_listing(git: &Value, path: &str) -> Result<RemoteListing> {
    let git = git
        .as_object()
        .ok_or_else(|| invalid(format!("{}/git must be an object", path)))?;

    const KNOWN_KEYS: &[&str] = &["url", "ref", "auto-lib"];
    for key in git.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            let dym = did_you_mean(key, KNOWN_KEYS.iter().copied());
            return Err(invalid(format!(
                "unknown key `{}` at {}/git{}",
                key,
                path,
                dym_suffix(&dym)
            )));
        }
    }

    let url = git
        .get("url")
        .and_then(|v| v.as_str())
        .ok_or_else(|| invalid(format!("{}/git/url must be a string", path)))?;
    let ref_ = git
        .get("ref")
        .and_then(|v| v.as_str())
        .ok_or_else(|| invalid(format!("{}/git/ref must be a string", path)))?;

    let auto_lib = match git.get("auto-lib") {
        Some(v) => {
            let s = v
                .as_str()
                .ok_or_else(|| invalid(format!("{}/git/auto-lib must be a string", path)))?;
            Some(AutoLib::split_usage_string(s)?)
        }
        None => None,
    };

    Ok(RemoteListing::Git(GitRemote {
        url: url.to_string(),
        ref_: ref_.to_string(),
        auto_lib,
    }))
}
