//! Package manifest loading.
//!
//! A package's in-tree manifest lives at the root of its source tree as
//! `package.json5`, `package.jsonc`, or `package.json` (all parsed as
//! JSON-with-comments), or as a legacy `package.dds` key-value file, which
//! is accepted with a deprecation warning.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::core::dependency::{Dependency, VersionRange};
use crate::core::package_id::{parse_version, validate_name, PackageId};
use crate::error::{user_error, Errc, Result};
use crate::util::dym::{did_you_mean, dym_suffix};
use crate::util::jsonc;

/// Which test mainline the package's tests expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestDriver {
    /// Tests provide their own `main` via the Catch2 framework.
    Catch,
    /// Tests link a Catch2-provided `main`.
    CatchMain,
}

impl TestDriver {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "Catch" => Ok(TestDriver::Catch),
            "Catch-Main" => Ok(TestDriver::CatchMain),
            other => {
                let dym = did_you_mean(other, ["Catch", "Catch-Main"]);
                Err(user_error(
                    Errc::UnknownTestDriver,
                    format!("unknown 'test_driver' '{}'{}", other, dym_suffix(&dym)),
                ))
            }
        }
    }
}

/// The parsed package manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifest {
    pub id: PackageId,
    pub namespace: String,
    pub dependencies: Vec<Dependency>,
    pub test_driver: Option<TestDriver>,
}

const MANIFEST_CANDIDATES: &[&str] = &["package.json5", "package.jsonc", "package.json"];
const LEGACY_MANIFEST: &str = "package.dds";

impl PackageManifest {
    /// Locate the manifest file within a package root, if present.
    pub fn find_in_directory(dir: &Path) -> Option<PathBuf> {
        for cand in MANIFEST_CANDIDATES {
            let path = dir.join(cand);
            if path.is_file() {
                return Some(path);
            }
        }
        let legacy = dir.join(LEGACY_MANIFEST);
        if legacy.is_file() {
            return Some(legacy);
        }
        None
    }

    /// Load the manifest from a package root. `None` when the directory has
    /// no manifest file at all.
    pub fn load_from_directory(dir: &Path) -> Result<Option<Self>> {
        match Self::find_in_directory(dir) {
            Some(path) => Self::load_from_file(&path).map(Some),
            None => Ok(None),
        }
    }

    /// Load a manifest from a specific file, dispatching on its extension.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            user_error(
                Errc::InvalidPkgManifest,
                format!("failed to read manifest {}: {}", path.display(), e),
            )
        })?;
        if path.extension().is_some_and(|e| e == "dds") {
            Self::load_from_dds_str(&content, path)
        } else {
            Self::load_from_json_str(&content, path)
        }
    }

    fn load_from_json_str(content: &str, path: &Path) -> Result<Self> {
        let data = jsonc::parse(content).map_err(|e| {
            user_error(
                Errc::InvalidPkgManifest,
                format!("failed to parse manifest {}: {}", path.display(), e),
            )
        })?;

        let Value::Object(map) = data else {
            return Err(user_error(
                Errc::InvalidPkgManifest,
                "the root of a package manifest must be an object (mapping)",
            ));
        };

        let mut name: Option<String> = None;
        let mut namespace: Option<String> = None;
        let mut version = None;
        let mut dependencies = Vec::new();
        let mut test_driver = None;

        const KNOWN_KEYS: &[&str] = &["$schema", "name", "namespace", "version", "depends", "test_driver"];

        for (key, value) in &map {
            match key.as_str() {
                "$schema" => {}
                "name" => {
                    let s = expect_string(value, "`name` must be a string")?;
                    validate_name(s)?;
                    name = Some(s.to_string());
                }
                "namespace" => {
                    let s = expect_string(value, "`namespace` must be a string")?;
                    namespace = Some(s.to_string());
                }
                "version" => {
                    let s = expect_string(value, "`version` must be a string")?;
                    version = Some(parse_version(s)?);
                }
                "depends" => {
                    let Value::Object(deps) = value else {
                        return Err(user_error(
                            Errc::InvalidPkgManifest,
                            "`depends` must be a mapping between package names and version ranges",
                        ));
                    };
                    for (dep_name, range_value) in deps {
                        let range_str = expect_string(
                            range_value,
                            &format!("dependency for '{}' must be a range string", dep_name),
                        )?;
                        let range = VersionRange::parse(range_str)?;
                        dependencies.push(Dependency::new(dep_name.clone(), range)?);
                    }
                }
                "test_driver" => {
                    let s = expect_string(value, "`test_driver` must be a string")?;
                    test_driver = Some(TestDriver::parse(s)?);
                }
                unknown => {
                    let dym = did_you_mean(unknown, KNOWN_KEYS.iter().copied());
                    return Err(user_error(
                        Errc::InvalidPkgManifest,
                        format!(
                            "unknown key `{}` in package manifest{}",
                            unknown,
                            dym_suffix(&dym)
                        ),
                    ));
                }
            }
        }

        let name = name.ok_or_else(|| {
            user_error(Errc::InvalidPkgManifest, "the 'name' field is required")
        })?;
        let version = version.ok_or_else(|| {
            user_error(Errc::InvalidPkgManifest, "the 'version' field is required")
        })?;
        let namespace = namespace.unwrap_or_else(|| name.clone());

        Ok(PackageManifest {
            id: PackageId::new(name, version)?,
            namespace,
            dependencies,
            test_driver,
        })
    }

    /// Parse the deprecated `package.dds` key-value format.
    fn load_from_dds_str(content: &str, path: &Path) -> Result<Self> {
        tracing::warn!(
            "using deprecated package.dds parsing (on file {}); migrate to package.json5",
            path.display()
        );

        let mut name: Option<String> = None;
        let mut namespace: Option<String> = None;
        let mut version = None;
        let mut dependencies = Vec::new();
        let mut test_driver = None;

        const KNOWN_KEYS: &[&str] = &["Name", "Namespace", "Version", "Depends", "Test-Driver"];

        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once(':').ok_or_else(|| {
                user_error(
                    Errc::InvalidPkgManifest,
                    format!(
                        "{}:{}: expected a `Key: value` pair",
                        path.display(),
                        lineno + 1
                    ),
                )
            })?;
            let value = value.trim();
            match key.trim() {
                "Name" => {
                    validate_name(value)?;
                    name = Some(value.to_string());
                }
                "Namespace" => namespace = Some(value.to_string()),
                "Version" => version = Some(parse_version(value)?),
                "Depends" => dependencies.push(Dependency::parse_depends_string(value)?),
                "Test-Driver" => test_driver = Some(TestDriver::parse(value)?),
                unknown => {
                    let dym = did_you_mean(unknown, KNOWN_KEYS.iter().copied());
                    return Err(user_error(
                        Errc::InvalidPkgManifest,
                        format!(
                            "unknown key `{}` in package manifest {}{}",
                            unknown,
                            path.display(),
                            dym_suffix(&dym)
                        ),
                    ));
                }
            }
        }

        let name = name.ok_or_else(|| {
            user_error(
                Errc::InvalidPkgName,
                format!("'Name' field in [{}] may not be absent or empty", path.display()),
            )
        })?;
        let version = version.ok_or_else(|| {
            user_error(
                Errc::InvalidVersionString,
                format!("'Version' field in [{}] may not be absent or empty", path.display()),
            )
        })?;
        let namespace = namespace.unwrap_or_else(|| name.clone());

        Ok(PackageManifest {
            id: PackageId::new(name, version)?,
            namespace,
            dependencies,
            test_driver,
        })
    }
}

fn expect_string<'v>(value: &'v Value, message: &str) -> Result<&'v str> {
    value
        .as_str()
        .ok_or_else(|| user_error(Errc::InvalidPkgManifest, message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, fname: &str, content: &str) {
        std::fs::write(dir.join(fname), content).unwrap();
    }

    #[test]
    fn test_load_basic_json5() {
        let tmp = TempDir::new().unwrap();
        write_manifest(
            tmp.path(),
            "package.json5",
            r#"{
                // identity
                "name": "mylib",
                "version": "1.2.3",
                "depends": {
                    "spdlog": "^1.4.0",
                },
            }"#,
        );

        let man = PackageManifest::load_from_directory(tmp.path())
            .unwrap()
            .unwrap();
        assert_eq!(man.id.to_string(), "mylib@1.2.3");
        assert_eq!(man.namespace, "mylib");
        assert_eq!(man.dependencies.len(), 1);
        assert_eq!(man.dependencies[0].name, "spdlog");
        assert_eq!(
            man.dependencies[0].range,
            VersionRange::new(Version::new(1, 4, 0), Version::new(2, 0, 0)).unwrap()
        );
    }

    #[test]
    fn test_discovery_order() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), "package.json", r#"{"name": "json", "version": "1.0.0"}"#);
        write_manifest(tmp.path(), "package.jsonc", r#"{"name": "jsonc", "version": "1.0.0"}"#);

        let man = PackageManifest::load_from_directory(tmp.path())
            .unwrap()
            .unwrap();
        assert_eq!(man.id.name, "jsonc");

        write_manifest(tmp.path(), "package.json5", r#"{"name": "json5", "version": "1.0.0"}"#);
        let man = PackageManifest::load_from_directory(tmp.path())
            .unwrap()
            .unwrap();
        assert_eq!(man.id.name, "json5");
    }

    #[test]
    fn test_no_manifest_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(PackageManifest::load_from_directory(tmp.path())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_namespace_defaults_to_name() {
        let tmp = TempDir::new().unwrap();
        write_manifest(
            tmp.path(),
            "package.json",
            r#"{"name": "abc", "namespace": "corp", "version": "0.1.0"}"#,
        );
        let man = PackageManifest::load_from_directory(tmp.path())
            .unwrap()
            .unwrap();
        assert_eq!(man.namespace, "corp");
    }

    #[test]
    fn test_unknown_key_suggests() {
        let tmp = TempDir::new().unwrap();
        write_manifest(
            tmp.path(),
            "package.json",
            r#"{"name": "abc", "version": "0.1.0", "depend": {}}"#,
        );
        let err = PackageManifest::load_from_directory(tmp.path()).unwrap_err();
        assert_eq!(err.kind(), Errc::InvalidPkgManifest);
        assert!(err.to_string().contains("depends"));
    }

    #[test]
    fn test_test_driver() {
        let tmp = TempDir::new().unwrap();
        write_manifest(
            tmp.path(),
            "package.json",
            r#"{"name": "abc", "version": "0.1.0", "test_driver": "Catch-Main"}"#,
        );
        let man = PackageManifest::load_from_directory(tmp.path())
            .unwrap()
            .unwrap();
        assert_eq!(man.test_driver, Some(TestDriver::CatchMain));

        write_manifest(
            tmp.path(),
            "package.json",
            r#"{"name": "abc", "version": "0.1.0", "test_driver": "Cetch"}"#,
        );
        let err = PackageManifest::load_from_directory(tmp.path()).unwrap_err();
        assert_eq!(err.kind(), Errc::UnknownTestDriver);
        assert!(err.to_string().contains("Catch"));
    }

    #[test]
    fn test_missing_required_fields() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), "package.json", r#"{"version": "0.1.0"}"#);
        let err = PackageManifest::load_from_directory(tmp.path()).unwrap_err();
        assert_eq!(err.kind(), Errc::InvalidPkgManifest);

        write_manifest(tmp.path(), "package.json", r#"{"name": "abc"}"#);
        let err = PackageManifest::load_from_directory(tmp.path()).unwrap_err();
        assert_eq!(err.kind(), Errc::InvalidPkgManifest);
    }

    #[test]
    fn test_bad_range_string() {
        let tmp = TempDir::new().unwrap();
        write_manifest(
            tmp.path(),
            "package.json",
            r#"{"name": "abc", "version": "0.1.0", "depends": {"x": "one.two"}}"#,
        );
        let err = PackageManifest::load_from_directory(tmp.path()).unwrap_err();
        assert_eq!(err.kind(), Errc::InvalidVersionRangeString);
    }

    #[test]
    fn test_legacy_dds_manifest() {
        let tmp = TempDir::new().unwrap();
        write_manifest(
            tmp.path(),
            "package.dds",
            "Name: oldlib\nVersion: 2.0.1\nDepends: spdlog@1.4.2\nDepends: fmt@6.0.0\nTest-Driver: Catch\n",
        );
        let man = PackageManifest::load_from_directory(tmp.path())
            .unwrap()
            .unwrap();
        assert_eq!(man.id.to_string(), "oldlib@2.0.1");
        assert_eq!(man.dependencies.len(), 2);
        assert_eq!(man.test_driver, Some(TestDriver::Catch));
    }

    #[test]
    fn test_legacy_dds_unknown_key() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), "package.dds", "Name: x\nVersion: 1.0.0\nNamspace: y\n");
        let err = PackageManifest::load_from_directory(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("Namespace"));
    }
}
