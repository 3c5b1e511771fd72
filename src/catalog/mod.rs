//! The package catalog: a persistent registry of known packages, their
//! remote locations, and their dependency constraints.
//!
//! Backed by a single-file SQLite database. The schema version lives in a
//! one-row metadata table; opening the catalog migrates the schema forward
//! and refuses databases written by a newer drydock.

mod import;

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::core::dependency::{Dependency, VersionRange};
use crate::core::package_id::{parse_version, PackageId};
use crate::core::remote::{AutoLib, GitRemote, RemoteListing};
use crate::error::{user_error, Errc, Error, Result};
use crate::util::dym::did_you_mean;

/// Everything the catalog knows about one package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub id: PackageId,
    pub deps: Vec<Dependency>,
    pub description: String,
    pub remote: RemoteListing,
}

/// The default catalog database location under the user data directory.
pub fn default_catalog_path() -> std::path::PathBuf {
    directories::ProjectDirs::from("dev", "drydock", "drydock")
        .map(|dirs| dirs.data_dir().join("catalog.db"))
        .unwrap_or_else(|| std::path::PathBuf::from(".drydock/catalog.db"))
}

/// An open catalog database.
#[derive(Debug)]
pub struct Catalog {
    conn: Connection,
}

const CURRENT_DATABASE_VERSION: i64 = 1;

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        user_error(
            Errc::CorruptedCatalogDb,
            format!("catalog database error: {}", e),
        )
    }
}

fn migrate_catalog_1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE drydock_cat_pkgs (
            pkg_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            git_url TEXT,
            git_ref TEXT,
            lm_name TEXT,
            lm_namespace TEXT,
            description TEXT NOT NULL,
            UNIQUE(name, version),
            CONSTRAINT has_source_info CHECK(
                (git_url NOT NULL AND git_ref NOT NULL) = 1
            ),
            CONSTRAINT valid_lm_info CHECK(
                (lm_name NOT NULL AND lm_namespace NOT NULL)
                + (lm_name ISNULL AND lm_namespace ISNULL)
                = 1
            )
        );

        CREATE TABLE drydock_cat_pkg_deps (
            dep_id INTEGER PRIMARY KEY AUTOINCREMENT,
            pkg_id INTEGER NOT NULL
                REFERENCES drydock_cat_pkgs(pkg_id) ON DELETE CASCADE,
            dep_name TEXT NOT NULL,
            low TEXT NOT NULL,
            high TEXT NOT NULL,
            UNIQUE(pkg_id, dep_name)
        );
        "#,
    )
}

fn ensure_migrated(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        r#"
        PRAGMA foreign_keys = 1;
        CREATE TABLE IF NOT EXISTS drydock_cat_meta AS
            WITH init(meta) AS (VALUES ('{"version": 0}'))
            SELECT * FROM init;
        "#,
    )?;

    let meta_json: String = tx.query_row("SELECT meta FROM drydock_cat_meta", [], |r| r.get(0))?;
    let mut meta: serde_json::Value = serde_json::from_str(&meta_json).map_err(|_| {
        user_error(
            Errc::CorruptedCatalogDb,
            "the catalog database metadata is not valid JSON",
        )
    })?;

    let version = meta
        .get("version")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| {
            user_error(
                Errc::CorruptedCatalogDb,
                "the catalog database metadata is invalid [bad meta.version]",
            )
        })?;

    if version > CURRENT_DATABASE_VERSION {
        return Err(user_error(
            Errc::CatalogTooNew,
            format!(
                "the catalog database is at schema version {}, which this drydock does not understand",
                version
            ),
        ));
    }

    if version < 1 {
        migrate_catalog_1(&tx)?;
    }

    meta["version"] = serde_json::json!(CURRENT_DATABASE_VERSION);
    tx.execute(
        "UPDATE drydock_cat_meta SET meta = ?1",
        params![meta.to_string()],
    )?;
    tx.commit()?;
    Ok(())
}

impl Catalog {
    /// Open (creating and migrating as needed) the catalog at `db_path`.
    /// `":memory:"` opens a transient in-memory catalog.
    pub fn open(db_path: &Path) -> Result<Self> {
        if db_path != Path::new(":memory:") {
            if let Some(parent) = db_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    user_error(
                        Errc::CorruptedCatalogDb,
                        format!("failed to create {}: {}", parent.display(), e),
                    )
                })?;
            }
        }
        let conn = Connection::open(db_path)?;
        match ensure_migrated(&conn) {
            Ok(()) => {}
            Err(e) if e.kind() == Errc::CatalogTooNew => return Err(e),
            Err(e) => {
                tracing::error!(
                    "failed to load the catalog database; it appears to be invalid/corrupted: {}",
                    e
                );
                return Err(user_error(
                    Errc::CorruptedCatalogDb,
                    format!("the catalog database at {} is corrupted", db_path.display()),
                ));
            }
        }
        Ok(Catalog { conn })
    }

    /// Open a transient in-memory catalog (used by tests and dry runs).
    pub fn open_in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    /// Insert or replace a package record, replacing its dependency rows in
    /// the same transaction.
    pub fn store(&self, pkg: &PackageInfo) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        store_with(&tx, pkg)?;
        tx.commit()?;
        Ok(())
    }

    /// Point lookup of one package. `None` when absent; use
    /// [`Catalog::get_or_error`] to turn that into a user error with a
    /// "did you mean" suggestion.
    pub fn get(&self, id: &PackageId) -> Result<Option<PackageInfo>> {
        let row = self
            .conn
            .query_row(
                "SELECT git_url, git_ref, lm_name, lm_namespace, description
                   FROM drydock_cat_pkgs
                  WHERE name = ?1 AND version = ?2",
                params![id.name, id.version.to_string()],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((git_url, git_ref, lm_name, lm_namespace, description)) = row else {
            return Ok(None);
        };

        let (url, ref_) = match (git_url, git_ref) {
            (Some(url), Some(ref_)) => (url, ref_),
            _ => {
                return Err(user_error(
                    Errc::CorruptedCatalogDb,
                    format!("catalog row for {} is missing remote info", id),
                ))
            }
        };
        let auto_lib = match (lm_namespace, lm_name) {
            (Some(namespace), Some(name)) => Some(AutoLib { namespace, name }),
            _ => None,
        };

        Ok(Some(PackageInfo {
            id: id.clone(),
            deps: self.dependencies_of(id)?,
            description,
            remote: RemoteListing::Git(GitRemote {
                url,
                ref_,
                auto_lib,
            }),
        }))
    }

    /// Like [`Catalog::get`], but a miss becomes `no_such_catalog_package`
    /// with an edit-distance suggestion over the full ID list.
    pub fn get_or_error(&self, id: &PackageId) -> Result<PackageInfo> {
        if let Some(info) = self.get(id)? {
            return Ok(info);
        }
        let all = self.all()?;
        let dym = did_you_mean(&id.to_string(), all.iter().map(|p| p.to_string()));
        let suffix = crate::util::dym::dym_suffix(&dym);
        Err(user_error(
            Errc::NoSuchCatalogPackage,
            format!("no package in the catalog matched the ID '{}'.{}", id, suffix),
        ))
    }

    /// Every package ID in the catalog, ordered.
    pub fn all(&self) -> Result<Vec<PackageId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, version FROM drydock_cat_pkgs ORDER BY name, version")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut ids = Vec::new();
        for row in rows {
            let (name, version) = row?;
            ids.push(PackageId {
                name,
                version: parse_version(&version)?,
            });
        }
        ids.sort();
        Ok(ids)
    }

    /// All versions of one package name.
    pub fn by_name(&self, name: &str) -> Result<Vec<PackageId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, version FROM drydock_cat_pkgs WHERE name = ?1")?;
        let rows = stmt.query_map(params![name], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut ids = Vec::new();
        for row in rows {
            let (name, version) = row?;
            ids.push(PackageId {
                name,
                version: parse_version(&version)?,
            });
        }
        ids.sort();
        Ok(ids)
    }

    /// The dependency edges of one package, ordered by dependency name.
    pub fn dependencies_of(&self, id: &PackageId) -> Result<Vec<Dependency>> {
        let mut stmt = self.conn.prepare(
            "WITH this_pkg_id AS (
                 SELECT pkg_id FROM drydock_cat_pkgs
                  WHERE name = ?1 AND version = ?2
             )
             SELECT dep_name, low, high
               FROM drydock_cat_pkg_deps
              WHERE pkg_id IN this_pkg_id
           ORDER BY dep_name",
        )?;
        let rows = stmt.query_map(params![id.name, id.version.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut deps = Vec::new();
        for row in rows {
            let (name, low, high) = row?;
            let range = VersionRange::new(parse_version(&low)?, parse_version(&high)?)?;
            deps.push(Dependency { name, range });
        }
        Ok(deps)
    }

    /// Import a catalog JSON document. See the import module for the
    /// grammar; the whole document is stored in a single transaction.
    pub fn import_json_str(&self, content: &str) -> Result<()> {
        let packages = import::parse_catalog_json(content)?;
        let tx = self.conn.unchecked_transaction()?;
        for pkg in &packages {
            store_with(&tx, pkg)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Import a catalog JSON document from a file.
    pub fn import_json_file(&self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            user_error(
                Errc::InvalidCatalogJson,
                format!("failed to read {}: {}", path.display(), e),
            )
        })?;
        self.import_json_str(&content)
    }
}

/// The insert half of `store`, usable inside a caller-owned transaction.
fn store_with(conn: &Connection, pkg: &PackageInfo) -> Result<()> {
    let RemoteListing::Git(ref git) = pkg.remote;
    let (lm_name, lm_namespace) = match &git.auto_lib {
        Some(al) => (Some(al.name.as_str()), Some(al.namespace.as_str())),
        None => (None, None),
    };

    conn.execute(
        "INSERT OR REPLACE INTO drydock_cat_pkgs (
             name, version, git_url, git_ref, lm_name, lm_namespace, description
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            pkg.id.name,
            pkg.id.version.to_string(),
            git.url,
            git.ref_,
            lm_name,
            lm_namespace,
            pkg.description,
        ],
    )?;
    let pkg_rowid = conn.last_insert_rowid();

    // INSERT OR REPLACE allocates a fresh pkg_id; the cascade has already
    // dropped any dependency rows of the replaced record.
    let mut dep_stmt = conn.prepare(
        "INSERT INTO drydock_cat_pkg_deps (pkg_id, dep_name, low, high)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for dep in &pkg.deps {
        dep_stmt.execute(params![
            pkg_rowid,
            dep.name,
            dep.range.low().to_string(),
            dep.range.high().to_string(),
        ])?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;
    use tempfile::TempDir;

    fn pkg(id: &str, deps: &[(&str, &str, &str)]) -> PackageInfo {
        PackageInfo {
            id: PackageId::parse(id).unwrap(),
            deps: deps
                .iter()
                .map(|(name, low, high)| Dependency {
                    name: name.to_string(),
                    range: VersionRange::new(
                        low.parse::<Version>().unwrap(),
                        high.parse::<Version>().unwrap(),
                    )
                    .unwrap(),
                })
                .collect(),
            description: "a test package".to_string(),
            remote: RemoteListing::Git(GitRemote {
                url: "https://example.com/repo.git".to_string(),
                ref_: "v1".to_string(),
                auto_lib: None,
            }),
        }
    }

    #[test]
    fn test_store_and_get() {
        let cat = Catalog::open_in_memory().unwrap();
        let info = pkg("foo@1.2.3", &[("bar", "1.0.0", "2.0.0")]);
        cat.store(&info).unwrap();

        let got = cat.get(&info.id).unwrap().unwrap();
        assert_eq!(got, info);
    }

    #[test]
    fn test_get_missing_is_none() {
        let cat = Catalog::open_in_memory().unwrap();
        let id = PackageId::parse("nothere@1.0.0").unwrap();
        assert!(cat.get(&id).unwrap().is_none());
    }

    #[test]
    fn test_get_or_error_suggests() {
        let cat = Catalog::open_in_memory().unwrap();
        cat.store(&pkg("spdlog@1.4.2", &[])).unwrap();

        let err = cat
            .get_or_error(&PackageId::parse("spdlo@1.4.2").unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), Errc::NoSuchCatalogPackage);
        assert!(err.to_string().contains("spdlog@1.4.2"));
    }

    #[test]
    fn test_store_replaces_deps() {
        let cat = Catalog::open_in_memory().unwrap();
        cat.store(&pkg("foo@1.0.0", &[("a", "1.0.0", "2.0.0"), ("b", "1.0.0", "2.0.0")]))
            .unwrap();
        cat.store(&pkg("foo@1.0.0", &[("c", "3.0.0", "4.0.0")])).unwrap();

        let deps = cat
            .dependencies_of(&PackageId::parse("foo@1.0.0").unwrap())
            .unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "c");
    }

    #[test]
    fn test_deps_ordered_by_name() {
        let cat = Catalog::open_in_memory().unwrap();
        cat.store(&pkg(
            "foo@1.0.0",
            &[("zlib", "1.0.0", "2.0.0"), ("abc", "1.0.0", "2.0.0")],
        ))
        .unwrap();

        let deps = cat
            .dependencies_of(&PackageId::parse("foo@1.0.0").unwrap())
            .unwrap();
        assert_eq!(deps[0].name, "abc");
        assert_eq!(deps[1].name, "zlib");
    }

    #[test]
    fn test_all_and_by_name() {
        let cat = Catalog::open_in_memory().unwrap();
        cat.store(&pkg("aaa@1.0.0", &[])).unwrap();
        cat.store(&pkg("aaa@1.5.0", &[])).unwrap();
        cat.store(&pkg("bbb@0.1.0", &[])).unwrap();

        let all = cat.all().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].to_string(), "aaa@1.0.0");

        let aaa = cat.by_name("aaa").unwrap();
        assert_eq!(aaa.len(), 2);
    }

    #[test]
    fn test_auto_lib_roundtrip() {
        let cat = Catalog::open_in_memory().unwrap();
        let mut info = pkg("boost-filesystem@1.70.0", &[]);
        info.remote = RemoteListing::Git(GitRemote {
            url: "https://example.com/boost.git".to_string(),
            ref_: "boost-1.70.0".to_string(),
            auto_lib: Some(AutoLib {
                namespace: "boost".to_string(),
                name: "filesystem".to_string(),
            }),
        });
        cat.store(&info).unwrap();

        let got = cat.get(&info.id).unwrap().unwrap();
        assert_eq!(got.remote, info.remote);
    }

    #[test]
    fn test_open_persists_and_remigrates() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("nested/dir/catalog.db");

        {
            let cat = Catalog::open(&db).unwrap();
            cat.store(&pkg("keep@1.0.0", &[("d", "1.0.0", "2.0.0")])).unwrap();
        }

        let cat = Catalog::open(&db).unwrap();
        let got = cat
            .get(&PackageId::parse("keep@1.0.0").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(got.deps.len(), 1);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("catalog.db");

        {
            let cat = Catalog::open(&db).unwrap();
            cat.conn
                .execute(
                    "UPDATE drydock_cat_meta SET meta = '{\"version\": 99}'",
                    [],
                )
                .unwrap();
        }

        let err = Catalog::open(&db).unwrap_err();
        assert_eq!(err.kind(), Errc::CatalogTooNew);
    }

    #[test]
    fn test_garbage_db_is_corrupted() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("catalog.db");

        {
            let cat = Catalog::open(&db).unwrap();
            cat.conn
                .execute("UPDATE drydock_cat_meta SET meta = 'not json'", [])
                .unwrap();
        }

        let err = Catalog::open(&db).unwrap_err();
        assert_eq!(err.kind(), Errc::CorruptedCatalogDb);
    }
}
