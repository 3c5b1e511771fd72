//! CLI integration tests for drydock.
//!
//! These exercise the catalog, sdist, and repo commands end to end. Build
//! commands need a toolchain and are covered by the incremental-build
//! tests against a scripted toolchain.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

fn drydock() -> Command {
    Command::cargo_bin("drydock").unwrap()
}

fn write_project(dir: &Path, name: &str) {
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::write(
        dir.join("package.json5"),
        format!(
            r#"{{
    // package identity
    "name": "{}",
    "version": "1.2.3",
}}"#,
            name
        ),
    )
    .unwrap();
    fs::write(dir.join("src/x.cpp"), "int x() { return 0; }\n").unwrap();
}

// ============================================================================
// drydock catalog
// ============================================================================

#[test]
fn test_catalog_create_and_list_empty() {
    let tmp = TempDir::new().unwrap();
    let cat = tmp.path().join("catalog.db");

    drydock()
        .args(["catalog", "create", "--catalog"])
        .arg(&cat)
        .assert()
        .success();
    assert!(cat.exists());

    drydock()
        .args(["catalog", "list", "--catalog"])
        .arg(&cat)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_catalog_add_show_list() {
    let tmp = TempDir::new().unwrap();
    let cat = tmp.path().join("catalog.db");

    drydock()
        .args([
            "catalog",
            "add",
            "spdlog@1.4.2",
            "--depends",
            "fmt@6.0.0",
            "--git-url",
            "https://github.com/gabime/spdlog.git",
            "--git-ref",
            "v1.4.2",
            "--desc",
            "Fast C++ logging library",
            "--catalog",
        ])
        .arg(&cat)
        .assert()
        .success();

    drydock()
        .args(["catalog", "list", "--catalog"])
        .arg(&cat)
        .assert()
        .success()
        .stdout(predicate::str::contains("spdlog@1.4.2"));

    drydock()
        .args(["catalog", "show", "spdlog@1.4.2", "--catalog"])
        .arg(&cat)
        .assert()
        .success()
        .stdout(predicate::str::contains("Name:     spdlog"))
        .stdout(predicate::str::contains("fmt@[6.0.0, 7.0.0)"))
        .stdout(predicate::str::contains("Git Ref:  v1.4.2"));
}

#[test]
fn test_catalog_add_requires_url_and_ref_together() {
    let tmp = TempDir::new().unwrap();
    let cat = tmp.path().join("catalog.db");

    drydock()
        .args([
            "catalog",
            "add",
            "x@1.0.0",
            "--git-url",
            "https://example.com/x.git",
            "--catalog",
        ])
        .arg(&cat)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("git"));
}

#[test]
fn test_catalog_import_and_show() {
    let tmp = TempDir::new().unwrap();
    let cat = tmp.path().join("catalog.db");
    let json = tmp.path().join("pkgs.json");
    fs::write(
        &json,
        r#"{
  "version": 1,
  "packages": {
    "neo-sqlite3": {
      "0.2.3": {
        "depends": {"neo-fun": "^0.1.1"},
        "git": {"url": "https://github.com/vector-of-bool/neo-sqlite3.git", "ref": "0.2.3"},
        "description": "A modern SQLite wrapper"
      }
    },
    "neo-fun": {
      "0.1.1": {
        "git": {"url": "https://github.com/vector-of-bool/neo-fun.git", "ref": "0.1.1"}
      }
    }
  }
}"#,
    )
    .unwrap();

    drydock()
        .args(["catalog", "import", "--json"])
        .arg(&json)
        .arg("--catalog")
        .arg(&cat)
        .assert()
        .success();

    drydock()
        .args(["catalog", "list", "--catalog"])
        .arg(&cat)
        .assert()
        .success()
        .stdout(predicate::str::contains("neo-fun@0.1.1"))
        .stdout(predicate::str::contains("neo-sqlite3@0.2.3"));
}

#[test]
fn test_catalog_import_too_new_fails() {
    let tmp = TempDir::new().unwrap();
    let cat = tmp.path().join("catalog.db");
    let json = tmp.path().join("pkgs.json");
    fs::write(&json, r#"{"version": 2, "packages": {}}"#).unwrap();

    drydock()
        .args(["catalog", "import", "--json"])
        .arg(&json)
        .arg("--catalog")
        .arg(&cat)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("too new"));
}

#[test]
fn test_catalog_show_unknown_suggests() {
    let tmp = TempDir::new().unwrap();
    let cat = tmp.path().join("catalog.db");

    drydock()
        .args([
            "catalog",
            "add",
            "spdlog@1.4.2",
            "--git-url",
            "u",
            "--git-ref",
            "r",
            "--catalog",
        ])
        .arg(&cat)
        .assert()
        .success();

    drydock()
        .args(["catalog", "show", "spdlo@1.4.2", "--catalog"])
        .arg(&cat)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Did you mean 'spdlog@1.4.2'?"));
}

// ============================================================================
// drydock sdist
// ============================================================================

#[test]
fn test_sdist_create_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path().join("proj");
    write_project(&project, "alib");
    let out = tmp.path().join("alib.sdist");

    drydock()
        .args(["sdist", "create", "-p"])
        .arg(&project)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    assert!(out.join("package.json5").exists());
    assert!(out.join("src/x.cpp").exists());

    // A second create without --replace refuses.
    drydock()
        .args(["sdist", "create", "-p"])
        .arg(&project)
        .arg("--out")
        .arg(&out)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("already exists"));

    drydock()
        .args(["sdist", "create", "--replace", "-p"])
        .arg(&project)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();
}

#[test]
fn test_sdist_export_and_repo_ls() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path().join("proj");
    write_project(&project, "alib");
    let repo = tmp.path().join("repo");

    drydock()
        .args(["sdist", "export", "-p"])
        .arg(&project)
        .arg("--repo-dir")
        .arg(&repo)
        .assert()
        .success();

    assert!(repo.join("alib@1.2.3/package.json5").exists());

    drydock()
        .args(["repo", "ls", "--repo-dir"])
        .arg(&repo)
        .assert()
        .success()
        .stdout(predicate::str::contains("alib:"))
        .stdout(predicate::str::contains("1.2.3"));

    // Exporting again without --replace is a user error...
    drydock()
        .args(["sdist", "export", "-p"])
        .arg(&project)
        .arg("--repo-dir")
        .arg(&repo)
        .assert()
        .failure()
        .code(1);

    // ...and succeeds with it.
    drydock()
        .args(["sdist", "export", "--replace", "-p"])
        .arg(&project)
        .arg("--repo-dir")
        .arg(&repo)
        .assert()
        .success();
}

// ============================================================================
// drydock repo
// ============================================================================

#[test]
fn test_repo_init_creates_directory() {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path().join("fresh-repo");

    drydock()
        .args(["repo", "init", "--repo-dir"])
        .arg(&repo)
        .assert()
        .success();

    assert!(repo.is_dir());
    assert!(repo.join(".lock").exists());
}

#[test]
fn test_repo_ls_missing_repo_fails() {
    let tmp = TempDir::new().unwrap();

    drydock()
        .args(["repo", "ls", "--repo-dir"])
        .arg(tmp.path().join("nope"))
        .assert()
        .failure();
}
