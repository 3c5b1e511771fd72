//! Source tree classification.
//!
//! Walks a package's source tree and sorts the files it finds into
//! headers, library sources, test sources, and application sources.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// What role a file plays in the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Header,
    Source,
    Test,
    App,
}

/// A classified file within a package tree.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: SourceKind,
}

const HEADER_EXTS: &[&str] = &["h", "hpp", "hh", "h++", "inl"];
const SOURCE_EXTS: &[&str] = &["c", "cpp", "cc", "cxx", "c++"];

/// Infer the kind of a single file from its name. `None` for files that
/// play no role in compilation (READMEs, build scripts, ...).
pub fn infer_source_kind(path: &Path) -> Option<SourceKind> {
    let ext = path.extension()?.to_str()?;
    if HEADER_EXTS.contains(&ext) {
        return Some(SourceKind::Header);
    }
    if !SOURCE_EXTS.contains(&ext) {
        return None;
    }

    let stem = path.file_stem()?.to_string_lossy();
    if stem.ends_with(".test") {
        Some(SourceKind::Test)
    } else if stem.ends_with(".main") {
        Some(SourceKind::App)
    } else {
        Some(SourceKind::Source)
    }
}

/// Enumerate and classify the sources of a package rooted at `root`.
///
/// `include/` contributes headers, `src/` contributes headers and sources
/// (with `.test`/`.main` basename markers), and everything compilable
/// under `apps/` is an application source.
pub fn collect_sources(root: &Path) -> Result<Vec<SourceFile>> {
    let mut out = Vec::new();

    for (dir, apps_only) in [("include", false), ("src", false), ("apps", true)] {
        let base = root.join(dir);
        if !base.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&base).sort_by_file_name() {
            let entry = entry
                .with_context(|| format!("failed to walk source tree {}", base.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(kind) = infer_source_kind(entry.path()) else {
                continue;
            };
            let kind = match (apps_only, kind) {
                (true, SourceKind::Header) => SourceKind::Header,
                (true, _) => SourceKind::App,
                (false, k) => k,
            };
            out.push(SourceFile {
                path: entry.path().to_path_buf(),
                kind,
            });
        }
    }

    Ok(out)
}
