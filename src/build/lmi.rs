//! The libman interchange index writer.
//!
//! `INDEX.lmi` is a line-oriented `Key: value` document: a `Type: Index`
//! header, then one block per built library separated by blank lines. The
//! file is regenerated from scratch on every build.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;

use std::path::PathBuf;

use crate::build::plan::BuildPlan;
use crate::build::BuildEnv;
use crate::util::fs::write_string;

/// A pre-built library read back from an existing index. Builds can link
/// against these instead of (re)building the packages that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLib {
    pub name: String,
    pub namespace: String,
    pub path: PathBuf,
    pub include_dirs: Vec<PathBuf>,
}

/// Render the index for every library in the plan that produced an
/// archive.
pub fn render_index(plan: &BuildPlan, env: &BuildEnv) -> String {
    let mut out = String::from("Type: Index\n");

    for lib in &plan.libraries {
        let Some(archive) = &lib.archive else {
            continue;
        };
        out.push('\n');
        writeln!(out, "Name: {}", lib.name).expect("writing to string");
        writeln!(out, "Namespace: {}", lib.namespace).expect("writing to string");
        writeln!(out, "Path: {}", archive.archive_file_path(env).display())
            .expect("writing to string");
        for dir in &lib.public_include_dirs {
            writeln!(out, "Include-Path: {}", dir.display()).expect("writing to string");
        }
    }

    out
}

/// Write the index file, replacing any previous one.
pub fn write_index(plan: &BuildPlan, env: &BuildEnv, path: &Path) -> Result<()> {
    tracing::info!("writing library index: {}", path.display());
    write_string(path, &render_index(plan, env))
}

/// Parse an index document back into its library records. Unknown keys
/// are ignored so newer writers stay readable.
pub fn parse_index(content: &str) -> Vec<ExternalLib> {
    let mut libs = Vec::new();
    let mut cur: Option<ExternalLib> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            if let Some(lib) = cur.take() {
                libs.push(lib);
            }
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Name" => {
                if let Some(lib) = cur.take() {
                    libs.push(lib);
                }
                cur = Some(ExternalLib {
                    name: value.to_string(),
                    namespace: value.to_string(),
                    path: PathBuf::new(),
                    include_dirs: Vec::new(),
                });
            }
            "Namespace" => {
                if let Some(lib) = &mut cur {
                    lib.namespace = value.to_string();
                }
            }
            "Path" => {
                if let Some(lib) = &mut cur {
                    lib.path = PathBuf::from(value);
                }
            }
            "Include-Path" => {
                if let Some(lib) = &mut cur {
                    lib.include_dirs.push(PathBuf::from(value));
                }
            }
            _ => {}
        }
    }
    if let Some(lib) = cur.take() {
        libs.push(lib);
    }

    libs
}

/// Load an index file into library records.
pub fn load_index(path: &Path) -> Result<Vec<ExternalLib>> {
    let content = crate::util::fs::slurp_file(path)?;
    Ok(parse_index(&content))
}
