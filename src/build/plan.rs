//! Build plan construction.
//!
//! A plan is pure data derived from a set of sdists, per-sdist build
//! parameters, and the output layout. Per library it holds a flat arena of
//! compile nodes; archive and link nodes refer to compiles by index rather
//! than by back-pointer. Nothing here touches the filesystem except the
//! initial source enumeration.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::build::lmi::ExternalLib;
use crate::build::sources::{collect_sources, SourceKind};
use crate::build::BuildEnv;
use crate::sdist::Sdist;
use crate::toolchain::{CompileCommand, CompileParams};

/// Per-sdist build parameters.
///
/// Apps and tests are only built for the primary (project) sdist;
/// dependency sdists get the default of neither.
#[derive(Debug, Clone, Default)]
pub struct SdistBuildParams {
    /// Subdirectory of the build root receiving this sdist's outputs.
    pub subdir: PathBuf,
    pub build_apps: bool,
    pub build_tests: bool,
    pub enable_warnings: bool,
}

/// A planned compilation of one translation unit.
#[derive(Debug, Clone)]
pub struct CompileFilePlan {
    pub source: PathBuf,
    /// The sdist root the source belongs to; object paths mirror the
    /// source's position beneath it.
    pub basis: PathBuf,
    /// Library name, for progress messages.
    pub qualifier: String,
    pub subdir: PathBuf,
    pub include_dirs: Vec<PathBuf>,
    pub enable_warnings: bool,
}

impl CompileFilePlan {
    /// Where the object file for this compile lands.
    pub fn object_file_path(&self, env: &BuildEnv) -> PathBuf {
        let rel = self
            .source
            .strip_prefix(&self.basis)
            .unwrap_or(&self.source);
        let mut name = rel.as_os_str().to_os_string();
        name.push(env.toolchain.object_suffix());
        env.out_root.join(&self.subdir).join("obj").join(name)
    }

    /// Render the concrete compiler invocation.
    pub fn generate_compile_command(&self, env: &BuildEnv) -> CompileCommand {
        env.toolchain.compile_command(&CompileParams {
            source: self.source.clone(),
            object: self.object_file_path(env),
            include_dirs: self.include_dirs.clone(),
            enable_warnings: self.enable_warnings,
        })
    }
}

/// A planned static-library archive over a set of compile nodes.
#[derive(Debug, Clone)]
pub struct CreateArchivePlan {
    pub name: String,
    pub subdir: PathBuf,
    /// Indices into the owning library's compile arena.
    pub compiles: Vec<usize>,
}

impl CreateArchivePlan {
    pub fn archive_file_path(&self, env: &BuildEnv) -> PathBuf {
        env.out_root
            .join(&self.subdir)
            .join(env.toolchain.archive_file_name(&self.name))
    }
}

/// What flavor of executable a link produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutableKind {
    Application,
    Test,
}

/// A planned executable link.
#[derive(Debug, Clone)]
pub struct LinkExecutablePlan {
    pub name: String,
    pub kind: ExecutableKind,
    /// Index of this executable's own compile node in the owning library's
    /// arena.
    pub compile: usize,
    pub subdir: PathBuf,
}

impl LinkExecutablePlan {
    pub fn exe_path(&self, env: &BuildEnv) -> PathBuf {
        let dir = match self.kind {
            ExecutableKind::Application => env.out_root.join(&self.subdir),
            ExecutableKind::Test => env.out_root.join(&self.subdir).join("test"),
        };
        dir.join(format!("{}{}", self.name, env.toolchain.exe_suffix()))
    }
}

/// The plan for one sdist's library and its executables.
#[derive(Debug, Clone)]
pub struct LibraryPlan {
    pub name: String,
    pub namespace: String,
    pub subdir: PathBuf,
    /// Flat arena of compile nodes; archive and executables refer to these
    /// by index.
    pub compiles: Vec<CompileFilePlan>,
    pub archive: Option<CreateArchivePlan>,
    pub executables: Vec<LinkExecutablePlan>,
    /// Include directories that users of this library compile against.
    pub public_include_dirs: Vec<PathBuf>,
}

/// A complete build plan over every sdist participating in a build.
#[derive(Debug, Clone, Default)]
pub struct BuildPlan {
    pub libraries: Vec<LibraryPlan>,
    /// Archives of pre-built libraries (from an existing interchange
    /// index) that every executable additionally links against.
    pub external_archives: Vec<PathBuf>,
}

impl BuildPlan {
    /// Generate a plan. Libraries are planned in the order given; the
    /// caller passes dependencies leaves-first so archive inputs exist
    /// before their consumers link. `externals` are pre-built libraries
    /// whose include paths and archives participate without being built.
    pub fn generate(
        sdists: &[(Sdist, SdistBuildParams)],
        externals: &[ExternalLib],
    ) -> Result<BuildPlan> {
        // Usage requirements: each library compiles against every other
        // participant's public include directories.
        let all_public_includes: Vec<Vec<PathBuf>> = sdists
            .iter()
            .map(|(sdist, _)| public_include_dirs(&sdist.path))
            .collect();
        let external_includes: Vec<PathBuf> = externals
            .iter()
            .flat_map(|ext| ext.include_dirs.iter().cloned())
            .collect();

        let mut libraries = Vec::with_capacity(sdists.len());

        for (idx, (sdist, params)) in sdists.iter().enumerate() {
            let name = sdist.manifest.id.name.clone();
            let sources = collect_sources(&sdist.path)?;

            let mut include_dirs = all_public_includes[idx].clone();
            include_dirs.push(sdist.path.join("src"));
            for (other, dirs) in all_public_includes.iter().enumerate() {
                if other != idx {
                    include_dirs.extend(dirs.iter().cloned());
                }
            }
            include_dirs.extend(external_includes.iter().cloned());
            include_dirs.retain(|d| d.is_dir());
            include_dirs.dedup();

            let mut compiles = Vec::new();
            let mut archive_members = Vec::new();
            let mut executables = Vec::new();

            let mut plan_compile = |source: &Path| -> usize {
                compiles.push(CompileFilePlan {
                    source: source.to_path_buf(),
                    basis: sdist.path.clone(),
                    qualifier: name.clone(),
                    subdir: params.subdir.clone(),
                    include_dirs: include_dirs.clone(),
                    enable_warnings: params.enable_warnings,
                });
                compiles.len() - 1
            };

            for file in &sources {
                match file.kind {
                    SourceKind::Header => {}
                    SourceKind::Source => {
                        archive_members.push(plan_compile(&file.path));
                    }
                    SourceKind::App if params.build_apps => {
                        executables.push(LinkExecutablePlan {
                            name: executable_name(&file.path),
                            kind: ExecutableKind::Application,
                            compile: plan_compile(&file.path),
                            subdir: params.subdir.clone(),
                        });
                    }
                    SourceKind::Test if params.build_tests => {
                        executables.push(LinkExecutablePlan {
                            name: executable_name(&file.path),
                            kind: ExecutableKind::Test,
                            compile: plan_compile(&file.path),
                            subdir: params.subdir.clone(),
                        });
                    }
                    SourceKind::App | SourceKind::Test => {}
                }
            }

            let archive = if archive_members.is_empty() {
                None
            } else {
                Some(CreateArchivePlan {
                    name: name.clone(),
                    subdir: params.subdir.clone(),
                    compiles: archive_members,
                })
            };

            libraries.push(LibraryPlan {
                name,
                namespace: sdist.manifest.namespace.clone(),
                subdir: params.subdir.clone(),
                compiles,
                archive,
                executables,
                public_include_dirs: all_public_includes[idx].clone(),
            });
        }

        Ok(BuildPlan {
            libraries,
            external_archives: externals.iter().map(|ext| ext.path.clone()).collect(),
        })
    }

    /// Total number of compile nodes in the plan.
    pub fn compile_count(&self) -> usize {
        self.libraries.iter().map(|l| l.compiles.len()).sum()
    }

    /// Every archive path an executable of `lib_index` links against: its
    /// own library's archive first, then every other participant's.
    pub fn link_archives(&self, lib_index: usize, env: &BuildEnv) -> Vec<PathBuf> {
        let mut archives = Vec::new();
        if let Some(ar) = &self.libraries[lib_index].archive {
            archives.push(ar.archive_file_path(env));
        }
        for (idx, lib) in self.libraries.iter().enumerate() {
            if idx == lib_index {
                continue;
            }
            if let Some(ar) = &lib.archive {
                archives.push(ar.archive_file_path(env));
            }
        }
        archives.extend(self.external_archives.iter().cloned());
        archives
    }
}

/// The include directories a library exports to its users: `include/` when
/// present, otherwise `src/`.
fn public_include_dirs(root: &Path) -> Vec<PathBuf> {
    let include = root.join("include");
    if include.is_dir() {
        vec![include]
    } else {
        vec![root.join("src")]
    }
}

fn executable_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    // `foo.main.cpp` / `foo.test.cpp` produce an executable called `foo`.
    stem.trim_end_matches(".main")
        .trim_end_matches(".test")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildEnv;
    use crate::toolchain::Toolchain;
    use tempfile::TempDir;

    fn make_sdist(tmp: &Path, name: &str) -> Sdist {
        let root = tmp.join(name);
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("include")).unwrap();
        std::fs::write(
            root.join("package.json5"),
            format!(r#"{{"name": "{}", "version": "1.0.0"}}"#, name),
        )
        .unwrap();
        std::fs::write(root.join("src/a.cpp"), "").unwrap();
        std::fs::write(root.join("src/b.cpp"), "").unwrap();
        std::fs::write(root.join("src/a.test.cpp"), "").unwrap();
        std::fs::write(root.join("src/tool.main.cpp"), "").unwrap();
        Sdist::from_directory(&root).unwrap()
    }

    fn env(tmp: &Path) -> BuildEnv {
        BuildEnv {
            out_root: tmp.join("_build"),
            toolchain: Toolchain::get_builtin("gcc").unwrap(),
        }
    }

    #[test]
    fn test_primary_gets_apps_and_tests() {
        let tmp = TempDir::new().unwrap();
        let sdist = make_sdist(tmp.path(), "mylib");

        let plan = BuildPlan::generate(&[(
            sdist,
            SdistBuildParams {
                build_apps: true,
                build_tests: true,
                enable_warnings: true,
                ..Default::default()
            },
        )], &[])
        .unwrap();

        let lib = &plan.libraries[0];
        // 2 library sources + 1 test + 1 app
        assert_eq!(lib.compiles.len(), 4);
        assert_eq!(lib.archive.as_ref().unwrap().compiles.len(), 2);
        assert_eq!(lib.executables.len(), 2);

        let test = lib
            .executables
            .iter()
            .find(|e| e.kind == ExecutableKind::Test)
            .unwrap();
        assert_eq!(test.name, "a");
        let app = lib
            .executables
            .iter()
            .find(|e| e.kind == ExecutableKind::Application)
            .unwrap();
        assert_eq!(app.name, "tool");
    }

    #[test]
    fn test_dependency_gets_library_only() {
        let tmp = TempDir::new().unwrap();
        let sdist = make_sdist(tmp.path(), "dep");

        let plan =
            BuildPlan::generate(&[(sdist, SdistBuildParams::default())], &[]).unwrap();

        let lib = &plan.libraries[0];
        assert_eq!(lib.compiles.len(), 2);
        assert!(lib.executables.is_empty());
    }

    #[test]
    fn test_object_paths_mirror_sources() {
        let tmp = TempDir::new().unwrap();
        let sdist = make_sdist(tmp.path(), "mylib");
        let env = env(tmp.path());

        let plan = BuildPlan::generate(&[(
            sdist,
            SdistBuildParams {
                subdir: PathBuf::from("main"),
                ..Default::default()
            },
        )], &[])
        .unwrap();

        let obj = plan.libraries[0].compiles[0].object_file_path(&env);
        assert!(obj.starts_with(env.out_root.join("main").join("obj")));
        assert!(obj.to_string_lossy().ends_with("a.cpp.o"));
    }

    #[test]
    fn test_includes_cross_sdists() {
        let tmp = TempDir::new().unwrap();
        let dep = make_sdist(tmp.path(), "dep");
        let main = make_sdist(tmp.path(), "mainlib");

        let plan = BuildPlan::generate(&[
            (dep.clone(), SdistBuildParams::default()),
            (main, SdistBuildParams::default()),
        ], &[])
        .unwrap();

        let main_lib = &plan.libraries[1];
        let includes = &main_lib.compiles[0].include_dirs;
        assert!(includes.iter().any(|d| d == &dep.path.join("include")));
    }

    #[test]
    fn test_header_only_library_has_no_archive() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("hdr");
        std::fs::create_dir_all(root.join("include")).unwrap();
        std::fs::write(
            root.join("package.json5"),
            r#"{"name": "hdr", "version": "1.0.0"}"#,
        )
        .unwrap();
        std::fs::write(root.join("include/only.hpp"), "").unwrap();
        let sdist = Sdist::from_directory(&root).unwrap();

        let plan = BuildPlan::generate(&[(sdist, SdistBuildParams::default())], &[]).unwrap();
        assert!(plan.libraries[0].archive.is_none());
        assert!(plan.libraries[0].compiles.is_empty());
    }

    #[test]
    fn test_link_archives_own_first() {
        let tmp = TempDir::new().unwrap();
        let dep = make_sdist(tmp.path(), "dep");
        let main = make_sdist(tmp.path(), "mainlib");
        let env = env(tmp.path());

        let plan = BuildPlan::generate(&[
            (dep, SdistBuildParams::default()),
            (main, SdistBuildParams::default()),
        ], &[])
        .unwrap();

        let archives = plan.link_archives(1, &env);
        assert_eq!(archives.len(), 2);
        assert!(archives[0].ends_with("libmainlib.a"));
        assert!(archives[1].ends_with("libdep.a"));
    }
}
