//! Toolchain descriptors.
//!
//! A toolchain is a data value that renders concrete compile, archive, and
//! link command vectors and declares how file-level dependency information
//! is obtained. Descriptors come from a `:`-prefixed built-in name (e.g.
//! `:gcc-9`) or from a JSON descriptor file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{user_error, Errc, Result};
use crate::util::jsonc;

/// How the toolchain exposes file-level dependency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepsMode {
    /// No dependency information; every input change forces a full rebuild
    /// decision from the command line alone.
    None,
    /// A Makefile-fragment depfile written next to the object file.
    #[default]
    Gnu,
    /// `cl.exe`-style notes printed on stdout.
    Msvc,
}

/// The command-vector dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Gnu,
    Msvc,
}

/// The default (English) prefix printed by `cl.exe /showIncludes`. The
/// string is localized; descriptor files can override it.
pub const DEFAULT_MSVC_DEPS_LEADER: &str = "Note: including file:";

/// A concrete toolchain.
#[derive(Debug, Clone)]
pub struct Toolchain {
    c_compiler: PathBuf,
    cxx_compiler: PathBuf,
    archiver: PathBuf,
    family: Family,
    compile_flags: Vec<String>,
    warning_flags: Vec<String>,
    deps_mode: DepsMode,
    msvc_deps_leader: String,
    archive_prefix: String,
    archive_suffix: String,
    object_suffix: String,
    exe_suffix: String,
}

/// Inputs to a compile command.
#[derive(Debug, Clone)]
pub struct CompileParams {
    pub source: PathBuf,
    pub object: PathBuf,
    pub include_dirs: Vec<PathBuf>,
    pub enable_warnings: bool,
}

/// A rendered compile command plus, in GNU deps mode, the depfile the
/// compiler will write.
#[derive(Debug, Clone)]
pub struct CompileCommand {
    pub command: Vec<String>,
    pub gnu_depfile: Option<PathBuf>,
}

/// Inputs to an executable link.
#[derive(Debug, Clone)]
pub struct LinkParams {
    pub objects: Vec<PathBuf>,
    pub archives: Vec<PathBuf>,
    pub output: PathBuf,
}

fn is_cxx_source(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("cpp" | "cc" | "cxx" | "c++")
    )
}

impl Toolchain {
    /// Look up a built-in toolchain by its (un-prefixed) name.
    pub fn get_builtin(name: &str) -> Option<Toolchain> {
        let (base, version) = match name.split_once('-') {
            Some((base, version)) => (base, Some(version)),
            None => (name, None),
        };

        let versioned = |prog: &str| match version {
            Some(v) => format!("{}-{}", prog, v),
            None => prog.to_string(),
        };

        match base {
            "gcc" => Some(Toolchain::gnu_style(
                versioned("gcc"),
                versioned("g++"),
                "ar",
            )),
            "clang" => Some(Toolchain::gnu_style(
                versioned("clang"),
                versioned("clang++"),
                "ar",
            )),
            "msvc" if version.is_none() => Some(Toolchain::msvc_style()),
            _ => None,
        }
    }

    fn gnu_style(cc: String, cxx: String, ar: &str) -> Toolchain {
        Toolchain {
            c_compiler: PathBuf::from(cc),
            cxx_compiler: PathBuf::from(cxx),
            archiver: PathBuf::from(ar),
            family: Family::Gnu,
            compile_flags: vec!["-fPIC".to_string(), "-pthread".to_string()],
            warning_flags: vec!["-Wall".to_string(), "-Wextra".to_string()],
            deps_mode: DepsMode::Gnu,
            msvc_deps_leader: DEFAULT_MSVC_DEPS_LEADER.to_string(),
            archive_prefix: "lib".to_string(),
            archive_suffix: ".a".to_string(),
            object_suffix: ".o".to_string(),
            exe_suffix: String::new(),
        }
    }

    fn msvc_style() -> Toolchain {
        Toolchain {
            c_compiler: PathBuf::from("cl.exe"),
            cxx_compiler: PathBuf::from("cl.exe"),
            archiver: PathBuf::from("lib.exe"),
            family: Family::Msvc,
            compile_flags: vec!["/nologo".to_string(), "/EHsc".to_string()],
            warning_flags: vec!["/W4".to_string()],
            deps_mode: DepsMode::Msvc,
            msvc_deps_leader: DEFAULT_MSVC_DEPS_LEADER.to_string(),
            archive_prefix: String::new(),
            archive_suffix: ".lib".to_string(),
            object_suffix: ".obj".to_string(),
            exe_suffix: ".exe".to_string(),
        }
    }

    /// Resolve a toolchain argument: `:name` selects a built-in, anything
    /// else is a descriptor file path.
    pub fn from_arg(spec: &str) -> Result<Toolchain> {
        if let Some(builtin) = spec.strip_prefix(':') {
            return Toolchain::get_builtin(builtin).ok_or_else(|| {
                user_error(
                    Errc::InvalidBuiltinToolchain,
                    format!("invalid built-in toolchain name '{}'", builtin),
                )
            });
        }
        Toolchain::from_file(Path::new(spec))
    }

    /// Locate and load the default toolchain descriptor, if one exists.
    ///
    /// Looks for `drydock-toolchain.{json5,jsonc,json}` in the current
    /// directory, then in the user config directory.
    pub fn get_default() -> Result<Option<Toolchain>> {
        const NAMES: &[&str] = &[
            "drydock-toolchain.json5",
            "drydock-toolchain.jsonc",
            "drydock-toolchain.json",
        ];

        let mut dirs = vec![PathBuf::from(".")];
        if let Some(proj) = directories::ProjectDirs::from("dev", "drydock", "drydock") {
            dirs.push(proj.config_dir().to_path_buf());
        }

        for dir in dirs {
            for name in NAMES {
                let cand = dir.join(name);
                if cand.is_file() {
                    tracing::debug!("using default toolchain file {}", cand.display());
                    return Toolchain::from_file(&cand).map(Some);
                }
            }
        }

        // No descriptor file; fall back to a compiler found on PATH.
        for (cc, cxx) in [("gcc", "g++"), ("clang", "clang++"), ("cc", "c++")] {
            if which::which(cc).is_ok() {
                tracing::debug!("defaulting to {} found on PATH", cc);
                return Ok(Some(Toolchain::gnu_style(
                    cc.to_string(),
                    cxx.to_string(),
                    "ar",
                )));
            }
        }
        Ok(None)
    }

    /// Load a toolchain from a JSON descriptor file.
    pub fn from_file(path: &Path) -> Result<Toolchain> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            user_error(
                Errc::NoDefaultToolchain,
                format!("failed to read toolchain file {}: {}", path.display(), e),
            )
        })?;
        Toolchain::from_json_str(&content).map_err(|e| {
            user_error(
                e.kind(),
                format!("in toolchain file {}: {}", path.display(), e),
            )
        })
    }

    /// Parse a JSON descriptor.
    pub fn from_json_str(content: &str) -> Result<Toolchain> {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct RawToolchain {
            #[serde(default)]
            base: Option<String>,
            #[serde(default)]
            c_compiler: Option<PathBuf>,
            #[serde(default)]
            cxx_compiler: Option<PathBuf>,
            #[serde(default)]
            archiver: Option<PathBuf>,
            #[serde(default)]
            flags: Option<Vec<String>>,
            #[serde(default)]
            warning_flags: Option<Vec<String>>,
            #[serde(default)]
            deps_mode: Option<DepsMode>,
            #[serde(default)]
            msvc_deps_leader: Option<String>,
            #[serde(default)]
            archive_suffix: Option<String>,
            #[serde(default)]
            object_suffix: Option<String>,
            #[serde(default)]
            exe_suffix: Option<String>,
        }

        let stripped = jsonc::strip_comments(content);
        let raw: RawToolchain = serde_json::from_str(&stripped).map_err(|e| {
            user_error(
                Errc::InvalidBuiltinToolchain,
                format!("invalid toolchain descriptor: {}", e),
            )
        })?;

        let mut tc = match raw.base.as_deref() {
            Some(base) => Toolchain::get_builtin(base.trim_start_matches(':')).ok_or_else(|| {
                user_error(
                    Errc::InvalidBuiltinToolchain,
                    format!("invalid base toolchain name '{}'", base),
                )
            })?,
            None => Toolchain::gnu_style("cc".to_string(), "c++".to_string(), "ar"),
        };

        if let Some(cc) = raw.c_compiler {
            tc.c_compiler = cc;
        }
        if let Some(cxx) = raw.cxx_compiler {
            tc.cxx_compiler = cxx;
        }
        if let Some(ar) = raw.archiver {
            tc.archiver = ar;
        }
        if let Some(flags) = raw.flags {
            tc.compile_flags = flags;
        }
        if let Some(warning_flags) = raw.warning_flags {
            tc.warning_flags = warning_flags;
        }
        if let Some(deps_mode) = raw.deps_mode {
            tc.deps_mode = deps_mode;
        }
        if let Some(leader) = raw.msvc_deps_leader {
            tc.msvc_deps_leader = leader;
        }
        if let Some(suffix) = raw.archive_suffix {
            tc.archive_suffix = suffix;
        }
        if let Some(suffix) = raw.object_suffix {
            tc.object_suffix = suffix;
        }
        if let Some(suffix) = raw.exe_suffix {
            tc.exe_suffix = suffix;
        }

        Ok(tc)
    }

    pub fn deps_mode(&self) -> DepsMode {
        self.deps_mode
    }

    /// The `/showIncludes` note prefix to strip from MSVC output.
    pub fn msvc_deps_leader(&self) -> &str {
        &self.msvc_deps_leader
    }

    /// The static library suffix (`.a` / `.lib`).
    pub fn archive_suffix(&self) -> &str {
        &self.archive_suffix
    }

    pub fn object_suffix(&self) -> &str {
        &self.object_suffix
    }

    pub fn exe_suffix(&self) -> &str {
        &self.exe_suffix
    }

    /// The platform file name of a static library called `name`.
    pub fn archive_file_name(&self, name: &str) -> String {
        format!("{}{}{}", self.archive_prefix, name, self.archive_suffix)
    }

    /// Render a compile command.
    pub fn compile_command(&self, params: &CompileParams) -> CompileCommand {
        let compiler = if is_cxx_source(&params.source) {
            &self.cxx_compiler
        } else {
            &self.c_compiler
        };

        let mut command = vec![compiler.display().to_string()];
        command.extend(self.compile_flags.iter().cloned());
        if params.enable_warnings {
            command.extend(self.warning_flags.iter().cloned());
        }

        match self.family {
            Family::Gnu => {
                for dir in &params.include_dirs {
                    command.push(format!("-I{}", dir.display()));
                }
                command.push("-c".to_string());
                command.push(params.source.display().to_string());
                command.push("-o".to_string());
                command.push(params.object.display().to_string());
            }
            Family::Msvc => {
                for dir in &params.include_dirs {
                    command.push(format!("/I{}", dir.display()));
                }
                command.push("/c".to_string());
                command.push(params.source.display().to_string());
                command.push(format!("/Fo{}", params.object.display()));
            }
        }

        let gnu_depfile = match self.deps_mode {
            DepsMode::Gnu => {
                let depfile = PathBuf::from(format!("{}.d", params.object.display()));
                command.push("-MD".to_string());
                command.push("-MF".to_string());
                command.push(depfile.display().to_string());
                Some(depfile)
            }
            DepsMode::Msvc => {
                command.push("/showIncludes".to_string());
                None
            }
            DepsMode::None => None,
        };

        CompileCommand {
            command,
            gnu_depfile,
        }
    }

    /// Render an archive (static library) command.
    pub fn archive_command(&self, objects: &[PathBuf], output: &Path) -> Vec<String> {
        let mut command = vec![self.archiver.display().to_string()];
        match self.family {
            Family::Gnu => {
                command.push("rcs".to_string());
                command.push(output.display().to_string());
            }
            Family::Msvc => {
                command.push("/nologo".to_string());
                command.push(format!("/OUT:{}", output.display()));
            }
        }
        command.extend(objects.iter().map(|o| o.display().to_string()));
        command
    }

    /// Render an executable link command. The C++ driver is used so the C++
    /// runtime is linked whenever any input needs it.
    pub fn link_exe_command(&self, params: &LinkParams) -> Vec<String> {
        match self.family {
            Family::Gnu => {
                let mut command = vec![self.cxx_compiler.display().to_string()];
                command.extend(params.objects.iter().map(|o| o.display().to_string()));
                command.extend(params.archives.iter().map(|a| a.display().to_string()));
                command.push("-pthread".to_string());
                command.push("-o".to_string());
                command.push(params.output.display().to_string());
                command
            }
            Family::Msvc => {
                let mut command = vec![
                    self.cxx_compiler.display().to_string(),
                    "/nologo".to_string(),
                ];
                command.extend(params.objects.iter().map(|o| o.display().to_string()));
                command.extend(params.archives.iter().map(|a| a.display().to_string()));
                command.push(format!("/Fe:{}", params.output.display()));
                command
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        assert!(Toolchain::get_builtin("gcc").is_some());
        assert!(Toolchain::get_builtin("gcc-9").is_some());
        assert!(Toolchain::get_builtin("clang").is_some());
        assert!(Toolchain::get_builtin("clang-14").is_some());
        assert!(Toolchain::get_builtin("msvc").is_some());
        assert!(Toolchain::get_builtin("tcc").is_none());
        assert!(Toolchain::get_builtin("").is_none());
    }

    #[test]
    fn test_from_arg_builtin() {
        let tc = Toolchain::from_arg(":gcc-9").unwrap();
        assert_eq!(tc.deps_mode(), DepsMode::Gnu);

        let err = Toolchain::from_arg(":not-a-compiler").unwrap_err();
        assert_eq!(err.kind(), crate::error::Errc::InvalidBuiltinToolchain);
    }

    #[test]
    fn test_gcc_compile_command() {
        let tc = Toolchain::get_builtin("gcc-9").unwrap();
        let cmd = tc.compile_command(&CompileParams {
            source: PathBuf::from("src/a.cpp"),
            object: PathBuf::from("_build/obj/a.cpp.o"),
            include_dirs: vec![PathBuf::from("include")],
            enable_warnings: true,
        });

        assert_eq!(cmd.command[0], "g++-9");
        assert!(cmd.command.contains(&"-Iinclude".to_string()));
        assert!(cmd.command.contains(&"-Wall".to_string()));
        assert!(cmd.command.contains(&"-c".to_string()));
        assert_eq!(
            cmd.gnu_depfile,
            Some(PathBuf::from("_build/obj/a.cpp.o.d"))
        );
    }

    #[test]
    fn test_c_source_uses_c_compiler() {
        let tc = Toolchain::get_builtin("gcc").unwrap();
        let cmd = tc.compile_command(&CompileParams {
            source: PathBuf::from("src/a.c"),
            object: PathBuf::from("a.o"),
            include_dirs: vec![],
            enable_warnings: false,
        });
        assert_eq!(cmd.command[0], "gcc");
        assert!(!cmd.command.contains(&"-Wall".to_string()));
    }

    #[test]
    fn test_msvc_commands() {
        let tc = Toolchain::get_builtin("msvc").unwrap();
        assert_eq!(tc.deps_mode(), DepsMode::Msvc);
        assert_eq!(tc.archive_suffix(), ".lib");
        assert_eq!(tc.archive_file_name("foo"), "foo.lib");

        let cmd = tc.compile_command(&CompileParams {
            source: PathBuf::from("src/a.cpp"),
            object: PathBuf::from("a.obj"),
            include_dirs: vec![],
            enable_warnings: false,
        });
        assert!(cmd.command.contains(&"/showIncludes".to_string()));
        assert!(cmd.gnu_depfile.is_none());
    }

    #[test]
    fn test_archive_command() {
        let tc = Toolchain::get_builtin("gcc").unwrap();
        let cmd = tc.archive_command(
            &[PathBuf::from("a.o"), PathBuf::from("b.o")],
            Path::new("libx.a"),
        );
        assert_eq!(cmd, ["ar", "rcs", "libx.a", "a.o", "b.o"]);
        assert_eq!(tc.archive_file_name("x"), "libx.a");
    }

    #[test]
    fn test_link_command() {
        let tc = Toolchain::get_builtin("gcc").unwrap();
        let cmd = tc.link_exe_command(&LinkParams {
            objects: vec![PathBuf::from("main.o")],
            archives: vec![PathBuf::from("libx.a")],
            output: PathBuf::from("app"),
        });
        assert_eq!(cmd[0], "g++");
        assert!(cmd.contains(&"libx.a".to_string()));
        assert_eq!(&cmd[cmd.len() - 2..], ["-o", "app"]);
    }

    #[test]
    fn test_descriptor_file_overrides() {
        let tc = Toolchain::from_json_str(
            r#"{
                // start from the clang builtin
                "base": "clang",
                "c_compiler": "/opt/bin/clang-17",
                "flags": ["-fPIC"],
                "deps_mode": "none",
                "msvc_deps_leader": "Remarque : inclusion du fichier :"
            }"#,
        )
        .unwrap();

        assert_eq!(tc.c_compiler, PathBuf::from("/opt/bin/clang-17"));
        assert_eq!(tc.deps_mode(), DepsMode::None);
        assert_eq!(tc.msvc_deps_leader(), "Remarque : inclusion du fichier :");
    }

    #[test]
    fn test_descriptor_rejects_unknown_keys() {
        let err = Toolchain::from_json_str(r#"{"compiler": "gcc"}"#).unwrap_err();
        assert_eq!(err.kind(), crate::error::Errc::InvalidBuiltinToolchain);
    }
}
