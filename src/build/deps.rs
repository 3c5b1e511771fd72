//! Dependency-scan parsing.
//!
//! Two toolchain dialects expose file-level dependency information: GNU
//! compilers write a Makefile-fragment depfile, and MSVC prints
//! `Note: including file:` lines on stdout. Both end up as a
//! [`FileDepsInfo`] record keyed by the output file.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::util::fs::normalize_path;

/// One output file's recorded dependency information.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDepsInfo {
    pub output: PathBuf,
    pub inputs: Vec<PathBuf>,
    /// The full quoted command that produced the output.
    pub command: String,
    /// The compiler's (cleaned) output from that command.
    pub command_output: String,
}

/// Parse a GNU Makefile-fragment depfile from disk.
pub fn parse_mkfile_deps_file(path: &Path) -> Result<Option<FileDepsInfo>> {
    let content = crate::util::fs::slurp_file(path)?;
    Ok(parse_mkfile_deps_str(&content))
}

/// Parse the `output: input input...` Makefile fragment produced by
/// `-MD -MF`. Returns `None` (after logging) on malformed content; a
/// malformed depfile is a toolchain integration bug, not a user error.
pub fn parse_mkfile_deps_str(content: &str) -> Option<FileDepsInfo> {
    // Escaped newlines are whitespace.
    let unwrapped = content.replace("\\\n", " ").replace("\\\r\n", " ");

    let mut words = split_shell_string(&unwrapped).into_iter();
    let Some(head) = words.next() else {
        tracing::error!("invalid deps listing: shell split was empty. This is almost certainly a bug.");
        return None;
    };
    let Some(output) = head.strip_suffix(':') else {
        tracing::error!(
            "invalid deps listing: leader item '{}' is not colon-terminated. This is probably a bug.",
            head
        );
        return None;
    };

    Some(FileDepsInfo {
        output: PathBuf::from(output),
        inputs: words.map(PathBuf::from).collect(),
        command: String::new(),
        command_output: String::new(),
    })
}

/// Split a string using (simplified) POSIX shell word rules: whitespace
/// separates words; single/double quotes group; backslash escapes the next
/// character.
fn split_shell_string(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut cur = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else if c == '\\' && q == '"' {
                    if let Some(next) = chars.next() {
                        cur.push(next);
                    }
                } else {
                    cur.push(c);
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_word = true;
                }
                '\\' => {
                    if let Some(next) = chars.next() {
                        cur.push(next);
                        in_word = true;
                    }
                }
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut cur));
                        in_word = false;
                    }
                }
                c => {
                    cur.push(c);
                    in_word = true;
                }
            },
        }
    }
    if in_word {
        words.push(cur);
    }
    words
}

/// The result of scanning MSVC output for `/showIncludes` notes.
#[derive(Debug, Clone, Default)]
pub struct MsvcDepsInfo {
    pub inputs: Vec<PathBuf>,
    /// The compiler output with the include notes removed.
    pub cleaned_output: String,
}

/// Scan compiler output for lines beginning with `leader`. Matching lines
/// are stripped and contribute input paths; everything else is kept as the
/// output shown to the user.
pub fn parse_msvc_output_for_deps(output: &str, leader: &str) -> MsvcDepsInfo {
    let mut deps = MsvcDepsInfo::default();

    for line in output.split('\n') {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix(leader) {
            deps.inputs.push(normalize_path(Path::new(rest.trim())));
        } else {
            deps.cleaned_output.push_str(line);
            deps.cleaned_output.push('\n');
        }
    }
    if !deps.cleaned_output.is_empty() {
        deps.cleaned_output.pop();
    }

    deps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mkfile_simple() {
        let info = parse_mkfile_deps_str("obj/a.o: src/a.cpp include/a.hpp\n").unwrap();
        assert_eq!(info.output, PathBuf::from("obj/a.o"));
        assert_eq!(
            info.inputs,
            [PathBuf::from("src/a.cpp"), PathBuf::from("include/a.hpp")]
        );
    }

    #[test]
    fn test_parse_mkfile_escaped_newlines() {
        let info =
            parse_mkfile_deps_str("obj/a.o: src/a.cpp \\\n  include/a.hpp \\\n  include/b.hpp\n")
                .unwrap();
        assert_eq!(info.inputs.len(), 3);
    }

    #[test]
    fn test_parse_mkfile_quoted_paths() {
        let info = parse_mkfile_deps_str(r#"obj/a.o: "my dir/a.cpp" plain.hpp"#).unwrap();
        assert_eq!(info.inputs[0], PathBuf::from("my dir/a.cpp"));
        assert_eq!(info.inputs[1], PathBuf::from("plain.hpp"));
    }

    #[test]
    fn test_parse_mkfile_backslash_escape() {
        let info = parse_mkfile_deps_str(r"obj/a.o: my\ file.cpp").unwrap();
        assert_eq!(info.inputs[0], PathBuf::from("my file.cpp"));
    }

    #[test]
    fn test_parse_mkfile_malformed() {
        assert!(parse_mkfile_deps_str("").is_none());
        assert!(parse_mkfile_deps_str("no-colon-here src/a.cpp").is_none());
    }

    #[test]
    fn test_msvc_notes_stripped() {
        let output = "a.cpp\n\
            Note: including file: C:\\inc\\a.hpp\n\
            Note: including file:  C:\\inc\\deep\\b.hpp\n\
            a.cpp(10): warning C4101: unused variable\n";

        let deps = parse_msvc_output_for_deps(output, "Note: including file:");
        assert_eq!(deps.inputs.len(), 2);
        assert!(deps.inputs[1].to_string_lossy().ends_with("b.hpp"));

        assert!(deps.cleaned_output.contains("warning C4101"));
        assert!(!deps.cleaned_output.contains("including file"));
    }

    #[test]
    fn test_msvc_custom_leader() {
        let output = "Remarque : inclusion du fichier : C:\\inc\\a.hpp\nreste";
        let deps =
            parse_msvc_output_for_deps(output, "Remarque : inclusion du fichier :");
        assert_eq!(deps.inputs.len(), 1);
        assert_eq!(deps.cleaned_output, "reste");
    }

    #[test]
    fn test_msvc_no_notes_output_unchanged() {
        let output = "plain line one\nplain line two";
        let deps = parse_msvc_output_for_deps(output, "Note: including file:");
        assert!(deps.inputs.is_empty());
        assert_eq!(deps.cleaned_output, output);
    }
}
