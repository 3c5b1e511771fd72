//! Subprocess execution utilities.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
}

/// The collected result of a finished subprocess.
///
/// `output` interleaves stdout and stderr (stdout first); toolchain
/// invocations are expected to write diagnostics to either stream.
#[derive(Debug, Clone, Default)]
pub struct ProcessResult {
    /// Exit code, if the process exited normally.
    pub retc: Option<i32>,
    /// Terminating signal number, if any (always 0 on non-Unix).
    pub signal: i32,
    /// Merged stdout/stderr, lossily decoded.
    pub output: String,
}

impl ProcessResult {
    /// Whether the process exited zero without a signal.
    pub fn okay(&self) -> bool {
        self.retc == Some(0) && self.signal == 0
    }
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
        }
    }

    /// Build a process from a full command vector (program + args).
    pub fn from_command(command: &[String]) -> Self {
        let (program, args) = command
            .split_first()
            .expect("command vector must not be empty");
        ProcessBuilder::new(program).args(args)
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Execute the command and collect exit status, signal, and output.
    pub fn run(&self) -> Result<ProcessResult> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let out = cmd
            .output()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));

        Ok(ProcessResult {
            retc: out.status.code(),
            signal: exit_signal(&out.status),
            output,
        })
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        quote_command(&parts)
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().unwrap_or(0)
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> i32 {
    0
}

fn needs_quoting(s: &str) -> bool {
    const OKAY_CHARS: &str = "@%-+=:,./|_";
    !s.chars()
        .all(|c| c.is_ascii_alphanumeric() || OKAY_CHARS.contains(c))
        || s.is_empty()
}

/// Quote a single shell argument if it contains unsafe characters.
pub fn quote_argument(s: &str) -> String {
    if !needs_quoting(s) {
        return s.to_string();
    }
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Render a command vector as a single shell-quoted string.
///
/// This string is the canonical form stored in the file-deps database: two
/// invocations are "the same command" exactly when their quoted forms match.
pub fn quote_command(command: &[String]) -> String {
    command
        .iter()
        .map(|arg| quote_argument(arg))
        .collect::<Vec<_>>()
        .join(" ")
}
