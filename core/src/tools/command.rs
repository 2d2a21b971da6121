use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

/// A single external program invocation
///
/// Besides the program and its arguments, a command declares the files it
/// is expected to leave behind. A zero exit status without those files is
/// treated as a failure by the run context.
///
/// # Example
///
/// ```
/// use mri2mrs_core::ToolCommand;
///
/// let cmd = ToolCommand::new("fslmaths")
///     .arg("fast_out_seg.nii.gz")
///     .args(["-uthr", "1"])
///     .arg("fast_out_seg2.nii.gz")
///     .output("fast_out_seg2.nii.gz");
///
/// assert_eq!(
///     cmd.command_line(),
///     "fslmaths fast_out_seg.nii.gz -uthr 1 fast_out_seg2.nii.gz"
/// );
/// assert_eq!(cmd.outputs().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
    envs: Vec<(String, String)>,
    outputs: Vec<PathBuf>,
}

impl ToolCommand {
    /// Creates a command for the given program name or path
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Appends one argument
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Appends several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Sets an environment variable for the child process
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Declares a file the command must produce, relative to the workspace
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.outputs.push(path.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn envs(&self) -> &[(String, String)] {
        &self.envs
    }

    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    /// Returns the arguments as lossy UTF-8 strings
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Renders the invocation for the run log
    ///
    /// Arguments containing whitespace or quotes are single-quoted so the
    /// line can be pasted into a shell.
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(quote(&self.program));
        for arg in &self.args {
            parts.push(quote(&arg.to_string_lossy()));
        }
        parts.join(" ")
    }

    /// Returns whether `path` is one of the declared outputs
    pub fn produces(&self, path: &Path) -> bool {
        self.outputs.iter().any(|o| o == path)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

fn quote(s: &str) -> String {
    let needs_quotes = s.is_empty()
        || s
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '$' | '\\' | ';' | '&' | '|'));
    if needs_quotes {
        format!("'{}'", s.replace('\'', r"'\''"))
    } else {
        s.to_string()
    }
}

/// Captured result of a finished external program
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Creates a successful output with the given stdout
    pub fn success_with(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Creates a failed output with the given exit code and stderr
    pub fn failure_with(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns whether the program exited with status zero
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}
