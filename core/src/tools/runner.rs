use log::debug;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use super::{ToolCommand, ToolOutput};

/// Executes tool commands
///
/// Implementations block until the program has exited and its output has
/// been fully captured. A non-zero exit status is not an error at this
/// level; only a failure to start the program is.
pub trait CommandRunner {
    /// Runs `command` with `cwd` as its working directory
    fn run(&self, command: &ToolCommand, cwd: &Path) -> io::Result<ToolOutput>;
}

/// Runs commands as child processes of the current process
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, command: &ToolCommand, cwd: &Path) -> io::Result<ToolOutput> {
        debug!("Spawning {} in {}", command.program(), cwd.display());

        let output = Command::new(command.program())
            .args(command.get_args())
            .envs(command.envs().iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
