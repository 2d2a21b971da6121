use log::{debug, error, info, warn};
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::tools::{CommandRunner, ToolCommand, ToolOutput};
use crate::types::Phase;

/// Returns the run log file name for a case
pub fn log_file_name(case_id: &str) -> String {
    format!("log-{}.txt", case_id)
}

/// Append-only text log of one pipeline run
///
/// Entries are flushed as they are written so the file is complete up to
/// the failing step even when the run aborts. The file is closed on drop.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    writer: LineWriter<File>,
}

impl LogSink {
    /// Opens (or creates) the log file for appending
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: LineWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes a message to the log and the console
    pub fn message(&mut self, msg: &str) -> Result<()> {
        info!("{}", msg);
        self.write_line(msg)
    }

    /// Writes captured tool output to the log only
    pub fn block(&mut self, text: &str) -> Result<()> {
        let text = text.trim_end();
        if text.is_empty() {
            return Ok(());
        }
        debug!("{}", text);
        self.write_line(text)
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// State shared by every phase of a run
///
/// Owns the run log and knows the workspace every tool runs in. All
/// external programs go through [`RunContext::invoke`].
pub struct RunContext<'r> {
    case_id: String,
    workspace: PathBuf,
    log: LogSink,
    runner: &'r dyn CommandRunner,
}

impl<'r> RunContext<'r> {
    /// Creates a context for a prepared workspace
    pub fn new(
        case_id: impl Into<String>,
        workspace: impl Into<PathBuf>,
        log: LogSink,
        runner: &'r dyn CommandRunner,
    ) -> Self {
        Self {
            case_id: case_id.into(),
            workspace: workspace.into(),
            log,
            runner,
        }
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    /// Writes a progress message to the run log
    pub fn log(&mut self, msg: &str) -> Result<()> {
        self.log.message(msg)
    }

    /// Runs a command and aborts on failure
    ///
    /// The invocation is logged before it starts. On success stdout is
    /// logged and every declared output is checked. On a non-zero exit the
    /// stderr and a failure marker are logged and [`PipelineError::ToolFailed`]
    /// is returned.
    pub fn invoke(&mut self, phase: Phase, command: &ToolCommand) -> Result<ToolOutput> {
        let output = self.execute(phase, command)?;
        if !output.success() {
            return Err(self.failure(phase, command, output)?);
        }
        self.check_outputs(phase, command)?;
        Ok(output)
    }

    /// Runs a command without judging its exit status
    ///
    /// The invocation is logged and a launch failure is still an error.
    /// Stdout is logged on success, stderr otherwise.
    pub fn execute(&mut self, phase: Phase, command: &ToolCommand) -> Result<ToolOutput> {
        let line = command.command_line();
        self.log.message(&line)?;

        let output = self
            .runner
            .run(command, &self.workspace)
            .map_err(|source| PipelineError::ToolLaunch {
                phase,
                program: command.program().to_string(),
                source,
            })?;

        if output.success() {
            self.log.block(&output.stdout)?;
        } else {
            self.log.block(&output.stderr)?;
        }
        Ok(output)
    }

    /// Verifies every declared output of `command` exists in the workspace
    pub fn check_outputs(&self, phase: Phase, command: &ToolCommand) -> Result<()> {
        match command
            .outputs()
            .iter()
            .find(|o| !self.workspace.join(o).exists())
        {
            Some(missing) => Err(PipelineError::MissingOutput {
                phase,
                command: command.command_line(),
                output: missing.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Records a fatal error in the run log
    ///
    /// A failed write is reported on the console only, the error itself
    /// still reaches the caller.
    pub fn fatal(&mut self, err: &PipelineError) {
        error!("{}", err);
        if let Err(e) = self.log.write_line(&format!("FATAL: {}", err)) {
            warn!("Could not write to {}: {}", self.log.path().display(), e);
        }
    }

    fn failure(
        &mut self,
        phase: Phase,
        command: &ToolCommand,
        output: ToolOutput,
    ) -> Result<PipelineError> {
        let command = command.command_line();
        let err = PipelineError::ToolFailed {
            phase,
            command,
            code: output.code,
            stderr: output.stderr,
        };
        self.log.write_line(&format!("FAILED [{}]: {}", phase, err))?;
        error!("{}", err);
        Ok(err)
    }
}
