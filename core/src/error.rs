use std::path::PathBuf;
use thiserror::Error;

use crate::types::Phase;

/// Result type for mri2mrs operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error types for mri2mrs operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input file rejected before any work was done
    #[error("Invalid input {}: {reason}", .path.display())]
    InvalidInput { path: PathBuf, reason: String },

    /// Invalid option value
    #[error("Invalid option --{option}: {reason}")]
    InvalidOption { option: &'static str, reason: String },

    /// External program could not be started
    #[error("{phase}: failed to launch `{program}`: {source}")]
    ToolLaunch {
        phase: Phase,
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// External program exited with a nonzero status
    #[error("{phase}: `{command}` exited with {}", exit_description(.code))]
    ToolFailed {
        phase: Phase,
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// External program exited cleanly but did not write a declared output
    #[error("{phase}: `{command}` did not produce {}", .output.display())]
    MissingOutput {
        phase: Phase,
        command: String,
        output: PathBuf,
    },

    /// Axis reordering rejected both orientation codes
    #[error("{phase}: could not reorder axes of {} with `{primary}` or `{fallback}`", .image.display())]
    Orientation {
        phase: Phase,
        image: PathBuf,
        primary: String,
        fallback: String,
    },

    /// Statistics output could not be parsed
    #[error("Could not parse volume statistics from '{0}'")]
    VolumeParse(String),

    /// Another run owns the output directory
    #[error("Output directory {} is in use by another run (lock {})", .dir.display(), .lock.display())]
    WorkspaceBusy { dir: PathBuf, lock: PathBuf },

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PipelineError {
    /// Process exit code for this error
    ///
    /// Input problems map to `2`, every runtime failure to `1`.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::InvalidInput { .. } | PipelineError::InvalidOption { .. } => 2,
            _ => 1,
        }
    }

    /// Returns the phase the error was raised in, if any
    pub fn phase(&self) -> Option<Phase> {
        match self {
            PipelineError::ToolLaunch { phase, .. }
            | PipelineError::ToolFailed { phase, .. }
            | PipelineError::MissingOutput { phase, .. }
            | PipelineError::Orientation { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "termination by signal".to_string(),
    }
}
