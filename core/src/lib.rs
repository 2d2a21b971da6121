pub mod cli;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod tools;
pub mod types;
pub mod workspace;

pub use cli::report::TextReport;
pub use context::{LogSink, RunContext};
pub use error::{PipelineError, Result};
pub use pipeline::{Layout, Pipeline, PipelineOptions, ResolvedInputs, RunReport};
pub use tools::{CommandRunner, ProcessRunner, ToolCommand, ToolOutput, Toolset};
pub use types::*;
pub use workspace::WorkspaceLock;
