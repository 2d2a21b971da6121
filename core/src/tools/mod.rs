//! Typed invocation of the external neuroimaging programs
//!
//! Commands are built as argument vectors, never as shell strings. The
//! [`CommandRunner`] trait is the seam between the pipeline and the
//! operating system; [`ProcessRunner`] is the production implementation.

mod command;
mod runner;
mod toolset;

pub use command::{ToolCommand, ToolOutput};
pub use runner::{CommandRunner, ProcessRunner};
pub use toolset::Toolset;
