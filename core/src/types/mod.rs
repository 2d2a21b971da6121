//! Core type definitions for the MRS volume pipeline
//!
//! This module provides the value types passed between pipeline phases:
//! - [`ImageFormat`]: Recognised image file formats and their families
//! - [`Orientation`]: Axis codes for canonical reordering, with [`ReorderOutcome`]
//! - [`VolumeStats`]: Parsed output of the statistics tool
//! - [`TissueVolumes`]: The measured and derived regional volumes
//! - [`Phase`]: Named phases of a pipeline run

mod format;
mod orientation;
mod phase;
mod volumes;

pub use format::{FormatFamily, ImageFormat};
pub use orientation::{Orientation, ReorderOutcome};
pub use phase::Phase;
pub use volumes::{TissueVolumes, VolumeStats};
