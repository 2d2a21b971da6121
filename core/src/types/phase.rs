use std::fmt;

/// Named phases of a pipeline run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Validate,
    Prepare,
    Normalize,
    PreMask,
    Canonicalize,
    Segment,
    DeriveTissues,
    FormatBridge,
    RegionMask,
    ResampleCombine,
    CanonicalizeMask,
    TissueMasks,
    Aggregate,
    Report,
}

impl Phase {
    /// Returns the phase name used in logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Validate => "validate",
            Phase::Prepare => "prepare",
            Phase::Normalize => "normalize",
            Phase::PreMask => "pre-mask",
            Phase::Canonicalize => "canonicalize",
            Phase::Segment => "segment",
            Phase::DeriveTissues => "derive-tissues",
            Phase::FormatBridge => "format-bridge",
            Phase::RegionMask => "region-mask",
            Phase::ResampleCombine => "resample-combine",
            Phase::CanonicalizeMask => "canonicalize-mask",
            Phase::TissueMasks => "tissue-masks",
            Phase::Aggregate => "aggregate",
            Phase::Report => "report",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
