use std::fmt;

/// Axis codes handed to the axis reordering tool
///
/// The target is left-right / posterior-anterior / inferior-superior.
/// Images with the opposite native handedness reject the primary code and
/// need the mirrored left/right label instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation {
    axes: [&'static str; 3],
}

impl Orientation {
    /// First attempt: `LR PA IS`
    pub const PRIMARY: Orientation = Orientation {
        axes: ["LR", "PA", "IS"],
    };

    /// Retry with mirrored handedness: `RL PA IS`
    pub const FALLBACK: Orientation = Orientation {
        axes: ["RL", "PA", "IS"],
    };

    /// Attempt order for canonicalization
    pub const ATTEMPTS: [Orientation; 2] = [Orientation::PRIMARY, Orientation::FALLBACK];

    /// Returns the three axis codes
    pub fn axes(&self) -> [&'static str; 3] {
        self.axes
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.axes[0], self.axes[1], self.axes[2])
    }
}

/// Result of the two-attempt reorder policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[cfg_attr(feature = "json", serde(rename_all = "kebab-case"))]
pub enum ReorderOutcome {
    SucceededPrimary,
    SucceededFallback,
    FailedBoth,
}

impl ReorderOutcome {
    /// Returns whether the image ended up canonicalized
    pub fn is_success(&self) -> bool {
        !matches!(self, ReorderOutcome::FailedBoth)
    }

    /// Returns the orientation that was applied, if any
    pub fn orientation(&self) -> Option<Orientation> {
        match self {
            ReorderOutcome::SucceededPrimary => Some(Orientation::PRIMARY),
            ReorderOutcome::SucceededFallback => Some(Orientation::FALLBACK),
            ReorderOutcome::FailedBoth => None,
        }
    }
}
