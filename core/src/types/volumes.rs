use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::error::{PipelineError, Result};

/// Output of `fslstats <image> -V`
///
/// The tool prints the number of non-zero voxels followed by their
/// physical volume in mm³.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct VolumeStats {
    pub voxels: u64,
    pub volume: f64,
}

impl VolumeStats {
    /// Parses statistics text such as `"1234 9872.000000 "`
    ///
    /// Voxel counts written in float notation (`1234.000000`) are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::VolumeParse`] unless the text holds at least
    /// two numbers with a non-negative whole voxel count.
    pub fn parse(s: &str) -> Result<Self> {
        static REGEX: OnceLock<Regex> = OnceLock::new();
        let re = REGEX.get_or_init(|| {
            Regex::new(r"[-+]?\d*\.?\d+(?:[eE][-+]?\d+)?").expect("Failed to compile regex")
        });

        let invalid = || PipelineError::VolumeParse(s.trim().to_string());

        let mut numbers = re.find_iter(s).map(|m| m.as_str());
        let voxels: f64 = numbers
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(invalid)?;
        let volume: f64 = numbers
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(invalid)?;

        if voxels < 0.0 || voxels.fract() != 0.0 || !volume.is_finite() {
            return Err(invalid());
        }

        Ok(VolumeStats {
            voxels: voxels as u64,
            volume,
        })
    }
}

impl fmt::Display for VolumeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} voxels, {} mm³", self.voxels, self.volume)
    }
}

/// Regional tissue volumes for one MRS voxel
///
/// Only the ROI, brain and white-matter volumes are measured. CSF and
/// gray matter are their differences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TissueVolumes {
    /// Volume of the full MRS region
    pub roi: f64,
    /// Gray + white matter inside the region
    pub brain: f64,
    /// White matter inside the region
    pub white_matter: f64,
}

impl TissueVolumes {
    /// Creates a new TissueVolumes from the three measurements
    pub fn new(roi: f64, brain: f64, white_matter: f64) -> Self {
        Self {
            roi,
            brain,
            white_matter,
        }
    }

    /// CSF volume: ROI minus brain
    pub fn csf(&self) -> f64 {
        self.roi - self.brain
    }

    /// Gray-matter volume: brain minus white matter
    pub fn gray_matter(&self) -> f64 {
        self.brain - self.white_matter
    }

    /// Returns `(label, value)` pairs in log order
    pub fn lines(&self) -> [(&'static str, f64); 5] {
        [
            ("ROI volume", self.roi),
            ("Brain volume", self.brain),
            ("WM volume", self.white_matter),
            ("CSF volume", self.csf()),
            ("GM volume", self.gray_matter()),
        ]
    }
}

#[cfg(feature = "json")]
impl serde::Serialize for TissueVolumes {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("TissueVolumes", 5)?;
        state.serialize_field("roi", &self.roi)?;
        state.serialize_field("brain", &self.brain)?;
        state.serialize_field("white_matter", &self.white_matter)?;
        state.serialize_field("csf", &self.csf())?;
        state.serialize_field("gray_matter", &self.gray_matter())?;
        state.end()
    }
}
