use std::fmt;
use std::path::Path;

/// Image format families handled by the pipeline
///
/// FSL tools only read NIfTI, while the MATLAB registration routine only
/// reads NRRD with a detached header, so the pipeline converts between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatFamily {
    /// NRRD header + raw data (`.nrrd`, `.nhdr`)
    Nrrd,
    /// Single-volume NIfTI (`.nii`, `.nii.gz`)
    Nifti,
}

/// Recognised image file format, detected from the file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Nrrd,
    Nhdr,
    Nifti,
    NiftiGz,
}

impl ImageFormat {
    /// Detects the format from a path's file name
    ///
    /// Matching is case-insensitive. Returns `None` for anything else,
    /// including `.gz` files that are not NIfTI.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_lowercase();
        if name.ends_with(".nii.gz") {
            Some(ImageFormat::NiftiGz)
        } else if name.ends_with(".nii") {
            Some(ImageFormat::Nifti)
        } else if name.ends_with(".nrrd") {
            Some(ImageFormat::Nrrd)
        } else if name.ends_with(".nhdr") {
            Some(ImageFormat::Nhdr)
        } else {
            None
        }
    }

    /// Returns the format family
    pub fn family(&self) -> FormatFamily {
        match self {
            ImageFormat::Nrrd | ImageFormat::Nhdr => FormatFamily::Nrrd,
            ImageFormat::Nifti | ImageFormat::NiftiGz => FormatFamily::Nifti,
        }
    }

    /// Returns the file extension including the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Nrrd => ".nrrd",
            ImageFormat::Nhdr => ".nhdr",
            ImageFormat::Nifti => ".nii",
            ImageFormat::NiftiGz => ".nii.gz",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
