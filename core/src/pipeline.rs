//! The MRS tissue-volume pipeline
//!
//! A run is a fixed sequence of [`Phase`]s. Each phase hands files to the
//! next through the output directory, and every external program call goes
//! through [`RunContext::invoke`], so any failure aborts the run with the
//! error written to the run log.

use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use crate::context::{log_file_name, LogSink, RunContext};
use crate::error::{PipelineError, Result};
use crate::tools::{CommandRunner, Toolset};
use crate::types::{
    FormatFamily, ImageFormat, Orientation, Phase, ReorderOutcome, TissueVolumes, VolumeStats,
};
use crate::workspace::{self, WorkspaceLock};

/// Default fractional intensity threshold for brain extraction
pub const DEFAULT_BET_THRESHOLD: f64 = 0.3;

/// File name extension required for the scanner label map
pub const LABEL_MAP_EXTENSION: &str = ".rda";

/// Inputs of a pipeline run
///
/// # Example
///
/// ```
/// use mri2mrs_core::PipelineOptions;
///
/// let options = PipelineOptions::new("case1.nii.gz", "case1", "pcg", "case1_pcg.rda", "out")
///     .with_pre_mask(true)
///     .with_bet_threshold(0.4);
///
/// assert!(options.pre_mask);
/// assert_eq!(options.bet_threshold, 0.4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// T1 image registered in MRS space (NRRD or NIfTI)
    pub input: PathBuf,

    /// Case identifier, used as a file name prefix
    pub case_id: String,

    /// MRS region name (acg, agm, ltemp, pcg, pwm, ...)
    pub region: String,

    /// Scanner label map defining the region
    pub label_map: PathBuf,

    /// Output directory, deleted and recreated by the run
    pub out_dir: PathBuf,

    /// Brain-extract and mask the T1 image before segmentation
    pub pre_mask: bool,

    /// Threshold passed to brain extraction
    pub bet_threshold: f64,
}

impl PipelineOptions {
    /// Creates options with pre-masking disabled and the default threshold
    pub fn new(
        input: impl Into<PathBuf>,
        case_id: impl Into<String>,
        region: impl Into<String>,
        label_map: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            case_id: case_id.into(),
            region: region.into(),
            label_map: label_map.into(),
            out_dir: out_dir.into(),
            pre_mask: false,
            bet_threshold: DEFAULT_BET_THRESHOLD,
        }
    }

    pub fn with_pre_mask(mut self, pre_mask: bool) -> Self {
        self.pre_mask = pre_mask;
        self
    }

    pub fn with_bet_threshold(mut self, threshold: f64) -> Self {
        self.bet_threshold = threshold;
        self
    }

    /// Validates the options and resolves every path to an absolute one
    ///
    /// # Errors
    ///
    /// Fails fast on:
    /// - a missing input image or one that is not NRRD/NIfTI
    /// - a missing label map or one without the `.rda` extension
    /// - a case ID or region that is not a plain file name component
    /// - a threshold outside `[0, 1]`
    /// - an output directory that contains either input file or the MATLAB
    ///   `script_dir`
    pub fn resolve(&self, script_dir: &Path) -> Result<ResolvedInputs> {
        validate_name("caseID", &self.case_id)?;
        validate_name("region", &self.region)?;

        if !self.bet_threshold.is_finite() || !(0.0..=1.0).contains(&self.bet_threshold) {
            return Err(PipelineError::InvalidOption {
                option: "betThreshold",
                reason: format!("{} is not between 0 and 1", self.bet_threshold),
            });
        }

        let input = existing_file(&self.input)?;
        let format = ImageFormat::from_path(&self.input).ok_or_else(|| PipelineError::InvalidInput {
            path: self.input.clone(),
            reason: "invalid T1 image format, expected .nrrd, .nhdr, .nii or .nii.gz".to_string(),
        })?;

        let label_map = existing_file(&self.label_map)?;
        let is_rda = self
            .label_map
            .to_string_lossy()
            .to_lowercase()
            .ends_with(LABEL_MAP_EXTENSION);
        if !is_rda {
            return Err(PipelineError::InvalidInput {
                path: self.label_map.clone(),
                reason: format!("invalid label map format, expected {}", LABEL_MAP_EXTENSION),
            });
        }

        let out_dir = if self.out_dir.exists() {
            fs::canonicalize(&self.out_dir)?
        } else {
            workspace::absolute(&self.out_dir)?
        };
        let script_dir = if script_dir.exists() {
            fs::canonicalize(script_dir)?
        } else {
            workspace::absolute(script_dir)?
        };
        for path in [&input, &label_map, &script_dir] {
            if path.starts_with(&out_dir) {
                return Err(PipelineError::InvalidInput {
                    path: path.clone(),
                    reason: format!(
                        "lies inside output directory {} which is deleted by the run",
                        out_dir.display()
                    ),
                });
            }
        }

        Ok(ResolvedInputs {
            input,
            format,
            label_map,
            out_dir,
        })
    }
}

/// Validated, absolute inputs of a run
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInputs {
    pub input: PathBuf,
    pub format: ImageFormat,
    pub label_map: PathBuf,
    pub out_dir: PathBuf,
}

fn existing_file(path: &Path) -> Result<PathBuf> {
    if !path.is_file() {
        return Err(PipelineError::InvalidInput {
            path: path.to_path_buf(),
            reason: "file does not exist".to_string(),
        });
    }
    Ok(fs::canonicalize(path)?)
}

fn validate_name(option: &'static str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && !value.starts_with('-')
        && value != "."
        && value != ".."
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(PipelineError::InvalidOption {
            option,
            reason: format!(
                "'{}' must be non-empty, not start with '-' and use only letters, digits, '-', '_' or '.'",
                value
            ),
        })
    }
}

/// Names of the files a run creates, relative to the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub log: PathBuf,
    /// T1 image in compressed NIfTI
    pub converted: PathBuf,
    /// Output base handed to brain extraction
    pub bet_base: PathBuf,
    pub bet_mask: PathBuf,
    /// T1 image multiplied by the brain mask
    pub masked: PathBuf,
    pub fast_base: PathBuf,
    /// Three-class label volume
    pub segmentation: PathBuf,
    pub gray: PathBuf,
    pub csf: PathBuf,
    /// Processed T1 image in NRRD for the MATLAB routine
    pub bridge: PathBuf,
    /// Scratch file name handed to the MATLAB routine
    pub scratch: PathBuf,
    pub mask_prefix: String,
    pub mask_zero_filled: PathBuf,
    pub mask_registered: PathBuf,
    pub mask_combined: PathBuf,
    /// Final MRS mask in full image space
    pub mask: PathBuf,
    pub brain_mask: PathBuf,
    pub wm_mask: PathBuf,
}

impl Layout {
    pub fn new(case_id: &str, region: &str) -> Self {
        let mask_prefix = format!("{}_mask", region);
        Self {
            log: PathBuf::from(log_file_name(case_id)),
            converted: PathBuf::from(format!("{}-t1w.nii.gz", case_id)),
            bet_base: PathBuf::from(format!("{}-t1w", case_id)),
            bet_mask: PathBuf::from(format!("{}-t1w_mask.nii.gz", case_id)),
            masked: PathBuf::from(format!("{}-t1w-bet.nii.gz", case_id)),
            fast_base: PathBuf::from("fast_out"),
            segmentation: PathBuf::from("fast_out_seg.nii.gz"),
            gray: PathBuf::from("fast_out_seg2.nii.gz"),
            csf: PathBuf::from("fast_out_seg3.nii.gz"),
            bridge: PathBuf::from(format!("{}-t1w.nhdr", case_id)),
            scratch: PathBuf::from("tmp-sb.nhdr"),
            mask_zero_filled: PathBuf::from(format!("{}_zr.nhdr", mask_prefix)),
            mask_registered: PathBuf::from(format!("{}_jm.nhdr", mask_prefix)),
            mask_combined: PathBuf::from(format!("{}.nhdr", mask_prefix)),
            mask: PathBuf::from(format!("{}.nii.gz", mask_prefix)),
            brain_mask: PathBuf::from(format!("{}_MRS_mask_brain.nii.gz", region)),
            wm_mask: PathBuf::from(format!("{}_MRS_mask_wm.nii.gz", region)),
            mask_prefix,
        }
    }

    /// The image fed to segmentation
    pub fn processed(&self, pre_mask: bool) -> &Path {
        if pre_mask {
            &self.masked
        } else {
            &self.converted
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct RunReport {
    pub case_id: String,
    pub region: String,
    pub out_dir: PathBuf,
    pub log_path: PathBuf,
    pub pre_masked: bool,
    pub t1_orientation: ReorderOutcome,
    pub mask_orientation: ReorderOutcome,
    pub roi: VolumeStats,
    pub brain: VolumeStats,
    pub white_matter: VolumeStats,
    pub volumes: TissueVolumes,
}

/// Runs the pipeline with a given toolset and command runner
pub struct Pipeline<'a> {
    toolset: &'a Toolset,
    runner: &'a dyn CommandRunner,
}

impl<'a> Pipeline<'a> {
    pub fn new(toolset: &'a Toolset, runner: &'a dyn CommandRunner) -> Self {
        Self { toolset, runner }
    }

    /// Executes a complete run
    ///
    /// The output directory is deleted and recreated. Once the run log
    /// exists, any error is written to it before being returned.
    pub fn run(&self, options: &PipelineOptions) -> Result<RunReport> {
        info!("Phase {}", Phase::Validate);
        let inputs = options.resolve(&self.toolset.script_dir)?;

        info!("Phase {}", Phase::Prepare);
        let _lock = WorkspaceLock::acquire(&inputs.out_dir)?;
        workspace::recreate(&inputs.out_dir)?;

        let layout = Layout::new(&options.case_id, &options.region);
        let log = LogSink::open(inputs.out_dir.join(&layout.log))?;
        let mut ctx = RunContext::new(&options.case_id, &inputs.out_dir, log, self.runner);

        match self.execute(&mut ctx, options, &inputs, &layout) {
            Ok(report) => Ok(report),
            Err(e) => {
                ctx.fatal(&e);
                Err(e)
            }
        }
    }

    fn execute(
        &self,
        ctx: &mut RunContext<'_>,
        options: &PipelineOptions,
        inputs: &ResolvedInputs,
        layout: &Layout,
    ) -> Result<RunReport> {
        let tools = self.toolset;

        // FSL only reads NIfTI
        info!("Phase {}", Phase::Normalize);
        match inputs.format {
            ImageFormat::NiftiGz => {
                ctx.log(&format!(
                    "Copying {} to {}",
                    inputs.input.display(),
                    layout.converted.display()
                ))?;
                fs::copy(&inputs.input, ctx.workspace().join(&layout.converted))?;
            }
            other => {
                let source = match other.family() {
                    FormatFamily::Nrrd => "NRRD",
                    FormatFamily::Nifti => "uncompressed NIfTI",
                };
                ctx.log(&format!(
                    "Converting {} image {} to compressed NIfTI ...",
                    source,
                    inputs.input.display()
                ))?;
                ctx.invoke(
                    Phase::Normalize,
                    &tools.convert(&inputs.input, &layout.converted),
                )?;
            }
        }

        if options.pre_mask {
            info!("Phase {}", Phase::PreMask);
            ctx.log("Creating mask and multiplying the input image by mask ...")?;
            ctx.invoke(
                Phase::PreMask,
                &tools.bet(&layout.converted, &layout.bet_base, options.bet_threshold),
            )?;
            ctx.invoke(
                Phase::PreMask,
                &tools.maths(&layout.converted, "-mul", &layout.bet_mask, &layout.masked),
            )?;
        }
        let processed = layout.processed(options.pre_mask);

        let t1_orientation = canonicalize(ctx, tools, Phase::Canonicalize, processed)?;

        info!("Phase {}", Phase::Segment);
        ctx.log("Segmenting T1 image to white/gray/CSF ...")?;
        ctx.invoke(Phase::Segment, &tools.fast(&layout.fast_base, processed))?;

        info!("Phase {}", Phase::DeriveTissues);
        ctx.log("Creating white, gray, csf separate images ...")?;
        let seg = &layout.segmentation;
        for cmd in [
            tools.maths(seg, "-uthr", "1", &layout.gray),
            tools.maths(&layout.gray, "-add", "1", &layout.gray),
            tools.maths(&layout.gray, "-uthr", "1", &layout.gray),
            tools.maths(seg, "-thr", "3", &layout.csf),
            tools.maths(&layout.csf, "-div", "3", &layout.csf),
        ] {
            ctx.invoke(Phase::DeriveTissues, &cmd)?;
        }

        // The MATLAB routine only reads NRRD with a detached header
        info!("Phase {}", Phase::FormatBridge);
        ctx.invoke(Phase::FormatBridge, &tools.convert(processed, &layout.bridge))?;

        info!("Phase {}", Phase::RegionMask);
        ctx.log("Defining MRS on T1 image using MATLAB ...")?;
        let region_mask = tools.mrs_to_anatomy(
            &layout.scratch,
            &layout.bridge,
            &inputs.label_map,
            &layout.mask_prefix,
        );
        if let Err(e) = ctx.invoke(Phase::RegionMask, &region_mask) {
            ctx.log(&format!(
                "MRS mask creation failed for {}, exiting ...",
                inputs.input.display()
            ))?;
            return Err(e);
        }

        info!("Phase {}", Phase::ResampleCombine);
        ctx.log(
            "Combining the mask with the zero-filled volume to match the T1 image dimensions ...",
        )?;
        ctx.invoke(
            Phase::ResampleCombine,
            &tools.add_scalar_volumes(
                &layout.mask_zero_filled,
                &layout.mask_registered,
                &layout.mask_combined,
            ),
        )?;
        ctx.log("Converting MRS mask to NIfTI ...")?;
        ctx.invoke(
            Phase::ResampleCombine,
            &tools.convert(&layout.mask_combined, &layout.mask),
        )?;

        let mask_orientation = canonicalize(ctx, tools, Phase::CanonicalizeMask, &layout.mask)?;

        info!("Phase {}", Phase::TissueMasks);
        ctx.log("Creating MRS masks ...")?;
        ctx.invoke(
            Phase::TissueMasks,
            &tools.maths(&layout.gray, "-mul", &layout.mask, &layout.brain_mask),
        )?;
        ctx.invoke(
            Phase::TissueMasks,
            &tools.maths(&layout.csf, "-mul", &layout.mask, &layout.wm_mask),
        )?;

        info!("Phase {}", Phase::Aggregate);
        ctx.log("Calculating brain volume ...")?;
        let brain = measure(ctx, tools, &layout.brain_mask)?;
        ctx.log("Calculating ROI volume ...")?;
        let roi = measure(ctx, tools, &layout.mask)?;
        ctx.log("Calculating white matter volume ...")?;
        let white_matter = measure(ctx, tools, &layout.wm_mask)?;

        let volumes = TissueVolumes::new(roi.volume, brain.volume, white_matter.volume);

        info!("Phase {}", Phase::Report);
        for (label, value) in volumes.lines() {
            ctx.log(&format!("{}:{:.6}", label, value))?;
        }

        Ok(RunReport {
            case_id: ctx.case_id().to_string(),
            region: options.region.clone(),
            out_dir: ctx.workspace().to_path_buf(),
            log_path: ctx.log_path().to_path_buf(),
            pre_masked: options.pre_mask,
            t1_orientation,
            mask_orientation,
            roi,
            brain,
            white_matter,
            volumes,
        })
    }
}

/// Reorders `image` in place to LR/PA/IS
///
/// Tries [`Orientation::PRIMARY`] and, if the tool rejects it, retries once
/// with [`Orientation::FALLBACK`]. Both attempts failing is fatal.
pub fn canonicalize(
    ctx: &mut RunContext<'_>,
    tools: &Toolset,
    phase: Phase,
    image: &Path,
) -> Result<ReorderOutcome> {
    info!("Phase {}", phase);
    let outcome = reorder_axes(ctx, tools, phase, image)?;
    match outcome.orientation() {
        Some(orientation) => {
            ctx.log(&format!(
                "Reordered axes of {} to {}",
                image.display(),
                orientation
            ))?;
            Ok(outcome)
        }
        None => Err(PipelineError::Orientation {
            phase,
            image: image.to_path_buf(),
            primary: Orientation::PRIMARY.to_string(),
            fallback: Orientation::FALLBACK.to_string(),
        }),
    }
}

fn reorder_axes(
    ctx: &mut RunContext<'_>,
    tools: &Toolset,
    phase: Phase,
    image: &Path,
) -> Result<ReorderOutcome> {
    for (attempt, orientation) in Orientation::ATTEMPTS.into_iter().enumerate() {
        let cmd = tools.swapdim(image, orientation);
        let output = ctx.execute(phase, &cmd)?;
        if output.success() {
            ctx.check_outputs(phase, &cmd)?;
            return Ok(if attempt == 0 {
                ReorderOutcome::SucceededPrimary
            } else {
                ReorderOutcome::SucceededFallback
            });
        }
        ctx.log(&format!(
            "Orientation {} rejected for {}",
            orientation,
            image.display()
        ))?;
    }
    Ok(ReorderOutcome::FailedBoth)
}

fn measure(ctx: &mut RunContext<'_>, tools: &Toolset, image: &Path) -> Result<VolumeStats> {
    let output = ctx.invoke(Phase::Aggregate, &tools.stats_volume(image))?;
    VolumeStats::parse(&output.stdout)
}
