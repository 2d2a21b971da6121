pub mod report;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::pipeline::{PipelineOptions, DEFAULT_BET_THRESHOLD};

/// Command-line arguments for mri2mrs
///
/// Calculates brain and white matter volumes given an MRS label map and a
/// T1 image registered in MRS space.
#[derive(Parser, Debug)]
#[command(name = "mri2mrs")]
#[command(about = "Regional tissue volumes for an MRS voxel from a T1 image")]
#[command(version)]
pub struct Cli {
    /// T1 image registered in the space of the MRS acquisition (nrrd or nifti)
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: PathBuf,

    /// Case ID, used as the prefix of output files
    #[arg(short = 'c', long = "caseID")]
    pub case_id: String,

    /// Mask the T1 image with a brain-extraction mask before segmentation
    #[arg(short = 'm', long = "mask")]
    pub mask: bool,

    /// Region name (acg, agm, ltemp, pcg, pwm etc.)
    #[arg(short = 'r', long = "region")]
    pub region: String,

    /// Scanner .rda file defining the label map of the region
    #[arg(short = 'l', long = "labelMap", value_name = "FILE")]
    pub label_map: PathBuf,

    /// Output directory; deleted and recreated if it already exists
    #[arg(short = 'o', long = "out", value_name = "DIR")]
    pub out: PathBuf,

    /// Threshold for brain-extraction mask creation
    #[arg(short = 'b', long = "betThreshold", default_value_t = DEFAULT_BET_THRESHOLD)]
    pub bet_threshold: f64,

    /// Directory containing MRStoAnatomy.m (defaults to MRI2MRS_SCRIPT_DIR or the current directory)
    #[arg(long = "scriptDir", value_name = "DIR")]
    pub script_dir: Option<PathBuf>,

    /// Output format of the final report
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Converts the arguments into pipeline options
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions::new(
            &self.input,
            &self.case_id,
            &self.region,
            &self.label_map,
            &self.out,
        )
        .with_pre_mask(self.mask)
        .with_bet_threshold(self.bet_threshold)
    }
}

/// Output format options
#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    Text,
    /// JSON format
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_flags() {
        let cli = Cli::try_parse_from([
            "mri2mrs",
            "-i",
            "BIO_0002-registeredT1.nrrd",
            "-r",
            "pcg",
            "-c",
            "BIO_0002",
            "-m",
            "-l",
            "BIO_0002_pcg_press.rda",
            "-o",
            "output_test",
        ])
        .unwrap();

        let options = cli.pipeline_options();
        assert_eq!(options.input, PathBuf::from("BIO_0002-registeredT1.nrrd"));
        assert_eq!(options.case_id, "BIO_0002");
        assert_eq!(options.region, "pcg");
        assert!(options.pre_mask);
        assert_eq!(options.bet_threshold, 0.3);
        assert!(cli.script_dir.is_none());
    }

    #[test]
    fn test_parse_long_flags() {
        let cli = Cli::try_parse_from([
            "mri2mrs",
            "--input",
            "case1.nii.gz",
            "--caseID",
            "case1",
            "--region",
            "acg",
            "--labelMap",
            "case1.rda",
            "--out",
            "out",
            "--betThreshold",
            "0.45",
            "--scriptDir",
            "/opt/matlab",
            "--format",
            "json",
        ])
        .unwrap();

        assert!(!cli.mask);
        assert_eq!(cli.bet_threshold, 0.45);
        assert_eq!(cli.script_dir, Some(PathBuf::from("/opt/matlab")));
        assert!(matches!(cli.format, OutputFormat::Json));
    }

    #[test]
    fn test_missing_required_flag() {
        let result = Cli::try_parse_from(["mri2mrs", "-i", "case1.nii.gz", "-c", "case1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_threshold_must_be_number() {
        let result = Cli::try_parse_from([
            "mri2mrs", "-i", "a.nii", "-c", "a", "-r", "pcg", "-l", "a.rda", "-o", "out", "-b",
            "high",
        ]);
        assert!(result.is_err());
    }
}
