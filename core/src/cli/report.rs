use crate::pipeline::RunReport;
use crate::types::ReorderOutcome;
use std::fmt;

/// Text report formatter for a finished run
pub struct TextReport<'a> {
    report: &'a RunReport,
}

impl<'a> TextReport<'a> {
    /// Creates a new text report
    pub fn new(report: &'a RunReport) -> Self {
        Self { report }
    }
}

fn orientation_name(outcome: ReorderOutcome) -> String {
    match outcome.orientation() {
        Some(o) if outcome == ReorderOutcome::SucceededFallback => format!("{} (fallback)", o),
        Some(o) => o.to_string(),
        None => "failed".to_string(),
    }
}

impl<'a> fmt::Display for TextReport<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.report;
        writeln!(f, "MRS Tissue Volumes")?;
        writeln!(f, "==================")?;
        writeln!(f)?;
        writeln!(f, "Case:           {}", r.case_id)?;
        writeln!(f, "Region:         {}", r.region)?;
        writeln!(f, "Pre-masked:     {}", r.pre_masked)?;
        writeln!(f, "T1 axes:        {}", orientation_name(r.t1_orientation))?;
        writeln!(f, "Mask axes:      {}", orientation_name(r.mask_orientation))?;
        writeln!(f)?;

        writeln!(f, "Volumes (mm³)")?;
        writeln!(f, "-------------")?;
        writeln!(f, "ROI:            {:.6}", r.volumes.roi)?;
        writeln!(f, "Brain:          {:.6}", r.volumes.brain)?;
        writeln!(f, "White matter:   {:.6}", r.volumes.white_matter)?;
        writeln!(f, "CSF:            {:.6}", r.volumes.csf())?;
        writeln!(f, "Gray matter:    {:.6}", r.volumes.gray_matter())?;
        writeln!(f)?;

        writeln!(f, "Output:         {}", r.out_dir.display())?;
        writeln!(f, "Log:            {}", r.log_path.display())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TissueVolumes, VolumeStats};
    use std::path::PathBuf;

    fn report() -> RunReport {
        RunReport {
            case_id: "BIO_0002".to_string(),
            region: "pcg".to_string(),
            out_dir: PathBuf::from("/data/out"),
            log_path: PathBuf::from("/data/out/log-BIO_0002.txt"),
            pre_masked: true,
            t1_orientation: ReorderOutcome::SucceededPrimary,
            mask_orientation: ReorderOutcome::SucceededFallback,
            roi: VolumeStats {
                voxels: 8000,
                volume: 8000.0,
            },
            brain: VolumeStats {
                voxels: 7000,
                volume: 7000.0,
            },
            white_matter: VolumeStats {
                voxels: 2500,
                volume: 2500.0,
            },
            volumes: TissueVolumes::new(8000.0, 7000.0, 2500.0),
        }
    }

    #[test]
    fn test_text_report_format() {
        let output = format!("{}", TextReport::new(&report()));

        assert!(output.contains("MRS Tissue Volumes"));
        assert!(output.contains("Case:           BIO_0002"));
        assert!(output.contains("T1 axes:        LR PA IS\n"));
        assert!(output.contains("Mask axes:      RL PA IS (fallback)"));
        assert!(output.contains("CSF:            1000.000000"));
        assert!(output.contains("Gray matter:    4500.000000"));
        assert!(output.contains("Log:            /data/out/log-BIO_0002.txt"));
    }
}
