use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use super::ToolCommand;
use crate::error::Result;
use crate::types::Orientation;
use crate::workspace;

/// Program names and script location for every external collaborator
///
/// Each program defaults to the name found on `PATH` and can be replaced
/// through an `MRI2MRS_*` environment variable:
///
/// | Tool                        | Default                     | Variable             |
/// |-----------------------------|-----------------------------|----------------------|
/// | format conversion           | `ConvertBetweenFileFormats` | `MRI2MRS_CONVERT`    |
/// | brain extraction            | `bet`                       | `MRI2MRS_BET`        |
/// | image arithmetic            | `fslmaths`                  | `MRI2MRS_FSLMATHS`   |
/// | tissue segmentation         | `fast`                      | `MRI2MRS_FAST`       |
/// | axis reordering             | `fslswapdim`                | `MRI2MRS_FSLSWAPDIM` |
/// | volume statistics           | `fslstats`                  | `MRI2MRS_FSLSTATS`   |
/// | MRS-to-anatomy registration | `matlab`                    | `MRI2MRS_MATLAB`     |
/// | resample and combine        | `Slicer`                    | `MRI2MRS_SLICER`     |
///
/// `MRI2MRS_SCRIPT_DIR` points at the directory holding `MRStoAnatomy.m`.
///
/// Every tool runs inside the output directory, so relative script
/// directories and program paths are anchored to the caller's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolset {
    pub convert: String,
    pub bet: String,
    pub fslmaths: String,
    pub fast: String,
    pub fslswapdim: String,
    pub fslstats: String,
    pub matlab: String,
    pub slicer: String,
    /// Directory added to the MATLAB path before calling `MRStoAnatomy`
    pub script_dir: PathBuf,
}

/// FSL output type forced on every FSL command
const FSL_OUTPUT_TYPE: &str = "NIFTI_GZ";

impl Toolset {
    /// Creates a toolset with default program names
    pub fn new(script_dir: impl Into<PathBuf>) -> Self {
        Self {
            convert: "ConvertBetweenFileFormats".to_string(),
            bet: "bet".to_string(),
            fslmaths: "fslmaths".to_string(),
            fast: "fast".to_string(),
            fslswapdim: "fslswapdim".to_string(),
            fslstats: "fslstats".to_string(),
            matlab: "matlab".to_string(),
            slicer: "Slicer".to_string(),
            script_dir: script_dir.into(),
        }
    }

    /// Creates a toolset from the process environment
    ///
    /// The script directory falls back to the current working directory.
    pub fn from_env() -> std::io::Result<Self> {
        let cwd = std::env::current_dir()?;
        Ok(Self::from_lookup(cwd, |key| std::env::var(key).ok()))
    }

    /// Creates a toolset using `lookup` to resolve overrides
    ///
    /// `cwd` is the default script directory and the base for relative
    /// overrides. Bare program names are left for `PATH` lookup.
    pub fn from_lookup<F>(cwd: PathBuf, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| anchor_program(&cwd, v))
                .unwrap_or(default)
        };

        let defaults = Self::new(cwd.clone());
        Self {
            convert: pick("MRI2MRS_CONVERT", defaults.convert),
            bet: pick("MRI2MRS_BET", defaults.bet),
            fslmaths: pick("MRI2MRS_FSLMATHS", defaults.fslmaths),
            fast: pick("MRI2MRS_FAST", defaults.fast),
            fslswapdim: pick("MRI2MRS_FSLSWAPDIM", defaults.fslswapdim),
            fslstats: pick("MRI2MRS_FSLSTATS", defaults.fslstats),
            matlab: pick("MRI2MRS_MATLAB", defaults.matlab),
            slicer: pick("MRI2MRS_SLICER", defaults.slicer),
            script_dir: lookup("MRI2MRS_SCRIPT_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(|v| cwd.join(v.trim()))
                .unwrap_or(defaults.script_dir),
        }
    }

    /// Replaces the MATLAB script directory
    ///
    /// A relative `dir` is resolved against the current working directory.
    pub fn with_script_dir(mut self, dir: impl AsRef<Path>) -> Result<Self> {
        self.script_dir = workspace::absolute(dir.as_ref())?;
        Ok(self)
    }

    /// `ConvertBetweenFileFormats <src> <dst>`
    pub fn convert(&self, src: &Path, dst: &Path) -> ToolCommand {
        ToolCommand::new(&self.convert)
            .arg(src)
            .arg(dst)
            .output(dst)
    }

    /// `bet <input> <out_base> -m -n -f <threshold>`
    ///
    /// With `-m -n` bet writes only the binary mask, `<out_base>_mask.nii.gz`.
    pub fn bet(&self, input: &Path, out_base: &Path, threshold: f64) -> ToolCommand {
        self.fsl(&self.bet)
            .arg(input)
            .arg(out_base)
            .args(["-m", "-n", "-f"])
            .arg(threshold.to_string())
            .output(suffixed(out_base, "_mask.nii.gz"))
    }

    /// `fslmaths <input> <op> <operand> <output>`
    pub fn maths(
        &self,
        input: &Path,
        op: &str,
        operand: impl AsRef<OsStr>,
        output: &Path,
    ) -> ToolCommand {
        self.fsl(&self.fslmaths)
            .arg(input)
            .arg(op)
            .arg(operand)
            .arg(output)
            .output(output)
    }

    /// `fast -o <out_base> <input>`, producing `<out_base>_seg.nii.gz`
    pub fn fast(&self, out_base: &Path, input: &Path) -> ToolCommand {
        self.fsl(&self.fast)
            .arg("-o")
            .arg(out_base)
            .arg(input)
            .output(suffixed(out_base, "_seg.nii.gz"))
    }

    /// `fslswapdim <image> <x> <y> <z> <image>`, rewriting the image in place
    pub fn swapdim(&self, image: &Path, orientation: Orientation) -> ToolCommand {
        self.fsl(&self.fslswapdim)
            .arg(image)
            .args(orientation.axes())
            .arg(image)
            .output(image)
    }

    /// `fslstats <image> -V`
    pub fn stats_volume(&self, image: &Path) -> ToolCommand {
        self.fsl(&self.fslstats).arg(image).arg("-V")
    }

    /// Runs `MRStoAnatomy` in a non-interactive MATLAB session
    ///
    /// The routine writes `<prefix>_zr.nhdr` (zero-filled full volume) and
    /// `<prefix>_jm.nhdr` (region mask in native MRS space). Errors inside
    /// MATLAB are reported on stderr and turned into exit status 1.
    pub fn mrs_to_anatomy(
        &self,
        scratch: &Path,
        anatomy: &Path,
        label_map: &Path,
        prefix: &str,
    ) -> ToolCommand {
        let script = format!(
            "try, addpath({}), MRStoAnatomy({}, {}, {}, {}), catch err, \
             fprintf(2, '%s\\n', getReport(err)), exit(1), end, exit(0)",
            matlab_str(&self.script_dir),
            matlab_str(scratch),
            matlab_str(anatomy),
            matlab_str(label_map),
            matlab_str(Path::new(prefix)),
        );

        ToolCommand::new(&self.matlab)
            .args(["-singleCompThread", "-nojvm", "-nosplash", "-r"])
            .arg(script)
            .output(format!("{}_zr.nhdr", prefix))
            .output(format!("{}_jm.nhdr", prefix))
    }

    /// `Slicer --launch AddScalarVolumes <a> <b> --order 0 <output>`
    ///
    /// The second volume is resampled onto the first with nearest-neighbour
    /// interpolation before the two are summed.
    pub fn add_scalar_volumes(&self, reference: &Path, moving: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(&self.slicer)
            .args(["--launch", "AddScalarVolumes"])
            .arg(reference)
            .arg(moving)
            .args(["--order", "0"])
            .arg(output)
            .output(output)
    }

    fn fsl(&self, program: &str) -> ToolCommand {
        ToolCommand::new(program).env("FSLOUTPUTTYPE", FSL_OUTPUT_TYPE)
    }
}

/// Joins a program override given as a relative path onto `cwd`
fn anchor_program(cwd: &Path, program: String) -> String {
    let path = Path::new(&program);
    if path.is_relative() && path.components().count() > 1 {
        cwd.join(path).to_string_lossy().into_owned()
    } else {
        program
    }
}

fn suffixed(base: &Path, suffix: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

/// Quotes a path as a MATLAB character vector literal
fn matlab_str(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn toolset() -> Toolset {
        Toolset::new("/opt/mri2mrs")
    }

    #[test]
    fn test_from_lookup_overrides() {
        let env: HashMap<&str, &str> = [
            ("MRI2MRS_FAST", "/usr/local/fsl/bin/fast"),
            ("MRI2MRS_SLICER", "  "),
            ("MRI2MRS_SCRIPT_DIR", "/srv/matlab"),
        ]
        .into_iter()
        .collect();

        let tools = Toolset::from_lookup(PathBuf::from("/cwd"), |k| {
            env.get(k).map(|v| v.to_string())
        });

        assert_eq!(tools.fast, "/usr/local/fsl/bin/fast");
        assert_eq!(tools.slicer, "Slicer");
        assert_eq!(tools.bet, "bet");
        assert_eq!(tools.script_dir, PathBuf::from("/srv/matlab"));
    }

    #[test]
    fn test_from_lookup_anchors_relative_paths() {
        let env: HashMap<&str, &str> = [
            ("MRI2MRS_MATLAB", "bin/matlab"),
            ("MRI2MRS_BET", "bet5"),
            ("MRI2MRS_SCRIPT_DIR", "matlab_scripts"),
        ]
        .into_iter()
        .collect();

        let tools = Toolset::from_lookup(PathBuf::from("/home/user/study"), |k| {
            env.get(k).map(|v| v.to_string())
        });

        assert_eq!(tools.matlab, "/home/user/study/bin/matlab");
        assert_eq!(tools.bet, "bet5");
        assert_eq!(
            tools.script_dir,
            PathBuf::from("/home/user/study/matlab_scripts")
        );
    }

    #[test]
    fn test_relative_script_dir_reaches_matlab_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let tools = toolset().with_script_dir("matlab_scripts").unwrap();
        assert_eq!(tools.script_dir, cwd.join("matlab_scripts"));

        let cmd = tools.mrs_to_anatomy(
            Path::new("tmp-sb.nhdr"),
            Path::new("c1-t1w.nhdr"),
            Path::new("/data/c1.rda"),
            "pcg_mask",
        );
        let expected = format!("addpath('{}')", cwd.join("matlab_scripts").display());
        assert!(cmd.args_lossy()[4].contains(&expected));
    }

    #[test]
    fn test_from_lookup_defaults_script_dir() {
        let tools = Toolset::from_lookup(PathBuf::from("/cwd"), |_| None);
        assert_eq!(tools, Toolset::new("/cwd"));
    }

    #[test]
    fn test_bet_declares_mask() {
        let cmd = toolset().bet(Path::new("c1-t1w.nii.gz"), Path::new("c1-t1w"), 0.3);
        assert_eq!(cmd.args_lossy(), ["c1-t1w.nii.gz", "c1-t1w", "-m", "-n", "-f", "0.3"]);
        assert_eq!(cmd.outputs(), &[PathBuf::from("c1-t1w_mask.nii.gz")]);
        assert_eq!(cmd.envs()[0].1, "NIFTI_GZ");
    }

    #[test]
    fn test_fast_declares_segmentation() {
        let cmd = toolset().fast(Path::new("fast_out"), Path::new("c1-t1w.nii.gz"));
        assert_eq!(cmd.command_line(), "fast -o fast_out c1-t1w.nii.gz");
        assert_eq!(cmd.outputs(), &[PathBuf::from("fast_out_seg.nii.gz")]);
    }

    #[test]
    fn test_swapdim_in_place() {
        let image = Path::new("pcg_mask.nii.gz");
        let cmd = toolset().swapdim(image, Orientation::FALLBACK);
        assert_eq!(
            cmd.command_line(),
            "fslswapdim pcg_mask.nii.gz RL PA IS pcg_mask.nii.gz"
        );
        assert!(cmd.produces(image));
    }

    #[test]
    fn test_stats_has_no_outputs() {
        let cmd = toolset().stats_volume(Path::new("pcg_mask.nii.gz"));
        assert_eq!(cmd.args_lossy(), ["pcg_mask.nii.gz", "-V"]);
        assert!(cmd.outputs().is_empty());
    }

    #[test]
    fn test_mrs_to_anatomy_script() {
        let cmd = toolset().mrs_to_anatomy(
            Path::new("tmp-sb.nhdr"),
            Path::new("c1-t1w.nhdr"),
            Path::new("/data/O'Brien/c1_pcg_press.rda"),
            "pcg_mask",
        );

        let args = cmd.args_lossy();
        assert_eq!(&args[..4], ["-singleCompThread", "-nojvm", "-nosplash", "-r"]);
        assert_eq!(
            args[4],
            "try, addpath('/opt/mri2mrs'), MRStoAnatomy('tmp-sb.nhdr', 'c1-t1w.nhdr', \
             '/data/O''Brien/c1_pcg_press.rda', 'pcg_mask'), catch err, \
             fprintf(2, '%s\\n', getReport(err)), exit(1), end, exit(0)"
        );
        assert_eq!(
            cmd.outputs(),
            &[PathBuf::from("pcg_mask_zr.nhdr"), PathBuf::from("pcg_mask_jm.nhdr")]
        );
    }

    #[test]
    fn test_add_scalar_volumes() {
        let cmd = toolset().add_scalar_volumes(
            Path::new("pcg_mask_zr.nhdr"),
            Path::new("pcg_mask_jm.nhdr"),
            Path::new("pcg_mask.nhdr"),
        );
        assert_eq!(
            cmd.command_line(),
            "Slicer --launch AddScalarVolumes pcg_mask_zr.nhdr pcg_mask_jm.nhdr --order 0 pcg_mask.nhdr"
        );
        assert!(cmd.envs().is_empty());
    }
}
