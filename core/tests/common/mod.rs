#![allow(dead_code)]

use mri2mrs_core::{CommandRunner, ToolCommand, ToolOutput};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

type Rule = Box<dyn Fn(&str, &[String]) -> Option<ToolOutput>>;

/// Records every invocation and plays the external tools
///
/// Successful commands get their declared outputs created as empty files.
/// `fslstats` answers from a table keyed by image name.
pub struct FakeRunner {
    calls: RefCell<Vec<(String, Vec<String>)>>,
    stats: HashMap<String, String>,
    rules: Vec<Rule>,
    omitted: Vec<PathBuf>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            stats: HashMap::new(),
            rules: Vec::new(),
            omitted: Vec::new(),
        }
    }

    /// Canned `fslstats -V` stdout for an image
    pub fn with_stats(mut self, image: &str, stdout: &str) -> Self {
        self.stats.insert(image.to_string(), stdout.to_string());
        self
    }

    /// Fails every call for which `matches` returns true
    pub fn fail_when<F>(mut self, code: i32, stderr: &str, matches: F) -> Self
    where
        F: Fn(&str, &[String]) -> bool + 'static,
    {
        let stderr = stderr.to_string();
        self.rules.push(Box::new(move |program, args| {
            matches(program, args).then(|| ToolOutput::failure_with(code, stderr.clone()))
        }));
        self
    }

    /// Exits 0 without writing this declared output
    pub fn omit_output(mut self, path: &str) -> Self {
        self.omitted.push(PathBuf::from(path));
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.borrow().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn count(&self, program: &str) -> usize {
        self.calls.borrow().iter().filter(|(p, _)| p == program).count()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, command: &ToolCommand, cwd: &Path) -> io::Result<ToolOutput> {
        let program = command.program().to_string();
        let args = command.args_lossy();
        self.calls.borrow_mut().push((program.clone(), args.clone()));

        if let Some(output) = self.rules.iter().find_map(|rule| rule(&program, &args)) {
            return Ok(output);
        }

        for output in command.outputs() {
            if !self.omitted.contains(output) {
                File::create(cwd.join(output))?;
            }
        }

        let stdout = if program == "fslstats" {
            self.stats
                .get(&args[0])
                .cloned()
                .unwrap_or_else(|| "0 0.000000 ".to_string())
        } else {
            String::new()
        };
        Ok(ToolOutput::success_with(stdout))
    }
}

/// Input files for a run, inside a temporary directory
pub struct Case {
    pub dir: TempDir,
    pub input: PathBuf,
    pub label_map: PathBuf,
    pub out_dir: PathBuf,
}

impl Case {
    pub fn new(image_name: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join(image_name);
        let label_map = dir.path().join("case1_pcg_press.rda");
        fs::write(&input, b"t1 image").unwrap();
        fs::write(&label_map, b"label map").unwrap();
        let out_dir = dir.path().join("out");
        Self {
            dir,
            input,
            label_map,
            out_dir,
        }
    }

    pub fn log(&self) -> String {
        fs::read_to_string(self.out_dir.join("log-case1.txt")).unwrap()
    }

    pub fn files(&self) -> BTreeSet<String> {
        fs::read_dir(&self.out_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }
}

/// Stats for the standard scenario: ROI 8000, brain 7400.5, WM 3100.25
pub fn standard_runner() -> FakeRunner {
    FakeRunner::new()
        .with_stats("pcg_mask.nii.gz", "8000 8000.000000 ")
        .with_stats("pcg_MRS_mask_brain.nii.gz", "7400 7400.500000 ")
        .with_stats("pcg_MRS_mask_wm.nii.gz", "3100 3100.250000 ")
}

/// Extracts `<label>:<value>` from the run log
pub fn logged_volume(log: &str, label: &str) -> Option<f64> {
    let prefix = format!("{}:", label);
    log.lines()
        .find_map(|line| line.strip_prefix(&prefix))
        .and_then(|v| v.trim().parse().ok())
}
