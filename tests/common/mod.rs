//! Shared test infrastructure for integration tests.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A throwaway BIDS dataset under a temporary directory.
pub struct TestDataset {
    // Held for its Drop; the dataset lives under it.
    _temp_dir: TempDir,
    pub root: PathBuf,
}

/// Result from running intend4 against a dataset.
#[derive(Debug)]
pub struct TestResult {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl TestResult {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<Output> for TestResult {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

impl TestDataset {
    /// An empty dataset containing only `dataset_description.json`.
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().join("data");
        fs::create_dir_all(&root)?;
        fs::write(
            root.join("dataset_description.json"),
            r#"{"Name": "intend4 test", "BIDSVersion": "1.6.0"}"#,
        )?;
        Ok(Self {
            _temp_dir: temp_dir,
            root,
        })
    }

    /// Subject 188 (no sessions) and subject 219 (sessions ctbs and itbs),
    /// each unit with one bold image and one phasediff sidecar.
    pub fn with_two_subjects() -> anyhow::Result<Self> {
        let dataset = Self::new()?;
        dataset.touch("sub-188/anat/sub-188_T1w.nii.gz", "")?;
        dataset.touch("sub-188/func/sub-188_task-nad1_run-01_bold.nii.gz", "")?;
        dataset.touch(
            "sub-188/func/sub-188_task-nad1_run-01_bold.json",
            r#"{"RepetitionTime": 2.0}"#,
        )?;
        dataset.touch(
            "sub-188/fmap/sub-188_phasediff.json",
            r#"{"EchoTime2": 0.00738, "EchoTime1": 0.00492}"#,
        )?;
        for ses in ["ctbs", "itbs"] {
            dataset.touch(
                &format!("sub-219/ses-{ses}/func/sub-219_ses-{ses}_task-nad1_run-01_bold.nii.gz"),
                "",
            )?;
            dataset.touch(
                &format!("sub-219/ses-{ses}/fmap/sub-219_ses-{ses}_phasediff.json"),
                r#"{"EchoTime1": 0.00492, "EchoTime2": 0.00738}"#,
            )?;
        }
        Ok(dataset)
    }

    pub fn touch(&self, rel: &str, content: &str) -> anyhow::Result<PathBuf> {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    pub fn read_json(&self, rel: &str) -> anyhow::Result<Value> {
        let content = fs::read_to_string(self.root.join(rel))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Run intend4 with `--bids-dir` pointed at this dataset plus `args`.
    pub fn run(&self, args: &[&str]) -> anyhow::Result<TestResult> {
        run_intend4(&self.root, args)
    }
}

pub fn run_intend4(bids_dir: &Path, args: &[&str]) -> anyhow::Result<TestResult> {
    let output = Command::new(env!("CARGO_BIN_EXE_intend4"))
        .args(args)
        .arg("--bids-dir")
        .arg(bids_dir)
        .env_remove("RUST_LOG")
        .output()?;
    Ok(output.into())
}
