//! CLI argument parsing and pre-run checks.
//!
//! Arguments are checked before the dataset is indexed so a bad invocation
//! never touches a sidecar.
use crate::fs_util::good_dir_path;
use clap::Parser;
use std::path::{Path, PathBuf};

pub const PROG_NAME: &str = "intend4";

/// Exit status for a dataset directory that is missing or not writable.
pub const BIDS_DIR_EXIT_CODE: u8 = 10;
/// Exit status for `--participant-label` given without any subjects.
pub const SUBJ_NUMS_EXIT_CODE: u8 = 11;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = PROG_NAME,
    version,
    about = "Adds or removes 'IntendedFor' info to the JSON sidecars, for one or more subjects.",
    after_help = "Examples:\n  intend4 bold --bids-dir /data/bids\n  intend4 -m dwi --bids-dir /data/bids --participant-label 188 219\n  intend4 bold --remove -v"
)]
pub struct RootArgs {
    /// Modality of the image files (one of: bold, dwi)
    #[arg(
        value_name = "MODALITY",
        required_unless_present = "modality_flag",
        conflicts_with = "modality_flag"
    )]
    modality_arg: Option<String>,

    /// Modality given as an option instead of positionally
    #[arg(short = 'm', long = "modality", value_name = "MODALITY")]
    modality_flag: Option<String>,

    /// Print informational messages during processing
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to the BIDS data directory [default: current directory]
    #[arg(long = "bids-dir", alias = "bids_dir", value_name = "DIR", default_value = ".")]
    pub bids_dir: PathBuf,

    /// Space-separated subject labels to process [default: all subjects]
    #[arg(
        long = "participant-label",
        alias = "participant_label",
        value_name = "ID",
        num_args = 0..
    )]
    pub participant_label: Option<Vec<String>>,

    /// Remove IntendedFor entries for the selected modality
    #[arg(long)]
    pub remove: bool,

    /// JSON file overriding file naming conventions
    #[arg(long, value_name = "PATH")]
    pub conventions: Option<PathBuf>,
}

/// Invocation problems detected before the dataset is read.
#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    #[error(
        "A writeable BIDS data directory must be specified. {} is not one.",
        .path.display()
    )]
    BidsDir { path: PathBuf },

    #[error("if --participant-label is used, one or more subject numbers must be specified.")]
    NoSubjects,
}

impl RootArgs {
    /// The modality, from whichever of the positional or `-m` form was used.
    pub fn modality(&self) -> &str {
        self.modality_arg
            .as_deref()
            .or(self.modality_flag.as_deref())
            .unwrap_or_default()
    }
}

impl ArgsError {
    pub fn exit_code(&self) -> u8 {
        match self {
            ArgsError::BidsDir { .. } => BIDS_DIR_EXIT_CODE,
            ArgsError::NoSubjects => SUBJ_NUMS_EXIT_CODE,
        }
    }
}

/// The dataset directory must exist and be writable.
pub fn check_bids_dir(bids_dir: &Path) -> Result<(), ArgsError> {
    if good_dir_path(bids_dir, true) {
        return Ok(());
    }
    Err(ArgsError::BidsDir {
        path: bids_dir.to_path_buf(),
    })
}

/// `--participant-label` with no values is an error; omitting it is not.
pub fn check_subj_nums(subjects: Option<&[String]>) -> Result<(), ArgsError> {
    match subjects {
        Some([]) => Err(ArgsError::NoSubjects),
        _ => Ok(()),
    }
}
