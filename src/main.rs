use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;
mod conventions;
mod error;
mod fs_util;
mod images;
mod layout;
mod merge;
mod modality;
mod run;
mod sidecar;
mod subject_path;
mod writer;

use cli::{check_bids_dir, check_subj_nums, ArgsError, RootArgs, PROG_NAME};
use conventions::{load_conventions, Conventions};
use error::Intend4Error;
use modality::validate_modality;
use run::{do_subjects, RunRequest};

/// Exit status for any other fatal error.
const FATAL_EXIT_CODE: u8 = 1;
/// Exit status for usage errors, matching clap's own.
const USAGE_EXIT_CODE: u8 = 2;

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    match run_cli(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("({PROG_NAME}): ERROR: {err:#} Exiting...");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run_cli(args: RootArgs) -> Result<()> {
    let modality = validate_modality(args.modality())?;

    let bids_dir = fs_util::full_path(&args.bids_dir)?;
    check_bids_dir(&bids_dir)?;

    let subjects = args.participant_label.as_deref();
    check_subj_nums(subjects)?;

    let conventions = match &args.conventions {
        Some(path) => load_conventions(path)?,
        None => Conventions::default(),
    };

    let field = &conventions.target_field;
    let action = if args.remove { "Removing" } else { "Modifying" };
    tracing::info!("{action} {field} field in sidecar files for modality '{modality}'.");

    let request = RunRequest {
        modality,
        subjects,
        remove: args.remove,
        conventions: &conventions,
    };
    let summary = do_subjects(&bids_dir, &request)?;

    let action = if args.remove { "Removed" } else { "Modified" };
    let kind = modality.fieldmap_suffix(&conventions);
    tracing::info!(
        skipped_missing = summary.missing_sidecar,
        skipped_ambiguous = summary.ambiguous_sidecar,
        without_images = summary.no_images,
        "{action} {field} fields in {} {kind} sidecars.",
        summary.modified
    );
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(args_err) = err.downcast_ref::<ArgsError>() {
        return args_err.exit_code();
    }
    match err.downcast_ref::<Intend4Error>() {
        Some(Intend4Error::InvalidModality { .. }) => USAGE_EXIT_CODE,
        _ => FATAL_EXIT_CODE,
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .init();
}
