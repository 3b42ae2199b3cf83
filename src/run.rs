//! Subject/session traversal.
//!
//! Each (subject, session) pair is processed independently: find the images,
//! find the one field-map sidecar, merge, and rewrite. Sidecar lookup failures
//! skip only their own unit; everything else aborts the run.
use crate::conventions::Conventions;
use crate::error::Intend4Error;
use crate::images::image_paths;
use crate::layout::{BidsLayout, DatasetIndex, SUBJECT_DIR_PREFIX};
use crate::merge::merge_intended_for;
use crate::modality::Modality;
use crate::sidecar::locate_sidecar;
use crate::writer::write_sidecar;
use anyhow::Result;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// One subject, optionally narrowed to one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub subject: String,
    pub session: Option<String>,
}

impl WorkUnit {
    pub fn new(subject: &str, session: Option<&str>) -> Self {
        Self {
            subject: subject.to_string(),
            session: session.map(str::to_string),
        }
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subject {}", self.subject)?;
        if let Some(session) = &self.session {
            write!(f, " in session {session}")?;
        }
        Ok(())
    }
}

/// Inputs for one pass over the dataset.
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    pub modality: Modality,
    /// Subjects to process; `None` means every subject in the dataset.
    pub subjects: Option<&'a [String]>,
    pub remove: bool,
    pub conventions: &'a Conventions,
}

/// Per-unit tallies for a finished run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Units whose sidecar was rewritten.
    pub modified: usize,
    pub no_images: usize,
    pub missing_sidecar: usize,
    pub ambiguous_sidecar: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitOutcome {
    Modified,
    NoImages,
    MissingSidecar,
    AmbiguousSidecar,
}

/// Index the dataset at `bids_dir`, then process the requested subjects.
///
/// A dataset that cannot be indexed fails here, before any sidecar is touched.
pub fn do_subjects(bids_dir: &Path, request: &RunRequest<'_>) -> Result<RunSummary> {
    let layout = BidsLayout::open(bids_dir)?;
    process(&layout, request)
}

/// Process every selected subject and each of its sessions.
pub fn process(index: &dyn DatasetIndex, request: &RunRequest<'_>) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    for subject in selected_subjects(index, request) {
        let sessions = index.sessions(&subject);
        let units: Vec<WorkUnit> = if sessions.is_empty() {
            vec![WorkUnit::new(&subject, None)]
        } else {
            sessions
                .iter()
                .map(|session| WorkUnit::new(&subject, Some(session.as_str())))
                .collect()
        };
        for unit in units {
            match update_fieldmap(index, request, &unit)? {
                UnitOutcome::Modified => summary.modified += 1,
                UnitOutcome::NoImages => summary.no_images += 1,
                UnitOutcome::MissingSidecar => summary.missing_sidecar += 1,
                UnitOutcome::AmbiguousSidecar => summary.ambiguous_sidecar += 1,
            }
        }
    }
    Ok(summary)
}

/// Requested labels with any `sub-` prefix stripped, first occurrence kept.
///
/// `188` and `sub-188` name the same subject and must yield one set of units.
fn selected_subjects(index: &dyn DatasetIndex, request: &RunRequest<'_>) -> Vec<String> {
    let Some(subjects) = request.subjects else {
        return index.subjects();
    };
    let mut seen = BTreeSet::new();
    subjects
        .iter()
        .map(|label| label.strip_prefix(SUBJECT_DIR_PREFIX).unwrap_or(label))
        .filter(|label| seen.insert(*label))
        .map(str::to_string)
        .collect()
}

fn update_fieldmap(
    index: &dyn DatasetIndex,
    request: &RunRequest<'_>,
    unit: &WorkUnit,
) -> Result<UnitOutcome> {
    tracing::info!("Processing {unit}");
    let conventions = request.conventions;
    let paths = image_paths(
        index,
        conventions,
        request.modality,
        &unit.subject,
        unit.session.as_deref(),
    )?;
    if paths.is_empty() {
        tracing::debug!(%unit, modality = %request.modality, "no images; skipping");
        return Ok(UnitOutcome::NoImages);
    }

    let kind = request.modality.fieldmap_suffix(conventions);
    let sidecar = match locate_sidecar(index, conventions, kind, unit) {
        Ok(sidecar) => sidecar,
        Err(err) if err.is_recoverable() => {
            tracing::error!(
                subject = %unit.subject,
                session = unit.session.as_deref().unwrap_or(""),
                kind,
                "{err}. Skipping..."
            );
            return Ok(match err {
                Intend4Error::AmbiguousSidecar { .. } => UnitOutcome::AmbiguousSidecar,
                _ => UnitOutcome::MissingSidecar,
            });
        }
        Err(err) => return Err(err.into()),
    };

    let content = sidecar.content()?;
    let merged = merge_intended_for(&paths, content, &conventions.target_field, request.remove);
    write_sidecar(&merged, sidecar.path(), conventions.writable_mode)?;
    tracing::debug!(path = %sidecar.path().display(), images = paths.len(), "rewrote sidecar");
    Ok(UnitOutcome::Modified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_util::{get_permissions, set_permissions};
    use crate::modality::validate_modality;
    use serde_json::{json, Value};
    use std::fs;

    fn touch(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }

    fn read_json(root: &Path, rel: &str) -> Value {
        serde_json::from_str(&fs::read_to_string(root.join(rel)).expect("read")).expect("parse")
    }

    fn dataset() -> tempfile::TempDir {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(root, "dataset_description.json", r#"{"Name": "t", "BIDSVersion": "1.6.0"}"#);
        touch(root, "sub-188/func/sub-188_task-nad1_run-01_bold.nii.gz", "");
        touch(
            root,
            "sub-188/fmap/sub-188_phasediff.json",
            r#"{"EchoTime2": 0.00738, "EchoTime1": 0.00492}"#,
        );
        for ses in ["ctbs", "itbs"] {
            touch(
                root,
                &format!("sub-219/ses-{ses}/func/sub-219_ses-{ses}_task-nad1_bold.nii.gz"),
                "",
            );
            touch(
                root,
                &format!("sub-219/ses-{ses}/fmap/sub-219_ses-{ses}_phasediff.json"),
                r#"{"EchoTime1": 0.00492}"#,
            );
        }
        temp
    }

    fn request<'a>(
        conventions: &'a Conventions,
        subjects: Option<&'a [String]>,
        remove: bool,
    ) -> RunRequest<'a> {
        RunRequest {
            modality: validate_modality("bold").expect("bold"),
            subjects,
            remove,
            conventions,
        }
    }

    #[test]
    fn single_subject_without_sessions() {
        let temp = dataset();
        let conventions = Conventions::default();
        let subjects = vec!["188".to_string()];
        let request = request(&conventions, Some(subjects.as_slice()), false);
        let summary = do_subjects(temp.path(), &request).expect("run");

        assert_eq!(summary.modified, 1);
        let sidecar = read_json(temp.path(), "sub-188/fmap/sub-188_phasediff.json");
        assert_eq!(
            sidecar["IntendedFor"],
            json!(["func/sub-188_task-nad1_run-01_bold.nii.gz"])
        );
        assert_eq!(sidecar["EchoTime2"], json!(0.00738));
    }

    #[test]
    fn subject_with_two_sessions() {
        let temp = dataset();
        let conventions = Conventions::default();
        let subjects = vec!["sub-219".to_string()];
        let request = request(&conventions, Some(subjects.as_slice()), false);
        let summary = do_subjects(temp.path(), &request).expect("run");

        assert_eq!(summary.modified, 2);
        let itbs = read_json(temp.path(), "sub-219/ses-itbs/fmap/sub-219_ses-itbs_phasediff.json");
        assert_eq!(
            itbs["IntendedFor"],
            json!(["ses-itbs/func/sub-219_ses-itbs_task-nad1_bold.nii.gz"])
        );
    }

    #[test]
    fn repeated_labels_rewrite_each_sidecar_once() {
        let temp = dataset();
        let conventions = Conventions::default();
        let subjects = vec![
            "188".to_string(),
            "sub-188".to_string(),
            "219".to_string(),
            "188".to_string(),
        ];
        let request = request(&conventions, Some(subjects.as_slice()), false);
        let summary = do_subjects(temp.path(), &request).expect("run");

        assert_eq!(summary.modified, 3);
        let sidecar = read_json(temp.path(), "sub-188/fmap/sub-188_phasediff.json");
        assert_eq!(sidecar["IntendedFor"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn numbers_in_other_fields_are_rewritten_verbatim() {
        let temp = dataset();
        touch(
            temp.path(),
            "sub-188/fmap/sub-188_phasediff.json",
            r#"{"EchoTime1": 4.3080333908418635e-4, "SeriesUID": 12345678901234567890123}"#,
        );
        let conventions = Conventions::default();
        let subjects = vec!["188".to_string()];
        let request = request(&conventions, Some(subjects.as_slice()), false);
        do_subjects(temp.path(), &request).expect("run");

        let text = fs::read_to_string(temp.path().join("sub-188/fmap/sub-188_phasediff.json"))
            .expect("read");
        assert!(text.contains("\"EchoTime1\": 4.3080333908418635e-4,"), "{text}");
        assert!(text.contains("\"SeriesUID\": 12345678901234567890123\n"), "{text}");
    }

    #[test]
    fn defaults_to_every_subject_and_preserves_modes() {
        let temp = dataset();
        let sidecar = temp.path().join("sub-188/fmap/sub-188_phasediff.json");
        set_permissions(&sidecar, 0o444).expect("chmod");
        let conventions = Conventions::default();

        let summary = do_subjects(temp.path(), &request(&conventions, None, false)).expect("run");

        assert_eq!(summary.modified, 3);
        assert_eq!(get_permissions(&sidecar).expect("mode"), 0o444);
    }

    #[test]
    fn remove_clears_field() {
        let temp = dataset();
        let conventions = Conventions::default();
        do_subjects(temp.path(), &request(&conventions, None, false)).expect("populate");
        let summary = do_subjects(temp.path(), &request(&conventions, None, true)).expect("remove");

        assert_eq!(summary.modified, 3);
        let sidecar = read_json(temp.path(), "sub-188/fmap/sub-188_phasediff.json");
        assert_eq!(sidecar["IntendedFor"], json!([]));
    }

    #[test]
    fn missing_and_ambiguous_sidecars_skip_only_their_unit() {
        let temp = dataset();
        let root = temp.path();
        fs::remove_file(root.join("sub-219/ses-ctbs/fmap/sub-219_ses-ctbs_phasediff.json"))
            .expect("remove");
        touch(root, "sub-219/ses-itbs/fmap/sub-219_ses-itbs_run-02_phasediff.json", "{}");
        let before = fs::read(root.join("sub-219/ses-itbs/fmap/sub-219_ses-itbs_phasediff.json"))
            .expect("read");
        let conventions = Conventions::default();

        let summary = do_subjects(root, &request(&conventions, None, false)).expect("run");

        assert_eq!(
            summary,
            RunSummary {
                modified: 1,
                no_images: 0,
                missing_sidecar: 1,
                ambiguous_sidecar: 1,
            }
        );
        let after = fs::read(root.join("sub-219/ses-itbs/fmap/sub-219_ses-itbs_phasediff.json"))
            .expect("read");
        assert_eq!(before, after);
    }

    #[test]
    fn units_without_images_are_not_looked_up() {
        let temp = dataset();
        let conventions = Conventions::default();
        let summary = do_subjects(
            temp.path(),
            &RunRequest {
                modality: validate_modality("dwi").expect("dwi"),
                subjects: None,
                remove: true,
                conventions: &conventions,
            },
        )
        .expect("run");

        assert_eq!(summary.modified, 0);
        assert_eq!(summary.no_images, 3);
        assert_eq!(summary.missing_sidecar, 0);
    }

    #[test]
    fn malformed_dataset_is_fatal() {
        let temp = tempfile::tempdir().expect("tempdir");
        let conventions = Conventions::default();
        let err = do_subjects(temp.path(), &request(&conventions, None, false))
            .expect_err("no description");
        assert!(matches!(
            err.downcast_ref::<Intend4Error>(),
            Some(Intend4Error::MalformedDataset { .. })
        ));
    }

    #[test]
    fn work_unit_display() {
        assert_eq!(WorkUnit::new("188", None).to_string(), "subject 188");
        assert_eq!(
            WorkUnit::new("219", Some("ctbs")).to_string(),
            "subject 219 in session ctbs"
        );
    }
}
