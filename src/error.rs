//! Error taxonomy for sidecar resolution and mutation.
//!
//! `MissingSidecar` and `AmbiguousSidecar` are scoped to one work unit and are
//! reported then skipped by the run loop; every other variant is fatal.
use crate::run::WorkUnit;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Intend4Error {
    #[error("modality argument must be one of: {}", .allowed.join(", "))]
    InvalidModality { allowed: Vec<&'static str> },

    #[error("malformed BIDS dataset at {}: {reason}", .root.display())]
    MalformedDataset { root: PathBuf, reason: String },

    #[error("{kind} sidecar file is missing for {work_unit}")]
    MissingSidecar { kind: String, work_unit: WorkUnit },

    #[error("found {count} {kind} sidecars for {work_unit}")]
    AmbiguousSidecar {
        kind: String,
        work_unit: WorkUnit,
        count: usize,
    },

    #[error("unable to remove subject prefix from {path}: no '/' found")]
    MalformedPath { path: String },
}

impl Intend4Error {
    /// True for errors that only abort their own work unit.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Intend4Error::MissingSidecar { .. } | Intend4Error::AmbiguousSidecar { .. }
        )
    }

    pub(crate) fn malformed_dataset(root: &std::path::Path, reason: impl Into<String>) -> Self {
        Intend4Error::MalformedDataset {
            root: root.to_path_buf(),
            reason: reason.into(),
        }
    }
}
