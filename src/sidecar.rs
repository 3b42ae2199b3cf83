//! Field-map sidecar lookup.
//!
//! A work unit must resolve to exactly one sidecar. Zero or several matches
//! cannot be corrected automatically, so the unit is refused instead of guessed.
use crate::conventions::Conventions;
use crate::error::Intend4Error;
use crate::layout::{DatasetFile, DatasetIndex, FileQuery};
use crate::run::WorkUnit;
use anyhow::Result;
use serde_json::{Map, Value};
use std::path::Path;

/// The single sidecar resolved for a work unit.
#[derive(Debug, Clone, Copy)]
pub struct SidecarHandle<'a> {
    file: &'a DatasetFile,
}

impl SidecarHandle<'_> {
    pub fn path(&self) -> &Path {
        &self.file.path
    }

    /// Freshly parsed key/value content of the sidecar.
    pub fn content(&self) -> Result<Map<String, Value>> {
        self.file.load_json()
    }
}

/// Find the `kind` sidecar for a work unit, enforcing exactly one match.
pub fn locate_sidecar<'a>(
    index: &'a dyn DatasetIndex,
    conventions: &Conventions,
    kind: &str,
    work_unit: &WorkUnit,
) -> Result<SidecarHandle<'a>, Intend4Error> {
    let extensions = [conventions.sidecar_extension.clone()];
    let matches = index.query(&FileQuery {
        subject: &work_unit.subject,
        session: work_unit.session.as_deref(),
        suffix: kind,
        extensions: &extensions,
    });
    match matches.as_slice() {
        [file] => Ok(SidecarHandle { file: *file }),
        [] => Err(Intend4Error::MissingSidecar {
            kind: kind.to_string(),
            work_unit: work_unit.clone(),
        }),
        many => Err(Intend4Error::AmbiguousSidecar {
            kind: kind.to_string(),
            work_unit: work_unit.clone(),
            count: many.len(),
        }),
    }
}
