//! Naming conventions for images and sidecars.
//!
//! Directory entities (`sub-`, `ses-`) are not configurable: the dataset
//! index parses them as BIDS entities.
//!
//! Components take a `Conventions` value instead of reading module constants so
//! a run (or a test) can swap conventions without touching global state.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Convention values consumed by every resolution and mutation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Conventions {
    /// Extensions (without the leading dot) that mark image files.
    pub image_extensions: Vec<String>,
    /// Extension of metadata sidecars.
    pub sidecar_extension: String,
    /// Modality corrected by the primary field-map kind.
    pub primary_modality: String,
    /// Field-map suffix used for the primary modality.
    pub phasediff_suffix: String,
    /// Field-map suffix used for every other modality.
    pub rpe_suffix: String,
    /// Sidecar key rewritten with the image list.
    pub target_field: String,
    /// Mode applied while a sidecar is being rewritten.
    pub writable_mode: u32,
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            image_extensions: vec!["nii.gz".to_string(), "nii".to_string()],
            sidecar_extension: "json".to_string(),
            primary_modality: "bold".to_string(),
            phasediff_suffix: "phasediff".to_string(),
            rpe_suffix: "epi".to_string(),
            target_field: "IntendedFor".to_string(),
            writable_mode: 0o640,
        }
    }
}

/// Load conventions from a JSON file; omitted fields keep their defaults.
pub fn load_conventions(path: &Path) -> Result<Conventions> {
    let bytes = fs::read(path).with_context(|| format!("read conventions {}", path.display()))?;
    let conventions: Conventions =
        serde_json::from_slice(&bytes).context("parse conventions JSON")?;
    Ok(conventions)
}
