//! Modality validation and field-map kind selection.
use crate::conventions::Conventions;
use crate::error::Intend4Error;
use std::fmt;

/// Modalities whose images can be listed in a field-map sidecar.
pub const ALLOWED_MODALITIES: &[&str] = &["bold", "dwi"];

/// A modality name drawn from `ALLOWED_MODALITIES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modality(&'static str);

impl Modality {
    /// The canonical name, which doubles as the image file suffix.
    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// Field-map suffix whose sidecar lists images of this modality.
    ///
    /// Two-way choice: the primary modality gets the phase-difference map,
    /// everything else the reverse-phase-encode map.
    pub fn fieldmap_suffix<'a>(&self, conventions: &'a Conventions) -> &'a str {
        if self.0 == conventions.primary_modality {
            &conventions.phasediff_suffix
        } else {
            &conventions.rpe_suffix
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Accept only exact members of `ALLOWED_MODALITIES`.
pub fn validate_modality(modality: &str) -> Result<Modality, Intend4Error> {
    ALLOWED_MODALITIES
        .iter()
        .copied()
        .find(|allowed| *allowed == modality)
        .map(Modality)
        .ok_or_else(|| Intend4Error::InvalidModality {
            allowed: ALLOWED_MODALITIES.to_vec(),
        })
}
