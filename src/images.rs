use crate::conventions::Conventions;
use crate::error::Intend4Error;
use crate::layout::{DatasetIndex, FileQuery, SUBJECT_DIR_PREFIX};
use crate::modality::Modality;
use crate::subject_path::subject_relative_path;

/// Subject-relative paths of every `modality` image for one subject/session.
///
/// Assumes the modality name is also the image file suffix. Files outside a
/// subject directory are dropped; an empty result means there is nothing to do.
pub fn image_paths(
    index: &dyn DatasetIndex,
    conventions: &Conventions,
    modality: Modality,
    subject: &str,
    session: Option<&str>,
) -> Result<Vec<String>, Intend4Error> {
    let query = FileQuery {
        subject,
        session,
        suffix: modality.as_str(),
        extensions: &conventions.image_extensions,
    };
    let mut paths = Vec::new();
    for file in index.query(&query) {
        if let Some(path) = subject_relative_path(&file.relpath, SUBJECT_DIR_PREFIX)? {
            paths.push(path);
        }
    }
    Ok(paths)
}
