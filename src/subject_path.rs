//! Subject-relative paths, the values written into `IntendedFor`.
use crate::error::Intend4Error;

/// Strip the leading subject directory from a dataset-relative path.
///
/// Returns `Ok(None)` when the path does not start with `subject_dir_prefix`
/// (the file is outside every subject directory). A path that starts with the
/// prefix but has no `/` after it is not subject-scoped at all and fails with
/// `MalformedPath`.
pub fn subject_relative_path(
    relpath: &str,
    subject_dir_prefix: &str,
) -> Result<Option<String>, Intend4Error> {
    if !relpath.starts_with(subject_dir_prefix) {
        return Ok(None);
    }
    match relpath.split_once('/') {
        Some((_, rest)) => Ok(Some(rest.to_string())),
        None => Err(Intend4Error::MalformedPath {
            path: relpath.to_string(),
        }),
    }
}
