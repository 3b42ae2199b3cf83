//! Read-only index over a BIDS dataset.
//!
//! The rest of the crate only needs to enumerate subjects, enumerate a
//! subject's sessions, and find files by entity. `DatasetIndex` is that seam;
//! `BidsLayout` is the filesystem-backed implementation.
use crate::error::Intend4Error;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const DATASET_DESCRIPTION: &str = "dataset_description.json";

/// Leading marker of a subject directory; fixed by BIDS entity naming.
pub const SUBJECT_DIR_PREFIX: &str = "sub-";
const SESSION_DIR_PREFIX: &str = "ses-";
const SKIPPED_TOP_LEVEL_DIRS: &[&str] = &["derivatives", "sourcedata", "code"];

/// Query interface over an indexed dataset.
pub trait DatasetIndex {
    /// Every subject label, sorted and de-duplicated.
    fn subjects(&self) -> Vec<String>;

    /// Session labels for one subject; empty when sessions are not in use.
    fn sessions(&self, subject: &str) -> Vec<String>;

    /// Files matching every field of `query`, in index order.
    fn query(&self, query: &FileQuery<'_>) -> Vec<&DatasetFile>;
}

/// File filter keyed by subject, session, suffix, and extension.
///
/// A `None` session matches only files without a session entity.
#[derive(Debug, Clone, Copy)]
pub struct FileQuery<'a> {
    pub subject: &'a str,
    pub session: Option<&'a str>,
    pub suffix: &'a str,
    pub extensions: &'a [String],
}

impl FileQuery<'_> {
    fn matches(&self, file: &DatasetFile) -> bool {
        file.subject == self.subject
            && file.session.as_deref() == self.session
            && file.suffix == self.suffix
            && self.extensions.iter().any(|ext| *ext == file.extension)
    }
}

/// One indexed file and the entities parsed from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFile {
    pub path: PathBuf,
    /// Root-relative path with `/` separators.
    pub relpath: String,
    pub subject: String,
    pub session: Option<String>,
    pub suffix: String,
    /// Extension without the leading dot, e.g. `nii.gz`.
    pub extension: String,
}

impl DatasetFile {
    /// Parse the file as a JSON object.
    pub fn load_json(&self) -> Result<Map<String, Value>> {
        load_json_object(&self.path)
    }
}

/// Filesystem-backed index built by walking the dataset once.
#[derive(Debug)]
pub struct BidsLayout {
    files: Vec<DatasetFile>,
}

impl BidsLayout {
    /// Index the dataset rooted at `root`.
    ///
    /// Fails with `MalformedDataset` when the root cannot be indexed at all,
    /// so callers can stop before any sidecar is touched.
    pub fn open(root: &Path) -> Result<Self, Intend4Error> {
        if !root.is_dir() {
            return Err(Intend4Error::malformed_dataset(root, "not a directory"));
        }
        let description = root.join(DATASET_DESCRIPTION);
        if !description.is_file() {
            return Err(Intend4Error::malformed_dataset(
                root,
                format!("missing {DATASET_DESCRIPTION}"),
            ));
        }
        load_json_object(&description)
            .map_err(|err| Intend4Error::malformed_dataset(root, format!("{err:#}")))?;

        let parser = EntityParser::new();
        let mut paths = Vec::new();
        collect_dataset_files(root, root, &mut paths)
            .map_err(|err| Intend4Error::malformed_dataset(root, format!("{err:#}")))?;

        let mut files = Vec::new();
        for path in paths {
            let relpath = rel_path(root, &path);
            match parser.parse(root, &path, &relpath)? {
                Some(file) => files.push(file),
                None => tracing::debug!(relpath = %relpath, "skipping non-BIDS file"),
            }
        }
        tracing::debug!(root = %root.display(), files = files.len(), "indexed dataset");
        Ok(Self { files })
    }
}

impl DatasetIndex for BidsLayout {
    fn subjects(&self) -> Vec<String> {
        let subjects: BTreeSet<&str> = self.files.iter().map(|f| f.subject.as_str()).collect();
        subjects.into_iter().map(str::to_string).collect()
    }

    fn sessions(&self, subject: &str) -> Vec<String> {
        let sessions: BTreeSet<&str> = self
            .files
            .iter()
            .filter(|f| f.subject == subject)
            .filter_map(|f| f.session.as_deref())
            .collect();
        sessions.into_iter().map(str::to_string).collect()
    }

    fn query(&self, query: &FileQuery<'_>) -> Vec<&DatasetFile> {
        self.files.iter().filter(|f| query.matches(f)).collect()
    }
}

struct EntityParser {
    filename: Regex,
}

impl EntityParser {
    fn new() -> Self {
        let filename = Regex::new(
            r"^((?:[A-Za-z0-9]+-[A-Za-z0-9]+_)+)([A-Za-z0-9]+)\.([A-Za-z0-9]+(?:\.[A-Za-z0-9]+)*)$",
        )
        .expect("regex for BIDS filenames");
        Self { filename }
    }

    /// Parse entities from a file name; `Ok(None)` for names that are not
    /// subject-scoped BIDS files.
    fn parse(
        &self,
        root: &Path,
        path: &Path,
        relpath: &str,
    ) -> Result<Option<DatasetFile>, Intend4Error> {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return Ok(None);
        };
        let Some(caps) = self.filename.captures(name) else {
            return Ok(None);
        };
        let entities: Vec<(&str, &str)> = caps[1]
            .split('_')
            .filter_map(|pair| pair.split_once('-'))
            .collect();
        let entity = |key: &str| {
            entities
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        };
        let Some(subject) = entity("sub") else {
            return Ok(None);
        };
        let session = entity("ses");

        let mut parents = relpath.split('/').rev().skip(1);
        let session_dir = parents
            .clone()
            .find_map(|dir| dir.strip_prefix(SESSION_DIR_PREFIX));
        let subject_dir = parents.find_map(|dir| dir.strip_prefix(SUBJECT_DIR_PREFIX));

        if let Some(dir_subject) = subject_dir {
            if dir_subject != subject {
                return Err(Intend4Error::malformed_dataset(
                    root,
                    format!(
                        "{relpath} names subject {subject} inside {SUBJECT_DIR_PREFIX}{dir_subject}"
                    ),
                ));
            }
        }
        if let (Some(dir_session), Some(file_session)) = (session_dir, session.as_deref()) {
            if dir_session != file_session {
                return Err(Intend4Error::malformed_dataset(
                    root,
                    format!(
                        "{relpath} names session {file_session} inside {SESSION_DIR_PREFIX}{dir_session}"
                    ),
                ));
            }
        }

        Ok(Some(DatasetFile {
            path: path.to_path_buf(),
            relpath: relpath.to_string(),
            subject,
            session: session.or_else(|| session_dir.map(str::to_string)),
            suffix: caps[2].to_string(),
            extension: caps[3].to_string(),
        }))
    }
}

fn collect_dataset_files(root: &Path, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("read {}", dir.display()))?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("read {}", dir.display()))?;
    entries.sort();
    for path in entries {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        if name.starts_with('.') {
            continue;
        }
        if path.is_dir() {
            if dir == root && SKIPPED_TOP_LEVEL_DIRS.contains(&name.as_str()) {
                continue;
            }
            collect_dataset_files(root, &path, files)?;
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

fn rel_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn load_json_object(path: &Path) -> Result<Map<String, Value>> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let value: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse JSON {}", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow!("{} is not a JSON object", path.display())),
    }
}
