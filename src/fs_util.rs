use anyhow::{anyhow, Context, Result};
use nix::unistd::{access, AccessFlags};
use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

/// Return the permission bits (file type bits masked off) of a path.
pub fn get_permissions(path: &Path) -> Result<u32> {
    let metadata = fs::metadata(path).with_context(|| format!("inspect {}", path.display()))?;
    Ok(metadata.permissions().mode() & 0o7777)
}

/// Set the permission bits of a path.
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("set permissions on {}", path.display()))
}

/// Tell whether `path` is a readable (and optionally writable) directory.
/// Follows symbolic links.
pub fn good_dir_path(path: &Path, writable: bool) -> bool {
    path.is_dir() && is_readable(path) && (!writable || is_writable(path))
}

pub fn is_readable(path: &Path) -> bool {
    access(path, AccessFlags::R_OK).is_ok()
}

pub fn is_writable(path: &Path) -> bool {
    access(path, AccessFlags::W_OK).is_ok()
}

/// Expand a leading `~` and make the path absolute without touching the filesystem.
pub fn full_path(path: &Path) -> Result<PathBuf> {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .ok_or_else(|| anyhow!("cannot expand ~: home directory unknown"))?
            .join(rest),
        Err(_) => path.to_path_buf(),
    };
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        env::current_dir().context("resolve current directory")?.join(expanded)
    };
    Ok(normalize(&absolute))
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
