//! Permission-preserving sidecar rewrite.
//!
//! Curated datasets often mark sidecars read-only. The file is unlocked for
//! the write and its original mode is put back afterwards, whether or not the
//! write succeeded.
use crate::fs_util::{get_permissions, set_permissions};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Overwrite `path` with `content` as 2-space indented JSON plus a trailing newline.
pub fn write_sidecar(content: &Map<String, Value>, path: &Path, writable_mode: u32) -> Result<()> {
    let guard = PermissionGuard::unlock(path, writable_mode)?;
    let written = write_json(content, path);
    let restored = guard.restore();
    written?;
    restored
}

fn write_json(content: &Map<String, Value>, path: &Path) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(content).context("serialize sidecar JSON")?;
    bytes.push(b'\n');
    fs::write(path, bytes).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Holds a file in `writable_mode` until restored or dropped.
struct PermissionGuard<'a> {
    path: &'a Path,
    original: u32,
    restored: bool,
}

impl<'a> PermissionGuard<'a> {
    fn unlock(path: &'a Path, writable_mode: u32) -> Result<Self> {
        let original = get_permissions(path)?;
        set_permissions(path, writable_mode)?;
        Ok(Self {
            path,
            original,
            restored: false,
        })
    }

    fn restore(mut self) -> Result<()> {
        self.restored = true;
        set_permissions(self.path, self.original)
    }
}

impl Drop for PermissionGuard<'_> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(err) = set_permissions(self.path, self.original) {
            tracing::warn!(
                path = %self.path.display(),
                mode = %format!("{:o}", self.original),
                "failed to restore permissions: {err:#}"
            );
        }
    }
}
