use std::path::{Component, Path};

use crate::error::{CrpError, Result};

/// Accept a single path segment usable as a project, user or upload file name.
pub fn check_segment(name: &str) -> Result<&str> {
    let reason = if name.is_empty() {
        Some("empty")
    } else if name.contains('/') || name.contains('\\') {
        Some("contains a path separator")
    } else if name.contains('\0') {
        Some("contains NUL")
    } else if name.starts_with('.') {
        Some("starts with '.'")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(CrpError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(name),
    }
}

/// True when `path` is lexically inside `root` (no `..` escapes).
pub fn is_within(root: &Path, path: &Path) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return false;
    };
    rel.components().all(|c| matches!(c, Component::Normal(_)))
}
