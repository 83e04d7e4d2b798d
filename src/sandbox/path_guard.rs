//! Path confinement for model-supplied paths
//!
//! `confine` is purely lexical: it joins the relative path onto the root,
//! folds `.` and `..` components, and checks the result is the root or a
//! descendant of it. It never touches the filesystem, so an escaping path
//! is rejected before anything is stat'ed.
//!
//! `confine_existing` additionally requires the target to exist and
//! re-checks the canonical path, which rejects symlinks inside the root
//! that point outside of it.

use std::path::{Component, Path, PathBuf};

use super::{SandboxError, WorkingDirectory};

/// Resolve `relative` against the working directory without filesystem access
///
/// An absolute `relative` replaces the root entirely (as `Path::join` does)
/// and is therefore rejected unless it already lies under the root.
pub fn confine(root: &WorkingDirectory, relative: &str) -> Result<PathBuf, SandboxError> {
    let joined = root.path().join(relative);
    let resolved = normalize(&joined);

    if !resolved.starts_with(root.path()) {
        return Err(SandboxError::PathEscape(relative.to_string()));
    }

    Ok(resolved)
}

/// Resolve `relative` and require the target to exist inside the root
pub fn confine_existing(root: &WorkingDirectory, relative: &str) -> Result<PathBuf, SandboxError> {
    let resolved = confine(root, relative)?;

    let canonical = match std::fs::canonicalize(&resolved) {
        Ok(path) => path,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SandboxError::NotFound(relative.to_string()));
        }
        Err(e) => {
            return Err(SandboxError::ReadError {
                path: relative.to_string(),
                source: e,
            });
        }
    };

    if !canonical.starts_with(root.path()) {
        return Err(SandboxError::PathEscape(relative.to_string()));
    }

    Ok(canonical)
}

/// Fold `.` and `..` components lexically
///
/// `..` at the filesystem root stays at the root, mirroring how the kernel
/// resolves `/..`.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}
