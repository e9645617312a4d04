//! Workspace containment for agent-supplied paths.
//!
//! Every filesystem effect an agent requests funnels through
//! [`resolve_path`], which decides whether the path stays inside the
//! declared workspace. The check is symlink-aware in both directions:
//! the workspace root may itself be a symlink, and a candidate path may
//! try to escape through one. Paths whose terminal component does not
//! exist yet are validated through their nearest existing ancestor so
//! that a write can create them.
//!
//! The resolved (real) path is only ever used for validation; callers
//! always receive the cleaned absolute form of the name they asked for.
//! Subsequent syscalls must see the caller's intended name, which
//! matters when the workspace root is a symlink.

use crate::constants::WORKSPACE_MOUNT;
use crate::error::{Error, Result};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Resolves `path` against `workspace` and, when `restrict` is set,
/// rejects anything that escapes the workspace lexically or through
/// symbolic links.
///
/// An empty workspace disables containment entirely and returns the
/// path unchanged.
pub fn resolve_path(path: &str, workspace: &str, restrict: bool) -> Result<PathBuf> {
    if workspace.is_empty() {
        return Ok(PathBuf::from(path));
    }

    let abs_workspace = absolutize(Path::new(workspace))?;

    let candidate = Path::new(path);
    let abs_path = if candidate.is_absolute() {
        clean_path(candidate)
    } else {
        clean_path(&abs_workspace.join(candidate))
    };

    if !restrict {
        return Ok(abs_path);
    }

    if !is_within(&abs_path, &abs_workspace) {
        return Err(Error::PathOutsideWorkspace);
    }

    // The workspace root may be a symlink; containment of resolved
    // candidates is judged against its real location.
    let workspace_real = std::fs::canonicalize(&abs_workspace).unwrap_or_else(|_| abs_workspace.clone());

    match std::fs::canonicalize(&abs_path) {
        Ok(resolved) => {
            if !is_within(&resolved, &workspace_real) {
                return Err(Error::SymlinkOutsideWorkspace);
            }
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            // Terminal component does not exist yet. Walk up to the
            // nearest existing ancestor and validate its real location.
            let parent = abs_path.parent().unwrap_or(Path::new("/"));
            match resolve_existing_ancestor(parent) {
                Ok(ancestor) => {
                    if !is_within(&ancestor, &workspace_real) {
                        return Err(Error::SymlinkOutsideWorkspace);
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(Error::PathResolution(err.to_string())),
            }
        }
        Err(err) => return Err(Error::PathResolution(err.to_string())),
    }

    Ok(abs_path)
}

/// Resolves a path in container space. Absolute paths must live under
/// the workspace mount; relative paths are joined onto it. The cleaned
/// result is re-checked so `..` sequences cannot escape.
pub fn resolve_container_path(path: &str) -> Result<String> {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{WORKSPACE_MOUNT}/{path}")
    };

    let cleaned = clean_container_path(&joined);
    if cleaned != WORKSPACE_MOUNT && !cleaned.starts_with(&format!("{WORKSPACE_MOUNT}/")) {
        return Err(Error::OutsideContainerWorkspace(path.to_string()));
    }
    Ok(cleaned)
}

/// Makes a path absolute against the current directory without touching
/// the filesystem beyond `current_dir`.
fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(clean_path(path));
    }
    let cwd = std::env::current_dir().map_err(|err| Error::PathResolution(err.to_string()))?;
    Ok(clean_path(&cwd.join(path)))
}

/// Lexically removes `.` and `..` components, like the container-side
/// variant but for native paths. `..` never pops past the root; on a
/// relative path, unmatched `..` components are kept.
fn clean_path(path: &Path) -> PathBuf {
    let absolute = path.is_absolute();
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let kept_parent = out.components().next_back() == Some(Component::ParentDir);
                if kept_parent || (!out.pop() && !absolute) {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Lexical cleanup for container-space (always `/`-separated) paths.
fn clean_container_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// True when `candidate` equals `workspace` or is one of its
/// descendants. Both sides must already be cleaned absolute paths.
fn is_within(candidate: &Path, workspace: &Path) -> bool {
    candidate.strip_prefix(workspace).is_ok()
}

/// Walks up from `path` until a component resolves, returning its real
/// location. `NotFound` means nothing along the chain exists.
fn resolve_existing_ancestor(path: &Path) -> std::io::Result<PathBuf> {
    let mut current = path.to_path_buf();
    loop {
        match std::fs::canonicalize(&current) {
            Ok(resolved) => return Ok(resolved),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        match current.parent() {
            Some(parent) if parent != current => current = parent.to_path_buf(),
            _ => return Err(ErrorKind::NotFound.into()),
        }
    }
}
