//! Lexical workspace confinement for agent-supplied paths.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("path '{0}' contains a NUL byte")]
    NulByte(String),
    #[error("path '{0}' escapes the workspace root")]
    EscapesRoot(String),
    #[error("path '{0}' refers to the workspace root itself")]
    IsRoot(String),
}

/// A path known to lie strictly inside the workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePath {
    /// `/`-separated, relative to the root. Used as the memory key.
    pub relative: String,
    pub absolute: PathBuf,
}

/// Resolve `raw` against `root` without touching the filesystem.
///
/// Absolute inputs are accepted only when they normalize to a location under
/// `root`.
pub fn resolve_in_workspace(root: &Path, raw: &str) -> Result<WorkspacePath, PathError> {
    if raw.trim().is_empty() {
        return Err(PathError::Empty);
    }
    if raw.contains('\0') {
        return Err(PathError::NulByte(raw.to_string()));
    }

    let root = normalize(root).ok_or_else(|| PathError::EscapesRoot(raw.to_string()))?;
    let candidate = Path::new(raw);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    let absolute = normalize(&joined).ok_or_else(|| PathError::EscapesRoot(raw.to_string()))?;

    let relative = absolute
        .strip_prefix(&root)
        .map_err(|_| PathError::EscapesRoot(raw.to_string()))?;
    let parts: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return Err(PathError::IsRoot(raw.to_string()));
    }

    Ok(WorkspacePath {
        relative: parts.join("/"),
        absolute,
    })
}

pub fn is_path_safe(root: &Path, raw: &str) -> bool {
    resolve_in_workspace(root, raw).is_ok()
}

/// Collapse `.` and `..` lexically. Returns `None` when `..` climbs above the start.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                out.pop();
                depth -= 1;
            }
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
        }
    }
    Some(out)
}
