//! Filesystem access confined to the workspace root.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::core::path::{PathError, WorkspacePath, resolve_in_workspace};
use crate::io::config::WorkspaceConfig;

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    ignore: Vec<String>,
}

impl Workspace {
    /// Open a workspace. The root is canonicalized so later containment checks
    /// compare resolved paths.
    pub fn open(root: &Path, config: &WorkspaceConfig) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("resolve workspace root {}", root.display()))?;
        Ok(Self {
            root,
            ignore: config.ignore.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List every regular file as a `/`-separated relative path.
    ///
    /// Hidden directories and configured ignore names are skipped.
    pub fn scan(&self) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_skipped_dir(entry));
        for entry in walker {
            let entry = entry.with_context(|| format!("scan {}", self.root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                paths.push(slash_path(relative));
            }
        }
        debug!(files = paths.len(), "workspace scanned");
        Ok(paths)
    }

    fn is_skipped_dir(&self, entry: &DirEntry) -> bool {
        if !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.') || self.ignore.iter().any(|ignored| ignored.as_str() == name.as_ref())
    }

    /// Resolve an agent-supplied path, rejecting lexical and symlink escapes.
    pub fn resolve(&self, raw: &str) -> Result<WorkspacePath, PathError> {
        let resolved = resolve_in_workspace(&self.root, raw)?;
        if let Some(ancestor) = deepest_existing(&resolved.absolute) {
            let real = ancestor
                .canonicalize()
                .map_err(|_| PathError::EscapesRoot(raw.to_string()))?;
            if !real.starts_with(&self.root) {
                return Err(PathError::EscapesRoot(raw.to_string()));
            }
        }
        Ok(resolved)
    }

    /// Relative path of what `path` actually names once symlinks are followed.
    ///
    /// `None` when it resolves outside the root or cannot be resolved.
    pub fn real_relative(&self, path: &WorkspacePath) -> Option<String> {
        let ancestor = deepest_existing(&path.absolute)?;
        let rest = path.absolute.strip_prefix(ancestor).ok()?;
        let real = ancestor.canonicalize().ok()?.join(rest);
        real.strip_prefix(&self.root).ok().map(slash_path)
    }

    pub fn read(&self, path: &WorkspacePath) -> Result<String> {
        fs::read_to_string(&path.absolute)
            .with_context(|| format!("read {}", path.relative))
    }

    /// Write `contents`, creating parent directories as needed.
    pub fn write(&self, path: &WorkspacePath, contents: &str) -> Result<()> {
        if let Some(parent) = path.absolute.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory for {}", path.relative))?;
        }
        fs::write(&path.absolute, contents).with_context(|| format!("write {}", path.relative))
    }

    pub fn delete(&self, path: &WorkspacePath) -> Result<()> {
        fs::remove_file(&path.absolute).with_context(|| format!("delete {}", path.relative))
    }
}

fn slash_path(relative: &Path) -> String {
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

fn deepest_existing(path: &Path) -> Option<&Path> {
    path.ancestors().find(|candidate| candidate.symlink_metadata().is_ok())
}
