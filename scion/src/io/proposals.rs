//! Review-gate proposals recorded under `.scion/proposals/`.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::core::protection::Proposal;

/// Write the rendered proposal to `dir` and return the file path.
///
/// Never overwrites an earlier proposal: a taken name gets a sequence suffix.
pub fn record_proposal(dir: &Path, proposal: &Proposal) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    let mut sequence = 0;
    let (path, mut file) = loop {
        let path = dir.join(proposal.file_name(sequence));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => break (path, file),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => sequence += 1,
            Err(err) => {
                return Err(err).with_context(|| format!("create proposal {}", path.display()));
            }
        }
    };
    file.write_all(proposal.render().as_bytes())
        .with_context(|| format!("write proposal {}", path.display()))?;
    info!(target_path = %proposal.target, proposal = %path.display(), "recorded proposal");
    Ok(path)
}
