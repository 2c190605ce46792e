//! Append-only action log at `.scion/actions.log`.
//!
//! One line per dispatched action:
//! `[<rfc3339>] <TAG> <args-json> :: <explanation> => <observation>`.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::core::action::Action;

/// Observations longer than this many characters are cut in the log line.
const OBSERVATION_LIMIT_CHARS: usize = 240;
/// Argument JSON is cut too; `WRITE_FILE` contents can be large.
const ARGUMENTS_LIMIT_CHARS: usize = 400;
/// First window read from the end of the log by `tail`; doubled until enough lines fit.
const TAIL_WINDOW_BYTES: u64 = 16 * 1024;

#[derive(Debug, Clone)]
pub struct ActionLog {
    path: PathBuf,
}

impl ActionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and return the line that was written.
    pub fn append(&self, at: DateTime<Utc>, action: &Action, observation: &str) -> Result<String> {
        let line = format_entry(at, action, observation);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open action log {}", self.path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("append action log {}", self.path.display()))?;
        Ok(line)
    }

    /// Last `lines` lines of the log; empty when the log does not exist yet.
    ///
    /// Reads backwards from the end, so the cost follows `lines`, not the log size.
    pub fn tail(&self, lines: usize) -> Result<Vec<String>> {
        if lines == 0 || !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut file = File::open(&self.path)
            .with_context(|| format!("open action log {}", self.path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("stat action log {}", self.path.display()))?
            .len();
        let mut window = TAIL_WINDOW_BYTES.min(len);
        loop {
            file.seek(SeekFrom::Start(len - window))
                .with_context(|| format!("seek action log {}", self.path.display()))?;
            let mut buf = Vec::new();
            std::io::Read::by_ref(&mut file)
                .take(window)
                .read_to_end(&mut buf)
                .with_context(|| format!("read action log {}", self.path.display()))?;
            let text = String::from_utf8_lossy(&buf);
            let mut found: Vec<&str> = text.lines().collect();
            let whole_file = window == len;
            if !whole_file && !found.is_empty() {
                // The window may start mid-line.
                found.remove(0);
            }
            if whole_file || found.len() >= lines {
                let skip = found.len().saturating_sub(lines);
                return Ok(found[skip..].iter().map(|line| line.to_string()).collect());
            }
            window = (window * 2).min(len);
        }
    }
}

pub fn format_entry(at: DateTime<Utc>, action: &Action, observation: &str) -> String {
    let arguments = action.arguments_json().to_string();
    format!(
        "[{}] {} {} :: {} => {}",
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
        action.kind().tag(),
        one_line(&arguments, ARGUMENTS_LIMIT_CHARS),
        one_line(action.explanation(), OBSERVATION_LIMIT_CHARS),
        one_line(observation, OBSERVATION_LIMIT_CHARS),
    )
}

fn one_line(text: &str, limit: usize) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= limit {
        return flattened;
    }
    let mut cut: String = flattened.chars().take(limit).collect();
    cut.push_str("...");
    cut
}
