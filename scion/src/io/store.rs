//! Durable JSON stores for the queue, memory and quota under `.scion/state/`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::memory::Memory;
use crate::core::queue::ActionQueue;
use crate::core::quota::QuotaState;
use crate::core::state::AgentState;
use crate::io::init::AgentPaths;

/// Load the action queue. A missing file yields an empty queue.
///
/// Entries with unknown tags or invalid fields are logged and skipped.
pub fn load_queue(path: &Path) -> Result<ActionQueue> {
    debug!(path = %path.display(), "loading queue");
    let Some(value) = read_json::<Value>(path)? else {
        return Ok(ActionQueue::new());
    };
    let Value::Array(items) = value else {
        return Err(anyhow!("queue {} is not a JSON array", path.display()));
    };
    let (queue, rejected) = ActionQueue::from_values(items);
    for (index, err) in &rejected {
        warn!(path = %path.display(), index, error = %err, "dropping unreadable queued action");
    }
    debug!(len = queue.len(), dropped = rejected.len(), "queue loaded");
    Ok(queue)
}

pub fn write_queue(path: &Path, queue: &ActionQueue) -> Result<()> {
    debug!(path = %path.display(), len = queue.len(), "writing queue");
    write_json(path, queue)
}

/// Load memory. A missing file yields empty memory.
pub fn load_memory(path: &Path) -> Result<Memory> {
    debug!(path = %path.display(), "loading memory");
    let memory = read_json::<Memory>(path)?.unwrap_or_default();
    debug!(
        files = memory.files.len(),
        thoughts = memory.thoughts.len(),
        todo = memory.todo.len(),
        "memory loaded"
    );
    Ok(memory)
}

pub fn write_memory(path: &Path, memory: &Memory) -> Result<()> {
    debug!(path = %path.display(), "writing memory");
    write_json(path, memory)
}

pub fn load_quota(path: &Path) -> Result<QuotaState> {
    Ok(read_json::<QuotaState>(path)?.unwrap_or_default())
}

pub fn write_quota(path: &Path, quota: &QuotaState) -> Result<()> {
    debug!(path = %path.display(), "writing quota");
    write_json(path, quota)
}

/// Load queue, memory and quota from `.scion/state/`.
pub fn load_state(paths: &AgentPaths) -> Result<AgentState> {
    Ok(AgentState {
        queue: load_queue(&paths.queue_path)?,
        memory: load_memory(&paths.memory_path)?,
        quota: load_quota(&paths.quota_path)?,
    })
}

/// Flush all three stores. Each file is replaced atomically.
pub fn save_state(paths: &AgentPaths, state: &AgentState) -> Result<()> {
    write_queue(&paths.queue_path, &state.queue)?;
    write_memory(&paths.memory_path, &state.memory)?;
    write_quota(&paths.quota_path, &state.quota)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let value =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(value))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Write `contents` to a sibling temp file, then rename over `path`.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let extension = path
        .extension()
        .map(|ext| format!("{}.tmp", ext.to_string_lossy()))
        .unwrap_or_else(|| "tmp".to_string());
    let tmp_path = path.with_extension(extension);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
