//! `.scion/` layout and scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::core::action::Action;
use crate::core::memory::Memory;
use crate::core::queue::ActionQueue;
use crate::core::quota::QuotaState;
use crate::core::response::REASONER_OUTPUT_SCHEMA;
use crate::io::config::{AgentConfig, write_config};
use crate::io::store::{write_memory, write_queue, write_quota};

/// All canonical paths within `.scion/` for a workspace root.
#[derive(Debug, Clone)]
pub struct AgentPaths {
    pub root: PathBuf,
    pub agent_dir: PathBuf,
    pub state_dir: PathBuf,
    pub proposals_dir: PathBuf,
    pub reasoning_dir: PathBuf,
    pub config_path: PathBuf,
    pub queue_path: PathBuf,
    pub memory_path: PathBuf,
    pub quota_path: PathBuf,
    pub action_log_path: PathBuf,
    pub schema_path: PathBuf,
    pub gitignore_path: PathBuf,
}

impl AgentPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let agent_dir = root.join(".scion");
        let state_dir = agent_dir.join("state");
        Self {
            root: root.clone(),
            agent_dir: agent_dir.clone(),
            state_dir: state_dir.clone(),
            proposals_dir: agent_dir.join("proposals"),
            reasoning_dir: agent_dir.join("reasoning"),
            config_path: agent_dir.join("config.toml"),
            queue_path: state_dir.join("queue.json"),
            memory_path: state_dir.join("memory.json"),
            quota_path: state_dir.join("quota.json"),
            action_log_path: agent_dir.join("actions.log"),
            schema_path: agent_dir.join("reasoner_output.schema.json"),
            gitignore_path: agent_dir.join(".gitignore"),
        }
    }

    /// Directory for the `n`th reasoning call.
    pub fn reasoning_call_dir(&self, n: i64) -> PathBuf {
        self.reasoning_dir.join(n.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Overwrite existing agent-owned files.
    pub force: bool,
}

/// Create `.scion/` scaffolding in `root`.
///
/// Fails if `.scion/` already exists unless `options.force` is set.
pub fn init_agent(root: &Path, options: &InitOptions) -> Result<AgentPaths> {
    let paths = AgentPaths::new(root);
    if paths.agent_dir.exists() && !paths.agent_dir.is_dir() {
        return Err(anyhow!("scion init: .scion exists but is not a directory"));
    }
    if paths.agent_dir.exists() && !options.force {
        return Err(anyhow!(
            "scion init: .scion already exists (use --force to overwrite)"
        ));
    }

    for dir in [
        &paths.agent_dir,
        &paths.state_dir,
        &paths.proposals_dir,
        &paths.reasoning_dir,
    ] {
        fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    }

    let config = AgentConfig::default();
    write_config(&paths.config_path, &config)?;
    write_schema(&paths.schema_path)?;
    fs::write(&paths.gitignore_path, AGENT_GITIGNORE)
        .with_context(|| format!("write {}", paths.gitignore_path.display()))?;

    let mut queue = ActionQueue::new();
    queue.push_back(Action::reason(&config.starting_task, "initial task"));
    let mut memory = Memory::default();
    memory.todo_append_back(config.starting_task.as_str());
    write_queue(&paths.queue_path, &queue)?;
    write_memory(&paths.memory_path, &memory)?;
    write_quota(&paths.quota_path, &QuotaState::default())?;

    Ok(paths)
}

/// Write the reasoner output schema where the reasoner command can read it.
pub fn write_schema(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, REASONER_OUTPUT_SCHEMA)
        .with_context(|| format!("write schema {}", path.display()))
}

const AGENT_GITIGNORE: &str = "reasoning/\nstate/\n";
