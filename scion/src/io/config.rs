//! Agent configuration stored under `.scion/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::budget::ReasonLimits;

/// Agent configuration (TOML).
///
/// Edited by humans. Missing fields take the defaults below; the whole
/// struct is built once at startup and passed by reference everywhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Task used when the queue is empty and the todo list has nothing to offer.
    pub starting_task: String,

    /// Ceiling on reasoning steps within a single `scion run`.
    pub max_reason_steps_per_run: u32,

    /// Daily quota of reasoning calls (resets when the UTC date advances).
    pub max_reason_calls_per_day: u32,

    /// Number of action-log lines mirrored into memory and sent to the reasoner.
    pub log_tail_lines: usize,

    /// Pause inserted before retrying a reasoning call that failed transiently.
    pub retry_pause_secs: u64,

    /// Scratchpad label receiving tool output.
    pub tool_output_label: String,

    /// Scratchpad label receiving shell command output.
    pub command_output_label: String,

    pub reasoner: ReasonerConfig,
    pub protection: ProtectionConfig,
    pub commands: CommandsConfig,
    pub workspace: WorkspaceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReasonerConfig {
    /// Command line for the reasoning service. `{schema}` and `{output}` are
    /// replaced with the schema path and the expected output file path.
    pub command: Vec<String>,

    /// Environment variable that must be set for the reasoner to be available.
    pub credential_env: String,

    pub timeout_secs: u64,

    /// Truncate reasoner stdout/stderr logs beyond this many bytes.
    pub output_limit_bytes: usize,

    pub prompt_budget_bytes: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProtectionConfig {
    /// Path prefixes that require review before modification.
    pub protected: Vec<String>,
    /// Prefixes exempted from `protected`.
    pub allowed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandsConfig {
    /// Off unless opted in. Command edits to protected files are reverted
    /// into proposals, but commands are not confined to the workspace.
    pub enabled: bool,
    pub timeout_secs: u64,
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory names skipped by the startup scan (hidden directories are always skipped).
    pub ignore: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            starting_task: "Review the todo list and plan the next step.".to_string(),
            max_reason_steps_per_run: 50,
            max_reason_calls_per_day: 100,
            log_tail_lines: 20,
            retry_pause_secs: 60,
            tool_output_label: "tool_output".to_string(),
            command_output_label: "command_output".to_string(),
            reasoner: ReasonerConfig::default(),
            protection: ProtectionConfig {
                protected: vec!["scion.toml".to_string()],
                allowed: Vec::new(),
            },
            commands: CommandsConfig::default(),
            workspace: WorkspaceConfig::default(),
        }
    }
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            command: [
                "codex",
                "exec",
                "--skip-git-repo-check",
                "--output-schema",
                "{schema}",
                "--output-last-message",
                "{output}",
                "-",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            credential_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 600,
            output_limit_bytes: 200_000,
            prompt_budget_bytes: 60_000,
        }
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: 10,
            output_limit_bytes: 20_000,
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            ignore: vec![
                ".git".to_string(),
                "target".to_string(),
                "node_modules".to_string(),
            ],
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.starting_task.trim().is_empty() {
            return Err(anyhow!("starting_task must not be empty"));
        }
        if self.tool_output_label.trim().is_empty() || self.command_output_label.trim().is_empty()
        {
            return Err(anyhow!("scratchpad output labels must not be empty"));
        }
        if self.reasoner.command.is_empty() || self.reasoner.command[0].trim().is_empty() {
            return Err(anyhow!("reasoner.command must be a non-empty array"));
        }
        if self.reasoner.timeout_secs == 0 {
            return Err(anyhow!("reasoner.timeout_secs must be > 0"));
        }
        if self.reasoner.output_limit_bytes == 0 {
            return Err(anyhow!("reasoner.output_limit_bytes must be > 0"));
        }
        if self.reasoner.prompt_budget_bytes == 0 {
            return Err(anyhow!("reasoner.prompt_budget_bytes must be > 0"));
        }
        if self.commands.timeout_secs == 0 {
            return Err(anyhow!("commands.timeout_secs must be > 0"));
        }
        if self.commands.output_limit_bytes == 0 {
            return Err(anyhow!("commands.output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn reason_limits(&self) -> ReasonLimits {
        ReasonLimits {
            max_steps_per_run: self.max_reason_steps_per_run,
            max_calls_per_day: self.max_reason_calls_per_day,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    crate::io::store::write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AgentConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = AgentConfig {
            max_reason_calls_per_day: 7,
            ..AgentConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "max_reason_steps_per_run = 3\n\n[protection]\nprotected = [\"src\"]\n",
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_reason_steps_per_run, 3);
        assert_eq!(cfg.protection.protected, vec!["src".to_string()]);
        assert_eq!(cfg.commands, CommandsConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[reasoner]\ncommand = []\n").expect("write");
        assert!(load_config(&path).is_err());
    }
}
