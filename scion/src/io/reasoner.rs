//! Reasoning-service transport.
//!
//! The [`Reasoner`] trait decouples the loop from the actual backend (by
//! default `codex exec`). Tests use scripted reasoners that return
//! predetermined text without spawning processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::response::ResponseError;
use crate::io::config::ReasonerConfig;
use crate::io::process::{CommandOutput, run_command_with_timeout};

/// Parameters for one reasoning call.
#[derive(Debug, Clone)]
pub struct ReasonRequest {
    /// Working directory for the reasoner process.
    pub workdir: PathBuf,
    pub prompt: String,
    /// JSON Schema constraining the response envelope.
    pub output_schema_path: PathBuf,
    /// Where the reasoner must write its final message.
    pub output_path: PathBuf,
    pub log_path: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReasonError {
    #[error("reasoner transport failed: {0}")]
    Transport(String),
    #[error("reasoner rate limited: {0}")]
    RateLimited(String),
    #[error("reasoner timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed reasoner response: {0}")]
    Malformed(String),
    #[error("reasoner returned an empty response")]
    Empty,
}

impl ReasonError {
    /// Worth retrying after a pause.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ReasonError::Transport(_) | ReasonError::RateLimited(_) | ReasonError::Timeout(_)
        )
    }
}

impl From<ResponseError> for ReasonError {
    fn from(err: ResponseError) -> Self {
        match err {
            ResponseError::Empty => ReasonError::Empty,
            ResponseError::Malformed(msg) => ReasonError::Malformed(msg),
        }
    }
}

/// Abstraction over reasoning backends. Returns the raw response text.
pub trait Reasoner {
    fn reason(&self, request: &ReasonRequest) -> Result<String, ReasonError>;
}

/// Reasoner that spawns a configured command, prompt on stdin.
#[derive(Debug, Clone)]
pub struct CommandReasoner {
    command: Vec<String>,
}

impl CommandReasoner {
    pub fn new(command: Vec<String>) -> Result<Self> {
        if command.first().is_none_or(|program| program.trim().is_empty()) {
            return Err(anyhow!("reasoner command must be a non-empty array"));
        }
        Ok(Self { command })
    }

    /// Build from config. Fails when the credential variable is unset or empty.
    pub fn from_env(config: &ReasonerConfig) -> Result<Self> {
        match std::env::var(&config.credential_env) {
            Ok(value) if !value.trim().is_empty() => Self::new(config.command.clone()),
            _ => Err(anyhow!(
                "reasoner unavailable: environment variable {} is not set",
                config.credential_env
            )),
        }
    }

    fn build_command(&self, request: &ReasonRequest) -> Command {
        let expand = |arg: &str| {
            arg.replace("{schema}", &request.output_schema_path.to_string_lossy())
                .replace("{output}", &request.output_path.to_string_lossy())
        };
        let mut cmd = Command::new(expand(&self.command[0]));
        cmd.args(self.command[1..].iter().map(|arg| expand(arg)))
            .current_dir(&request.workdir);
        cmd
    }
}

impl Reasoner for CommandReasoner {
    #[instrument(skip_all, fields(timeout_secs = request.timeout.as_secs()))]
    fn reason(&self, request: &ReasonRequest) -> Result<String, ReasonError> {
        info!(program = %self.command[0], "calling reasoner");
        if let Some(parent) = request.output_path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                ReasonError::Transport(format!("create output dir {}: {err}", parent.display()))
            })?;
        }
        // A stale file from an earlier attempt must not be mistaken for a response.
        let _ = fs::remove_file(&request.output_path);

        let output = run_command_with_timeout(
            self.build_command(request),
            Some(request.prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
        )
        .map_err(|err| ReasonError::Transport(format!("{err:#}")))?;

        if let Err(err) = write_reasoner_log(&request.log_path, &output, request.output_limit_bytes)
        {
            warn!(error = %err, "failed to write reasoner log");
        }

        if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "reasoner timed out");
            return Err(ReasonError::Timeout(request.timeout));
        }
        if !output.status.success() {
            let stderr = output.stderr.text();
            warn!(exit_code = ?output.status.code(), "reasoner failed");
            return Err(classify_failure(output.status.code(), &stderr));
        }

        let text = match fs::read_to_string(&request.output_path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                // Commands that answer on stdout instead of the output file.
                output.stdout.text()
            }
            Err(err) => {
                return Err(ReasonError::Transport(format!(
                    "read {}: {err}",
                    request.output_path.display()
                )));
            }
        };
        if text.trim().is_empty() {
            return Err(ReasonError::Empty);
        }
        debug!(bytes = text.len(), "reasoner responded");
        Ok(text)
    }
}

fn classify_failure(code: Option<i32>, stderr: &str) -> ReasonError {
    let lowered = stderr.to_ascii_lowercase();
    let summary = format!(
        "exit status {:?}: {}",
        code,
        stderr.lines().last().unwrap_or_default()
    );
    if lowered.contains("rate limit") || lowered.contains("429") {
        ReasonError::RateLimited(summary)
    } else {
        ReasonError::Transport(summary)
    }
}

fn write_reasoner_log(path: &Path, output: &CommandOutput, output_limit: usize) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create reasoner log dir {}", parent.display()))?;
    }
    let mut buf = String::new();
    buf.push_str("=== stdout ===\n");
    buf.push_str(&output.stdout.text());
    buf.push_str(&output.stdout.notice("reasoner", "stdout"));
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&output.stderr.text());
    buf.push_str(&output.stderr.notice("reasoner", "stderr"));
    if output.timed_out {
        buf.push_str("\n[reasoner timed out]\n");
    }

    if buf.len() > output_limit {
        let cut = floor_char_boundary(&buf, output_limit);
        let truncated = format!("{}\n[truncated {} bytes]\n", &buf[..cut], buf.len() - cut);
        fs::write(path, truncated)
            .with_context(|| format!("write reasoner log {}", path.display()))?;
        return Ok(());
    }

    fs::write(path, buf).with_context(|| format!("write reasoner log {}", path.display()))
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut cut = index.min(text.len());
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    cut
}
