//! Routes each non-reasoning action to its handler.
//!
//! Handlers return an observation string. Problems the agent can correct on
//! its own (an unsafe path, an unknown tool) are observations too;
//! only defects surface as `Err` and are recovered by the loop.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::core::action::{Action, TodoOp};
use crate::core::path::WorkspacePath;
use crate::core::protection::{Proposal, ProposalKind, ProtectionPolicy};
use crate::core::state::AgentState;
use crate::io::clock::Clock;
use crate::io::config::AgentConfig;
use crate::io::process::{run_command_with_timeout, shell_command};
use crate::io::proposals::record_proposal;
use crate::io::workspace::Workspace;
use crate::tools::{ToolContext, ToolRegistry};

pub struct Dispatcher<'a, C: Clock> {
    pub config: &'a AgentConfig,
    pub workspace: &'a Workspace,
    pub policy: &'a ProtectionPolicy,
    pub tools: &'a ToolRegistry,
    pub clock: &'a C,
    pub proposals_dir: &'a Path,
    /// Agent config file. Guarded against shell commands like protected files.
    pub config_path: &'a Path,
}

/// A protected file's bytes before a shell command ran (`None`: absent).
struct Guarded {
    target: String,
    absolute: PathBuf,
    before: Option<Vec<u8>>,
}

impl<C: Clock> Dispatcher<'_, C> {
    pub fn dispatch(&self, state: &mut AgentState, action: Action) -> Result<String> {
        debug!(action = %action.summary(), "dispatching");
        match action {
            Action::NoOp { .. } => Ok("no-op".to_string()),
            Action::Think {
                label,
                thought,
                delete,
                ..
            } => Ok(self.think(state, &label, thought, delete)),
            Action::ReadFile { file_path, .. } => Ok(self.read_file(state, &file_path)),
            Action::WriteFile {
                file_path,
                contents,
                use_scratch_label,
                explanation,
            } => self.write_file(
                state,
                &file_path,
                contents,
                use_scratch_label.as_deref(),
                explanation,
            ),
            Action::DeleteFile {
                file_path,
                explanation,
            } => self.delete_file(state, &file_path, explanation),
            Action::RunTool {
                module_ref,
                tool_name,
                arguments,
                ..
            } => Ok(self.run_tool(state, &module_ref, &tool_name, &arguments)),
            Action::RunCommand {
                command,
                timeout_secs,
                explanation,
            } => self.run_command(state, &command, timeout_secs, &explanation),
            Action::UpdateTodo { op, item, .. } => self.update_todo(state, op, item),
            Action::Slumber { seconds, .. } => {
                self.clock.sleep(Duration::from_secs(seconds));
                Ok(format!("slept {seconds}s"))
            }
            Action::Reason { .. } | Action::Terminate { .. } => Err(anyhow!(
                "{} must be handled by the loop, not the dispatcher",
                action.kind().tag()
            )),
        }
    }

    fn think(&self, state: &mut AgentState, label: &str, thought: String, delete: bool) -> String {
        if delete {
            if state.memory.delete_thought(label) {
                format!("deleted thought '{label}'")
            } else {
                format!("no thought labelled '{label}' to delete")
            }
        } else {
            let bytes = thought.len();
            state.memory.set_thought(label, thought);
            format!("stored thought '{label}' ({bytes} bytes)")
        }
    }

    fn resolve(&self, raw: &str) -> Result<WorkspacePath, String> {
        self.workspace.resolve(raw).map_err(|err| {
            warn!(path = %raw, error = %err, "rejected unsafe path");
            format!("refused: {err}")
        })
    }

    fn read_file(&self, state: &mut AgentState, raw: &str) -> String {
        let path = match self.resolve(raw) {
            Ok(path) => path,
            Err(observation) => return observation,
        };
        if !state.memory.is_tracked(&path.relative) {
            return format!("refused: '{}' is not a tracked file", path.relative);
        }
        match self.workspace.read(&path) {
            Ok(contents) => {
                let bytes = contents.len();
                state.memory.set_file_contents(&path.relative, contents);
                format!("read {bytes} bytes from {}", path.relative)
            }
            Err(err) => format!("read failed: {err:#}"),
        }
    }

    fn write_file(
        &self,
        state: &mut AgentState,
        raw: &str,
        contents: String,
        scratch_label: Option<&str>,
        explanation: String,
    ) -> Result<String> {
        let contents = match scratch_label {
            Some(label) => match state.memory.thought(label) {
                Some(text) => text.to_string(),
                None => return Ok(format!("refused: no thought labelled '{label}'")),
            },
            None => contents,
        };
        let path = match self.resolve(raw) {
            Ok(path) => path,
            Err(observation) => return Ok(observation),
        };

        if self.is_protected(&path) {
            return self.propose(ProposalKind::Modification, &path.relative, contents, explanation);
        }

        match self.workspace.write(&path, &contents) {
            Ok(()) => {
                let bytes = contents.len();
                state.memory.set_file_contents(&path.relative, contents);
                Ok(format!("wrote {bytes} bytes to {}", path.relative))
            }
            Err(err) => Ok(format!("write failed: {err:#}")),
        }
    }

    fn delete_file(
        &self,
        state: &mut AgentState,
        raw: &str,
        explanation: String,
    ) -> Result<String> {
        let path = match self.resolve(raw) {
            Ok(path) => path,
            Err(observation) => return Ok(observation),
        };
        if !state.memory.is_tracked(&path.relative) {
            return Ok(format!("refused: '{}' is not a tracked file", path.relative));
        }
        if self.is_protected(&path) {
            let current = state
                .memory
                .file_contents(&path.relative)
                .unwrap_or_default()
                .to_string();
            return self.propose(ProposalKind::Deletion, &path.relative, current, explanation);
        }

        match self.workspace.delete(&path) {
            Ok(()) => {
                state.memory.forget_file(&path.relative);
                Ok(format!("deleted {}", path.relative))
            }
            Err(err) if !path.absolute.exists() => {
                state.memory.forget_file(&path.relative);
                Ok(format!("{} was already gone: {err:#}", path.relative))
            }
            Err(err) => Ok(format!("delete failed: {err:#}")),
        }
    }

    /// Protected by name, or by what the name points at through symlinks.
    fn is_protected(&self, path: &WorkspacePath) -> bool {
        self.policy.is_protected(&path.relative)
            || self
                .workspace
                .real_relative(path)
                .is_some_and(|real| self.policy.is_protected(&real))
    }

    fn propose(
        &self,
        kind: ProposalKind,
        target: &str,
        content: String,
        explanation: String,
    ) -> Result<String> {
        let proposal = Proposal {
            kind,
            target: target.to_string(),
            content,
            explanation,
            created_at: self.clock.now(),
        };
        let recorded = record_proposal(self.proposals_dir, &proposal)?;
        info!(target_path = %target, "protected file change turned into a proposal");
        Ok(format!(
            "{}(recorded at {})",
            proposal.render(),
            recorded.display()
        ))
    }

    fn run_tool(
        &self,
        state: &mut AgentState,
        module_ref: &str,
        tool_name: &str,
        arguments: &Map<String, Value>,
    ) -> String {
        let factory = match self.tools.lookup(module_ref, tool_name) {
            Ok(factory) => factory,
            Err(err) => return format!("refused: {err}"),
        };
        let output = {
            let ctx = ToolContext {
                memory: &state.memory,
                quota: &state.quota,
                config: self.config,
                workspace_root: self.workspace.root(),
            };
            factory(ctx).run(arguments)
        };
        match output {
            Ok(output) => {
                let label = &self.config.tool_output_label;
                state.memory.set_thought(label, output.as_str());
                format!("{module_ref}::{tool_name} output stored in thought '{label}': {output}")
            }
            Err(err) => format!("{module_ref}::{tool_name} failed: {err:#}"),
        }
    }

    fn run_command(
        &self,
        state: &mut AgentState,
        command: &str,
        timeout_secs: Option<u64>,
        explanation: &str,
    ) -> Result<String> {
        let settings = &self.config.commands;
        if !settings.enabled {
            return Ok("refused: shell commands are disabled".to_string());
        }
        let guarded = self.snapshot_protected()?;
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(settings.timeout_secs));
        let cmd = shell_command(command, self.workspace.root());
        let output = match run_command_with_timeout(cmd, None, timeout, settings.output_limit_bytes)
        {
            Ok(output) => output,
            Err(err) => return Ok(format!("command failed to start: {err:#}")),
        };

        let transcript = output.render("command");
        let label = &self.config.command_output_label;
        state.memory.set_thought(label, transcript.as_str());
        let reason = if explanation.is_empty() {
            format!("shell command `{command}`")
        } else {
            format!("shell command `{command}`: {explanation}")
        };
        let reverted = self.revert_protected(guarded, &reason)?;
        // The command may have created or removed files.
        state.memory.seed_files(self.workspace.scan()?);

        let mut observation = format!(
            "command: {}; output stored in thought '{label}'",
            output.status_line()
        );
        if !reverted.is_empty() {
            warn!(files = ?reverted, "shell command touched protected files; reverted");
            observation.push_str(&format!(
                "\nreverted protected files: {} (changes recorded as proposals)",
                reverted.join(", ")
            ));
        }
        Ok(observation)
    }

    /// Bytes of every protected workspace file plus the agent config.
    fn snapshot_protected(&self) -> Result<Vec<Guarded>> {
        let mut guarded = Vec::new();
        for relative in self.workspace.scan()? {
            if self.policy.is_protected(&relative) {
                let absolute = self.workspace.root().join(&relative);
                let before = read_if_present(&absolute)?;
                guarded.push(Guarded {
                    target: relative,
                    absolute,
                    before,
                });
            }
        }
        let config_target = self
            .config_path
            .strip_prefix(self.workspace.root())
            .unwrap_or(self.config_path)
            .to_string_lossy()
            .into_owned();
        guarded.push(Guarded {
            target: config_target,
            absolute: self.config_path.to_path_buf(),
            before: read_if_present(self.config_path)?,
        });
        Ok(guarded)
    }

    /// Undo command changes to protected files, recording each as a proposal.
    /// Returns the targets that were reverted.
    fn revert_protected(&self, guarded: Vec<Guarded>, reason: &str) -> Result<Vec<String>> {
        let known: BTreeSet<String> = guarded.iter().map(|g| g.target.clone()).collect();
        let mut reverted = Vec::new();
        for entry in guarded {
            let after = read_if_present(&entry.absolute)?;
            if after == entry.before {
                continue;
            }
            let (kind, content) = match (&after, &entry.before) {
                (Some(now), _) => (ProposalKind::Modification, lossy(now)),
                (None, Some(old)) => (ProposalKind::Deletion, lossy(old)),
                (None, None) => continue,
            };
            match &entry.before {
                Some(bytes) => {
                    if let Some(parent) = entry.absolute.parent() {
                        fs::create_dir_all(parent).with_context(|| {
                            format!("recreate directory for {}", entry.target)
                        })?;
                    }
                    fs::write(&entry.absolute, bytes)
                        .with_context(|| format!("restore {}", entry.target))?;
                }
                None => fs::remove_file(&entry.absolute)
                    .with_context(|| format!("remove {}", entry.target))?,
            }
            self.propose(kind, &entry.target, content, reason.to_string())?;
            reverted.push(entry.target);
        }

        for relative in self.workspace.scan()? {
            if known.contains(&relative) || !self.policy.is_protected(&relative) {
                continue;
            }
            let absolute = self.workspace.root().join(&relative);
            let created = fs::read(&absolute).with_context(|| format!("read {relative}"))?;
            fs::remove_file(&absolute).with_context(|| format!("remove {relative}"))?;
            self.propose(
                ProposalKind::Modification,
                &relative,
                lossy(&created),
                reason.to_string(),
            )?;
            reverted.push(relative);
        }
        Ok(reverted)
    }

    fn update_todo(
        &self,
        state: &mut AgentState,
        op: TodoOp,
        item: Option<String>,
    ) -> Result<String> {
        let item = item.filter(|item| !item.trim().is_empty());
        match (op, item) {
            (TodoOp::InsertFront, Some(item)) => {
                let observation = format!("inserted todo at front: {item}");
                state.memory.todo_insert_front(item);
                Ok(observation)
            }
            (TodoOp::AppendBack, Some(item)) => {
                let observation = format!("appended todo: {item}");
                state.memory.todo_append_back(item);
                Ok(observation)
            }
            (TodoOp::InsertFront | TodoOp::AppendBack, None) => {
                Ok(format!("refused: {op:?} requires a non-empty item"))
            }
            (TodoOp::RemoveFront, _) => {
                let removed = state.memory.todo_remove_front()?;
                Ok(format!(
                    "completed todo: {removed} ({} remaining)",
                    state.memory.todo().len()
                ))
            }
        }
    }
}

fn read_if_present(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("read {}", path.display())),
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;

    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    use crate::core::memory::TodoError;
    use crate::io::config::WorkspaceConfig;

    #[derive(Default)]
    struct TestClock {
        slept: RefCell<Vec<Duration>>,
    }

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap()
        }

        fn sleep(&self, duration: Duration) {
            self.slept.borrow_mut().push(duration);
        }
    }

    struct Fixture {
        _temp: tempfile::TempDir,
        root: std::path::PathBuf,
        config: AgentConfig,
        workspace: Workspace,
        policy: ProtectionPolicy,
        tools: ToolRegistry,
        clock: TestClock,
        proposals_dir: std::path::PathBuf,
        config_path: std::path::PathBuf,
        state: AgentState,
    }

    impl Fixture {
        fn new(protected: &[&str]) -> Self {
            let temp = tempfile::tempdir().expect("tempdir");
            let workspace =
                Workspace::open(temp.path(), &WorkspaceConfig::default()).expect("workspace");
            let root = workspace.root().to_path_buf();
            let protected: Vec<String> = protected.iter().map(|p| p.to_string()).collect();
            Self {
                proposals_dir: root.join(".scion/proposals"),
                config_path: root.join(".scion/config.toml"),
                root,
                _temp: temp,
                config: AgentConfig::default(),
                policy: ProtectionPolicy::new(&protected, &[]),
                workspace,
                tools: ToolRegistry::with_builtins(),
                clock: TestClock::default(),
                state: AgentState::default(),
            }
        }

        fn dispatch(&mut self, action: Action) -> Result<String> {
            let dispatcher = Dispatcher {
                config: &self.config,
                workspace: &self.workspace,
                policy: &self.policy,
                tools: &self.tools,
                clock: &self.clock,
                proposals_dir: &self.proposals_dir,
                config_path: &self.config_path,
            };
            dispatcher.dispatch(&mut self.state, action)
        }
    }

    fn write(path: &str, contents: &str) -> Action {
        Action::WriteFile {
            file_path: path.to_string(),
            contents: contents.to_string(),
            use_scratch_label: None,
            explanation: "update".to_string(),
        }
    }

    fn read(path: &str) -> Action {
        Action::ReadFile {
            file_path: path.to_string(),
            explanation: String::new(),
        }
    }

    #[test]
    fn protected_write_never_touches_disk() {
        let mut fx = Fixture::new(&["core"]);
        fs::create_dir_all(fx.root.join("core")).expect("mkdir");
        fs::write(fx.root.join("core/agent.rs"), "original").expect("write");

        let body = "fn main() {\n    println!(\"new\");\n}\n";
        let observation = fx.dispatch(write("core/agent.rs", body)).expect("dispatch");

        assert_eq!(
            fs::read_to_string(fx.root.join("core/agent.rs")).expect("read"),
            "original"
        );
        assert!(observation.contains("ACTION PROPOSAL: CORE FILE MODIFICATION"));
        assert!(observation.contains(&format!(
            "--- PROPOSED CONTENT START ---\n{body}--- PROPOSED CONTENT END ---"
        )));
        let recorded: Vec<_> = fs::read_dir(&fx.proposals_dir)
            .expect("proposals")
            .collect();
        assert_eq!(recorded.len(), 1);
        assert!(!fx.state.memory.is_tracked("core/agent.rs"));
    }

    #[test]
    fn write_then_read_tracks_and_caches() {
        let mut fx = Fixture::new(&[]);
        let observation = fx.dispatch(write("notes/a.md", "hello")).expect("write");
        assert_eq!(observation, "wrote 5 bytes to notes/a.md");
        assert_eq!(fx.state.memory.file_contents("notes/a.md"), Some("hello"));

        fs::write(fx.root.join("notes/a.md"), "changed").expect("write");
        fx.dispatch(read("notes/a.md")).expect("read");
        assert_eq!(fx.state.memory.file_contents("notes/a.md"), Some("changed"));
    }

    #[test]
    fn unsafe_and_untracked_paths_are_observations() {
        let mut fx = Fixture::new(&[]);
        let observation = fx.dispatch(read("../../etc/passwd")).expect("dispatch");
        assert!(observation.starts_with("refused:"));

        let observation = fx.dispatch(write("/etc/passwd", "x")).expect("dispatch");
        assert!(observation.starts_with("refused:"));

        fs::write(fx.root.join("loose.txt"), "x").expect("write");
        let observation = fx.dispatch(read("loose.txt")).expect("dispatch");
        assert_eq!(observation, "refused: 'loose.txt' is not a tracked file");
    }

    #[test]
    fn write_from_scratch_label_uses_thought_text() {
        let mut fx = Fixture::new(&[]);
        fx.state.memory.set_thought("draft", "from scratch");
        let action = Action::WriteFile {
            file_path: "out.txt".to_string(),
            contents: String::new(),
            use_scratch_label: Some("draft".to_string()),
            explanation: String::new(),
        };
        fx.dispatch(action).expect("dispatch");
        assert_eq!(
            fs::read_to_string(fx.root.join("out.txt")).expect("read"),
            "from scratch"
        );
    }

    #[test]
    fn delete_requires_tracking_and_respects_protection() {
        let mut fx = Fixture::new(&["keep.txt"]);
        fs::write(fx.root.join("gone.txt"), "x").expect("write");
        fs::write(fx.root.join("keep.txt"), "y").expect("write");
        fx.state.memory.seed_files(["gone.txt", "keep.txt"]);

        let delete = |path: &str| Action::DeleteFile {
            file_path: path.to_string(),
            explanation: String::new(),
        };
        assert_eq!(fx.dispatch(delete("gone.txt")).expect("delete"), "deleted gone.txt");
        assert!(!fx.root.join("gone.txt").exists());
        assert!(!fx.state.memory.is_tracked("gone.txt"));

        let observation = fx.dispatch(delete("keep.txt")).expect("delete");
        assert!(observation.contains("CORE FILE DELETION"));
        assert!(fx.root.join("keep.txt").exists());
    }

    #[test]
    fn think_sets_and_deletes() {
        let mut fx = Fixture::new(&[]);
        let think = |delete: bool| Action::Think {
            label: "plan".to_string(),
            thought: "step 1".to_string(),
            delete,
            explanation: String::new(),
        };
        fx.dispatch(think(false)).expect("think");
        assert_eq!(fx.state.memory.thought("plan"), Some("step 1"));
        fx.dispatch(think(true)).expect("think");
        assert_eq!(fx.state.memory.thought("plan"), None);
    }

    #[test]
    fn run_tool_stores_output_or_reports_unknown_tool() {
        let mut fx = Fixture::new(&[]);
        let mut arguments = Map::new();
        arguments.insert("text".to_string(), json!("ping"));
        let action = Action::RunTool {
            module_ref: "builtin".to_string(),
            tool_name: "echo".to_string(),
            arguments,
            explanation: String::new(),
        };
        fx.dispatch(action).expect("tool");
        assert_eq!(fx.state.memory.thought("tool_output"), Some("ping"));

        let action = Action::RunTool {
            module_ref: "plugins".to_string(),
            tool_name: "diff".to_string(),
            arguments: Map::new(),
            explanation: String::new(),
        };
        let observation = fx.dispatch(action).expect("tool");
        assert!(observation.starts_with("refused: unknown tool module 'plugins'"));
    }

    #[cfg(unix)]
    #[test]
    fn run_command_captures_output_and_rescans() {
        let mut fx = Fixture::new(&[]);
        fx.config.commands.enabled = true;
        let action = Action::RunCommand {
            command: "echo made > made.txt; echo done".to_string(),
            timeout_secs: None,
            explanation: String::new(),
        };
        let observation = fx.dispatch(action).expect("command");
        assert!(observation.starts_with("command: exit code 0"));
        assert!(
            fx.state
                .memory
                .thought("command_output")
                .is_some_and(|out| out.contains("done"))
        );
        assert!(fx.state.memory.is_tracked("made.txt"));
    }

    #[test]
    fn commands_are_refused_by_default() {
        let mut fx = Fixture::new(&[]);
        let action = Action::RunCommand {
            command: "true".to_string(),
            timeout_secs: None,
            explanation: String::new(),
        };
        assert_eq!(
            fx.dispatch(action).expect("command"),
            "refused: shell commands are disabled"
        );
    }

    #[test]
    fn todo_updates() {
        let mut fx = Fixture::new(&[]);
        let update = |op: TodoOp, item: Option<&str>| Action::UpdateTodo {
            op,
            item: item.map(str::to_string),
            explanation: String::new(),
        };

        fx.dispatch(update(TodoOp::AppendBack, Some("b"))).expect("append");
        fx.dispatch(update(TodoOp::InsertFront, Some("a"))).expect("insert");
        let observation = fx.dispatch(update(TodoOp::AppendBack, None)).expect("missing item");
        assert!(observation.starts_with("refused:"));
        assert_eq!(fx.state.memory.todo().len(), 2);

        fx.dispatch(update(TodoOp::RemoveFront, None)).expect("remove");
        fx.dispatch(update(TodoOp::RemoveFront, None)).expect("remove");
        let err = fx.dispatch(update(TodoOp::RemoveFront, None)).unwrap_err();
        assert_eq!(err.downcast_ref::<TodoError>(), Some(&TodoError::Empty));
    }

    #[test]
    fn slumber_uses_injected_clock() {
        let mut fx = Fixture::new(&[]);
        fx.dispatch(Action::slumber(7, "")).expect("slumber");
        assert_eq!(*fx.clock.slept.borrow(), vec![Duration::from_secs(7)]);
    }

    #[test]
    fn loop_level_actions_are_rejected() {
        let mut fx = Fixture::new(&[]);
        assert!(fx.dispatch(Action::reason("x", "")).is_err());
        assert!(fx.dispatch(Action::terminate("")).is_err());
    }
    #[test]
    fn command_edits_to_protected_files_become_proposals() {
        let mut fx = Fixture::new(&["scion.toml", "core"]);
        fx.config.commands.enabled = true;
        fs::write(fx.root.join("scion.toml"), "limit = 1\n").expect("write");
        fs::create_dir_all(fx.root.join(".scion")).expect("mkdir");
        fs::write(&fx.config_path, "max_reason_calls_per_day = 5\n").expect("config");

        let action = Action::RunCommand {
            command: "echo hacked > scion.toml; echo 999 >> .scion/config.toml; \
                      mkdir core; echo new > core/extra.rs; echo fine > notes.md"
                .to_string(),
            timeout_secs: None,
            explanation: "tune limits".to_string(),
        };
        let observation = fx.dispatch(action).expect("command");

        assert!(observation.starts_with("command: exit code 0"), "{observation}");
        assert!(observation.contains("reverted protected files"), "{observation}");
        assert_eq!(
            fs::read_to_string(fx.root.join("scion.toml")).expect("read"),
            "limit = 1\n"
        );
        assert_eq!(
            fs::read_to_string(&fx.config_path).expect("config"),
            "max_reason_calls_per_day = 5\n"
        );
        assert!(!fx.root.join("core/extra.rs").exists());
        assert_eq!(
            fs::read_to_string(fx.root.join("notes.md")).expect("notes"),
            "fine\n"
        );

        let recorded: Vec<String> = fs::read_dir(&fx.proposals_dir)
            .expect("proposals")
            .map(|entry| fs::read_to_string(entry.expect("entry").path()).expect("proposal"))
            .collect();
        assert_eq!(recorded.len(), 3);
        assert!(recorded.iter().any(|p| p.contains("TARGET: scion.toml") && p.contains("hacked")));
        assert!(recorded.iter().any(|p| p.contains("TARGET: .scion/config.toml")));
        assert!(recorded.iter().any(|p| p.contains("TARGET: core/extra.rs")));
        assert!(!fx.state.memory.is_tracked("core/extra.rs"));
        assert!(fx.state.memory.is_tracked("notes.md"));
    }

    #[cfg(unix)]
    #[test]
    fn write_through_symlink_to_protected_file_is_proposed() {
        let mut fx = Fixture::new(&["scion.toml"]);
        fs::write(fx.root.join("scion.toml"), "original").expect("write");
        std::os::unix::fs::symlink(fx.root.join("scion.toml"), fx.root.join("alias"))
            .expect("symlink");

        let observation = fx.dispatch(write("alias", "replaced")).expect("dispatch");

        assert!(observation.contains("ACTION PROPOSAL: CORE FILE MODIFICATION"));
        assert_eq!(
            fs::read_to_string(fx.root.join("scion.toml")).expect("read"),
            "original"
        );
    }
}
