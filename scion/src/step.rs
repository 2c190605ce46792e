//! One iteration of the agent loop: pop an action, run it, log it, persist.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, info, warn};

use crate::core::action::Action;
use crate::core::budget::{BudgetVerdict, REASON_STEPS_COUNTER, charge_reason_step};
use crate::core::continuation::{Continuation, ensure_continuation};
use crate::core::protection::ProtectionPolicy;
use crate::core::quota::REASON_RESOURCE;
use crate::core::response::parse_response;
use crate::core::state::AgentState;
use crate::core::termination::{LoopState, schedule_termination};
use crate::dispatch::Dispatcher;
use crate::io::action_log::ActionLog;
use crate::io::clock::Clock;
use crate::io::config::{AgentConfig, load_config};
use crate::io::init::{AgentPaths, write_schema};
use crate::io::prompt::{PromptInputs, build_prompt};
use crate::io::reasoner::{ReasonError, ReasonRequest, Reasoner};
use crate::io::store::{load_state, save_state};
use crate::io::workspace::Workspace;
use crate::looping::LoopStop;
use crate::tools::ToolRegistry;

/// Memory counter numbering the `.scion/reasoning/<n>/` directories.
pub const REASON_CALLS_COUNTER: &str = "reason_calls";

/// Result of a single iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// The action popped from the queue front.
    pub action: Action,
    pub observation: String,
    /// Set when the loop must stop after this iteration.
    pub stop: Option<LoopStop>,
}

/// A workspace-bound agent: configuration, collaborators and live state.
pub struct Agent<R: Reasoner, C: Clock> {
    paths: AgentPaths,
    config: AgentConfig,
    workspace: Workspace,
    policy: ProtectionPolicy,
    tools: ToolRegistry,
    reasoner: Option<R>,
    clock: C,
    log: ActionLog,
    state: AgentState,
}

impl<R: Reasoner, C: Clock> Agent<R, C> {
    /// Load config and state for the workspace at `root`.
    ///
    /// `reasoner` is optional: without one the agent still runs every
    /// non-reasoning action and stops at the first `Reason`.
    pub fn open(root: &Path, reasoner: Option<R>, clock: C) -> Result<Self> {
        // Paths handed to the reasoner must not depend on the caller's cwd.
        let root = root
            .canonicalize()
            .with_context(|| format!("resolve workspace root {}", root.display()))?;
        let paths = AgentPaths::new(&root);
        let config = load_config(&paths.config_path)?;
        let workspace = Workspace::open(&root, &config.workspace)?;
        let policy = ProtectionPolicy::new(&config.protection.protected, &config.protection.allowed);
        let mut state = load_state(&paths).context("load agent state")?;
        state.memory.seed_files(workspace.scan()?);
        let log = ActionLog::new(&paths.action_log_path);

        let agent = Self {
            paths,
            config,
            workspace,
            policy,
            tools: ToolRegistry::with_builtins(),
            reasoner,
            clock,
            log,
            state,
        };
        agent.save()?;
        Ok(agent)
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn paths(&self) -> &AgentPaths {
        &self.paths
    }

    /// Reset the per-run step counter and roll the daily quota if needed.
    pub fn begin_run(&mut self) -> Result<()> {
        self.state.memory.set_counter(REASON_STEPS_COUNTER, 0);
        self.refresh_quota();
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        save_state(&self.paths, &self.state)
    }

    /// Run one iteration.
    ///
    /// Returns `Err` only for failures outside any action handler (state
    /// persistence, the action log). Handler failures are recovered here.
    pub fn step(&mut self) -> Result<StepOutcome> {
        self.refresh_quota();
        if self.state.queue.is_empty() {
            let task = self
                .state
                .memory
                .todo()
                .front()
                .cloned()
                .unwrap_or_else(|| self.config.starting_task.clone());
            info!(task = %task, "queue empty; scheduling a reasoning step");
            self.state
                .queue
                .push_back(Action::reason(task, "queue was empty"));
        }
        let todo_is_empty = self.state.memory.todo().is_empty();
        if schedule_termination(&mut self.state.queue, todo_is_empty) == LoopState::Terminated {
            debug!(queued = self.state.queue.len(), "todo list is empty; terminate is next");
        }
        self.save()?;

        let action = self
            .state
            .queue
            .pop_front()
            .ok_or_else(|| anyhow!("action queue is empty after scheduling"))?;
        self.save()?;
        debug!(action = %action.summary(), remaining = self.state.queue.len(), "popped action");
        self.execute(action)
    }

    /// Run `action`, append its log line and persist.
    ///
    /// `step` calls this with the popped queue front; it is public so a single
    /// action can be driven without going through the queue.
    pub fn execute(&mut self, action: Action) -> Result<StepOutcome> {
        let (observation, stop) = match &action {
            Action::Terminate { .. } => {
                info!("terminate action reached");
                ("terminating".to_string(), Some(LoopStop::Terminated))
            }
            Action::Reason {
                task,
                explanation,
                files_to_send,
                thoughts_to_send,
            } => self.reason(&action, task, explanation, files_to_send, thoughts_to_send)?,
            _ => (self.dispatch(action.clone()), None),
        };

        let now = self.clock.now();
        self.log.append(now, &action, &observation)?;
        let tail = self.log.tail(self.config.log_tail_lines)?;
        self.state
            .memory
            .set_recent_logs(tail, self.config.log_tail_lines);
        self.state.memory.mark_memorized(now);
        self.save()?;

        Ok(StepOutcome {
            action,
            observation,
            stop,
        })
    }

    fn refresh_quota(&mut self) {
        let today = self.clock.today();
        if self.state.quota.refresh(
            REASON_RESOURCE,
            today,
            self.config.max_reason_calls_per_day,
        ) {
            info!(%today, "daily reasoning quota reset");
        }
    }

    fn dispatch(&mut self, action: Action) -> String {
        let summary = action.summary();
        let dispatcher = Dispatcher {
            config: &self.config,
            workspace: &self.workspace,
            policy: &self.policy,
            tools: &self.tools,
            clock: &self.clock,
            proposals_dir: &self.paths.proposals_dir,
            config_path: &self.paths.config_path,
        };
        match dispatcher.dispatch(&mut self.state, action) {
            Ok(observation) => observation,
            Err(err) => {
                error!(action = %summary, error = ?err, "action failed; scheduling diagnosis");
                let task = self
                    .state
                    .memory
                    .active_task
                    .clone()
                    .unwrap_or_else(|| summary.clone());
                let cause = format!("{summary} failed: {err:#}");
                self.schedule_diagnosis(&task, &cause);
                format!("error: {err:#}")
            }
        }
    }

    /// Push a debug `Reason` to the queue front and put `task` back on the todo list.
    fn schedule_diagnosis(&mut self, task: &str, cause: &str) {
        self.state
            .queue
            .push_front(Action::debug_reason(task, cause));
        self.state.memory.todo_insert_front(task);
    }

    fn reason(
        &mut self,
        action: &Action,
        task: &str,
        explanation: &str,
        files_to_send: &[String],
        thoughts_to_send: &[String],
    ) -> Result<(String, Option<LoopStop>)> {
        if self.reasoner.is_none() {
            warn!("no reasoner configured; stopping");
            self.state.queue.push_front(action.clone());
            return Ok((
                "stopped: no reasoner configured".to_string(),
                Some(LoopStop::ReasonerUnavailable),
            ));
        }

        let verdict = charge_reason_step(
            &mut self.state.memory,
            &mut self.state.quota,
            self.clock.today(),
            self.config.reason_limits(),
        );
        match verdict {
            BudgetVerdict::Proceed => {}
            BudgetVerdict::StepLimit { steps, max } => {
                warn!(steps, max, "reasoning step limit reached for this run");
                self.state.queue.push_front(action.clone());
                return Ok((
                    format!("stopped: step {steps} exceeds the per-run limit of {max}"),
                    Some(LoopStop::StepLimit { steps, max }),
                ));
            }
            BudgetVerdict::QuotaExhausted { max_per_day } => {
                warn!(max_per_day, "daily reasoning quota exhausted");
                self.state.queue.push_front(action.clone());
                return Ok((
                    format!("stopped: daily quota of {max_per_day} reasoning calls is used up"),
                    Some(LoopStop::QuotaExhausted { max_per_day }),
                ));
            }
        }

        self.state.memory.active_task = Some(task.to_string());
        let observation =
            match self.consult(action, task, explanation, files_to_send, thoughts_to_send) {
                Ok(observation) => observation,
                Err(err) => {
                    error!(task, error = ?err, "reasoning step failed; scheduling diagnosis");
                    self.schedule_diagnosis(task, &format!("reasoning step failed: {err:#}"));
                    format!("error: {err:#}")
                }
            };
        Ok((observation, None))
    }

    /// Build the prompt, call the reasoner and schedule what it returned.
    ///
    /// `Err` covers local failures (prompt rendering, call artifacts); reasoner
    /// failures are handled here.
    fn consult(
        &mut self,
        action: &Action,
        task: &str,
        explanation: &str,
        files_to_send: &[String],
        thoughts_to_send: &[String],
    ) -> Result<String> {
        let inputs = PromptInputs::from_memory(
            &self.state.memory,
            &self.config,
            task,
            explanation,
            files_to_send,
            thoughts_to_send,
        )
        .with_tools(self.tools.describe());
        let prompt = build_prompt(&inputs, self.config.reasoner.prompt_budget_bytes)?;
        let request = self.prepare_request(prompt)?;

        let result = match self.reasoner.as_ref() {
            Some(reasoner) => reasoner.reason(&request),
            None => Err(ReasonError::Transport("reasoner went away".to_string())),
        };
        let result = result.and_then(|raw| {
            if !request.output_path.exists()
                && let Err(err) = fs::write(&request.output_path, &raw)
            {
                warn!(error = %err, "failed to record reasoner output");
            }
            parse_response(&raw).map_err(ReasonError::from)
        });

        let observation = match result {
            Ok(parsed) => {
                if !parsed.dropped_tags.is_empty() {
                    warn!(tags = ?parsed.dropped_tags, "dropped actions with unknown tags");
                }
                match ensure_continuation(parsed.actions, task) {
                    Continuation::Intact(actions) => {
                        let count = actions.len();
                        self.state.queue.extend(actions);
                        format!("scheduled {count} actions")
                    }
                    Continuation::Extended(actions) => {
                        warn!("response did not end with REASON; appending a follow-up");
                        let count = actions.len();
                        self.state.queue.extend(actions);
                        format!("scheduled {count} actions (follow-up REASON appended)")
                    }
                    Continuation::Missing => {
                        warn!("response contained no actions");
                        self.schedule_diagnosis(task, "reasoner returned no actions");
                        "no actions returned; scheduled diagnosis".to_string()
                    }
                }
            }
            Err(err) if err.is_transient() => {
                let pause = self.config.retry_pause_secs;
                warn!(error = %err, pause_secs = pause, "transient reasoner failure; retrying");
                self.state.queue.push_front(action.clone());
                self.state.queue.push_front(Action::slumber(
                    pause,
                    format!("pause before retrying: {err}"),
                ));
                format!("{err}; retrying after {pause}s")
            }
            Err(err) => {
                warn!(error = %err, "unusable reasoner response");
                self.schedule_diagnosis(task, &err.to_string());
                format!("{err}; scheduled diagnosis")
            }
        };
        Ok(observation)
    }

    /// Number the call, create its directory and record the prompt.
    fn prepare_request(&mut self, prompt: String) -> Result<ReasonRequest> {
        let n = self.state.memory.increment(REASON_CALLS_COUNTER);
        let call_dir = self.paths.reasoning_call_dir(n);
        fs::create_dir_all(&call_dir)
            .with_context(|| format!("create reasoning dir {}", call_dir.display()))?;
        fs::write(call_dir.join("prompt.md"), &prompt)
            .with_context(|| format!("write prompt for reasoning call {n}"))?;
        if !self.paths.schema_path.exists() {
            write_schema(&self.paths.schema_path)?;
        }
        Ok(ReasonRequest {
            workdir: self.workspace.root().to_path_buf(),
            prompt,
            output_schema_path: self.paths.schema_path.clone(),
            output_path: call_dir.join("output.json"),
            log_path: call_dir.join("reasoner.log"),
            timeout: Duration::from_secs(self.config.reasoner.timeout_secs),
            output_limit_bytes: self.config.reasoner.output_limit_bytes,
        })
    }
}
