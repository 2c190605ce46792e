//! Test-only collaborators: a scripted reasoner, a controllable clock and a
//! scratch workspace with `.scion/` already initialized.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};

use crate::io::clock::Clock;
use crate::io::config::{AgentConfig, write_config};
use crate::io::init::{AgentPaths, InitOptions, init_agent};
use crate::io::reasoner::{ReasonError, ReasonRequest, Reasoner};

/// Reasoner that replays canned responses in order.
///
/// Clones share the script and the request history, so a test can keep a
/// handle after moving one into an agent.
#[derive(Clone, Default)]
pub struct ScriptedReasoner {
    responses: Rc<RefCell<VecDeque<Result<String, ReasonError>>>>,
    fallback: Option<String>,
    requests: Rc<RefCell<Vec<ReasonRequest>>>,
}

impl ScriptedReasoner {
    pub fn new(responses: Vec<Result<String, ReasonError>>) -> Self {
        Self {
            responses: Rc::new(RefCell::new(responses.into())),
            ..Self::default()
        }
    }

    /// Answer every call with `response`.
    pub fn repeating(response: &str) -> Self {
        Self {
            fallback: Some(response.to_string()),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<ReasonRequest> {
        self.requests.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl Reasoner for ScriptedReasoner {
    fn reason(&self, request: &ReasonRequest) -> Result<String, ReasonError> {
        self.requests.borrow_mut().push(request.clone());
        match self.responses.borrow_mut().pop_front() {
            Some(response) => response,
            None => match &self.fallback {
                Some(response) => Ok(response.clone()),
                None => Err(ReasonError::Transport(
                    "scripted reasoner has no responses left".to_string(),
                )),
            },
        }
    }
}

/// Clock frozen at a settable instant. Sleeps are recorded, not performed.
#[derive(Clone)]
pub struct FixedClock {
    now: Rc<Cell<DateTime<Utc>>>,
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
            sleeps: Rc::default(),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::at(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
                .single()
                .expect("valid fixed time"),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

/// Temporary workspace with `scion init` already applied.
pub struct TestWorkspace {
    _temp: tempfile::TempDir,
    root: PathBuf,
    paths: AgentPaths,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp workspace")?;
        let root = temp
            .path()
            .canonicalize()
            .context("resolve temp workspace")?;
        let paths = init_agent(&root, &InitOptions { force: false })?;
        Ok(Self {
            _temp: temp,
            root,
            paths,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self) -> &AgentPaths {
        &self.paths
    }

    pub fn write_config(&self, config: &AgentConfig) -> Result<()> {
        write_config(&self.paths.config_path, config)
    }

    /// Write a workspace file, creating parent directories.
    pub fn write_file(&self, relative: &str, contents: &str) -> Result<()> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read_file(&self, relative: &str) -> Result<String> {
        let path = self.root.join(relative);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }
}
