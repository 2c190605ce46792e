//! Agent memory: tracked files, scratchpad, todo list, counters and log tail.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TodoError {
    #[error("cannot remove the front todo item: the todo list is empty")]
    Empty,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Memory {
    /// Workspace-relative path to last known content; empty means not yet read.
    pub files: BTreeMap<String, String>,
    pub thoughts: BTreeMap<String, String>,
    pub todo: VecDeque<String>,
    pub counters: BTreeMap<String, i64>,
    pub recent_logs: Vec<String>,
    pub active_task: Option<String>,
    pub last_memorized: Option<DateTime<Utc>>,
}

impl Memory {
    pub fn track_file(&mut self, path: &str) {
        self.files.entry(path.to_string()).or_default();
    }

    pub fn is_tracked(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn file_contents(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// Store content for `path`, tracking it if it was unknown.
    pub fn set_file_contents(&mut self, path: &str, contents: impl Into<String>) {
        self.files.insert(path.to_string(), contents.into());
    }

    pub fn forget_file(&mut self, path: &str) -> bool {
        self.files.remove(path).is_some()
    }

    pub fn tracked_paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Merge a fresh workspace scan into the tracked set.
    ///
    /// Cached contents survive for paths that still exist.
    pub fn seed_files<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let present: BTreeSet<String> = paths.into_iter().map(Into::into).collect();
        self.files.retain(|path, _| present.contains(path));
        for path in present {
            self.files.entry(path).or_default();
        }
    }

    pub fn set_thought(&mut self, label: &str, text: impl Into<String>) {
        self.thoughts.insert(label.to_string(), text.into());
    }

    pub fn thought(&self, label: &str) -> Option<&str> {
        self.thoughts.get(label).map(String::as_str)
    }

    pub fn delete_thought(&mut self, label: &str) -> bool {
        self.thoughts.remove(label).is_some()
    }

    pub fn thought_labels(&self) -> impl Iterator<Item = &str> {
        self.thoughts.keys().map(String::as_str)
    }

    pub fn todo_insert_front(&mut self, item: impl Into<String>) {
        self.todo.push_front(item.into());
    }

    pub fn todo_append_back(&mut self, item: impl Into<String>) {
        self.todo.push_back(item.into());
    }

    pub fn todo_remove_front(&mut self) -> Result<String, TodoError> {
        self.todo.pop_front().ok_or(TodoError::Empty)
    }

    pub fn todo(&self) -> &VecDeque<String> {
        &self.todo
    }

    pub fn counter(&self, name: &str) -> i64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, name: &str) -> i64 {
        let value = self.counters.entry(name.to_string()).or_insert(0);
        *value += 1;
        *value
    }

    pub fn set_counter(&mut self, name: &str, value: i64) {
        self.counters.insert(name.to_string(), value);
    }

    /// Replace the log tail, keeping at most the last `cap` lines.
    pub fn set_recent_logs(&mut self, lines: Vec<String>, cap: usize) {
        let skip = lines.len().saturating_sub(cap);
        self.recent_logs = lines.into_iter().skip(skip).collect();
    }

    pub fn mark_memorized(&mut self, now: DateTime<Utc>) {
        self.last_memorized = Some(now);
    }
}
