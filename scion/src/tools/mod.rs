//! Tool registry.
//!
//! Tools are addressed by `(module_ref, tool_name)`. Each registration holds a
//! factory that builds the tool against a borrowed [`ToolContext`], so a tool
//! can read agent state without owning it.

pub mod builtin;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::memory::Memory;
use crate::core::quota::QuotaState;
use crate::io::config::AgentConfig;

/// Read-only view of agent state handed to a tool.
#[derive(Clone, Copy)]
pub struct ToolContext<'a> {
    pub memory: &'a Memory,
    pub quota: &'a QuotaState,
    pub config: &'a AgentConfig,
    pub workspace_root: &'a Path,
}

pub trait Tool {
    /// Run with the action's `arguments` object and return text output.
    fn run(&self, arguments: &Map<String, Value>) -> Result<String>;
}

pub type ToolFactory = for<'a> fn(ToolContext<'a>) -> Box<dyn Tool + 'a>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolLookupError {
    #[error("unknown tool module '{module}' (registered modules: {available})")]
    UnknownModule { module: String, available: String },
    #[error("module '{module}' has no tool '{tool}' (available: {available})")]
    UnknownTool {
        module: String,
        tool: String,
        available: String,
    },
}

struct Registration {
    description: &'static str,
    factory: ToolFactory,
}

#[derive(Default)]
pub struct ToolRegistry {
    modules: BTreeMap<String, BTreeMap<String, Registration>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `builtin` module already registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register(&mut registry);
        registry
    }

    pub fn register(
        &mut self,
        module_ref: &str,
        tool_name: &str,
        description: &'static str,
        factory: ToolFactory,
    ) {
        self.modules
            .entry(module_ref.to_string())
            .or_default()
            .insert(
                tool_name.to_string(),
                Registration {
                    description,
                    factory,
                },
            );
    }

    pub fn lookup(&self, module_ref: &str, tool_name: &str) -> Result<ToolFactory, ToolLookupError> {
        let Some(tools) = self.modules.get(module_ref) else {
            return Err(ToolLookupError::UnknownModule {
                module: module_ref.to_string(),
                available: join_or_none(self.modules.keys()),
            });
        };
        tools
            .get(tool_name)
            .map(|registration| registration.factory)
            .ok_or_else(|| ToolLookupError::UnknownTool {
                module: module_ref.to_string(),
                tool: tool_name.to_string(),
                available: join_or_none(tools.keys()),
            })
    }

    /// `module::tool - description` lines, sorted.
    pub fn describe(&self) -> Vec<String> {
        self.modules
            .iter()
            .flat_map(|(module, tools)| {
                tools.iter().map(move |(name, registration)| {
                    format!("{module}::{name} - {}", registration.description)
                })
            })
            .collect()
    }
}

fn join_or_none<'a>(names: impl Iterator<Item = &'a String>) -> String {
    let names: Vec<&str> = names.map(String::as_str).collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shout<'a> {
        memory: &'a Memory,
    }

    impl Tool for Shout<'_> {
        fn run(&self, _arguments: &Map<String, Value>) -> Result<String> {
            Ok(format!("{} TODOS", self.memory.todo().len()))
        }
    }

    fn shout<'a>(ctx: ToolContext<'a>) -> Box<dyn Tool + 'a> {
        Box::new(Shout { memory: ctx.memory })
    }

    #[test]
    fn registered_factory_sees_context() {
        let mut registry = ToolRegistry::new();
        registry.register("custom", "shout", "count todos", shout);

        let mut memory = Memory::default();
        memory.todo_append_back("one");
        let config = AgentConfig::default();
        let quota = QuotaState::default();
        let ctx = ToolContext {
            memory: &memory,
            quota: &quota,
            config: &config,
            workspace_root: Path::new("/tmp"),
        };

        let factory = registry.lookup("custom", "shout").expect("lookup");
        let output = factory(ctx).run(&Map::new()).expect("run");
        assert_eq!(output, "1 TODOS");
        assert_eq!(registry.describe(), vec!["custom::shout - count todos"]);
    }

    #[test]
    fn lookup_failures_list_what_is_registered() {
        let registry = ToolRegistry::with_builtins();

        let err = registry.lookup("missing", "x").err().expect("error");
        assert_eq!(
            err,
            ToolLookupError::UnknownModule {
                module: "missing".to_string(),
                available: "builtin".to_string(),
            }
        );

        let err = registry.lookup("builtin", "nope").err().expect("error");
        assert!(err.to_string().contains("echo, list_files, quota"));
    }
}
