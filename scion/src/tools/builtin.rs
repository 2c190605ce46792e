//! Tools available in every agent under module `builtin`.

use anyhow::{Result, anyhow};
use serde_json::{Map, Value};

use crate::core::quota::REASON_RESOURCE;
use crate::tools::{Tool, ToolContext, ToolRegistry};

pub const MODULE: &str = "builtin";

pub fn register(registry: &mut ToolRegistry) {
    registry.register(MODULE, "echo", "return the `text` argument unchanged", echo);
    registry.register(
        MODULE,
        "list_files",
        "list tracked paths, optionally under `prefix`",
        list_files,
    );
    registry.register(MODULE, "quota", "report remaining reasoning calls for today", quota);
}

struct Echo;

impl Tool for Echo {
    fn run(&self, arguments: &Map<String, Value>) -> Result<String> {
        arguments
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("echo requires a string `text` argument"))
    }
}

fn echo<'a>(_ctx: ToolContext<'a>) -> Box<dyn Tool + 'a> {
    Box::new(Echo)
}

struct ListFiles<'a> {
    ctx: ToolContext<'a>,
}

impl Tool for ListFiles<'_> {
    fn run(&self, arguments: &Map<String, Value>) -> Result<String> {
        let prefix = arguments
            .get("prefix")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let paths: Vec<&str> = self
            .ctx
            .memory
            .tracked_paths()
            .filter(|path| path.starts_with(prefix))
            .collect();
        if paths.is_empty() {
            return Ok(format!("no tracked files under '{prefix}'"));
        }
        Ok(paths.join("\n"))
    }
}

fn list_files<'a>(ctx: ToolContext<'a>) -> Box<dyn Tool + 'a> {
    Box::new(ListFiles { ctx })
}

struct Quota<'a> {
    ctx: ToolContext<'a>,
}

impl Tool for Quota<'_> {
    fn run(&self, _arguments: &Map<String, Value>) -> Result<String> {
        let max = self.ctx.config.max_reason_calls_per_day;
        let remaining = self.ctx.quota.remaining(REASON_RESOURCE).unwrap_or(max);
        Ok(format!("{remaining}/{max} reasoning calls remaining today"))
    }
}

fn quota<'a>(ctx: ToolContext<'a>) -> Box<dyn Tool + 'a> {
    Box::new(Quota { ctx })
}
