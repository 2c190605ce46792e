//! Prompt builder for reasoning calls.
//!
//! The template marks each section with `<!-- section:KEY required|droppable -->`
//! so the builder can fit the rendered prompt into a byte budget.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::core::memory::Memory;
use crate::io::config::AgentConfig;

const REASON_TEMPLATE: &str = include_str!("../prompts/reason.md");

/// Sections removed first when the prompt exceeds its budget.
const DROP_ORDER: [&str; 5] = ["logs", "catalog", "tracked", "todo", "thoughts"];

static SECTION_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->").ok());

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileExcerpt {
    pub path: String,
    pub contents: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ThoughtExcerpt {
    pub label: String,
    pub text: String,
}

/// Everything the reasoner is allowed to see for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptInputs {
    pub task: String,
    pub explanation: String,
    pub files: Vec<FileExcerpt>,
    pub thoughts: Vec<ThoughtExcerpt>,
    pub todo: Vec<String>,
    pub tracked: Vec<String>,
    pub logs: Vec<String>,
    /// Labels of every scratchpad entry; contents are only sent on request.
    pub thought_labels: Vec<String>,
    /// `module::tool - description` lines for `RUN_TOOL`.
    pub tools: Vec<String>,
    pub tool_output_label: String,
    pub command_output_label: String,
}

impl PromptInputs {
    /// Select the requested files and thoughts out of memory.
    ///
    /// Untracked paths and unknown labels are skipped with a warning.
    pub fn from_memory(
        memory: &Memory,
        config: &AgentConfig,
        task: &str,
        explanation: &str,
        files_to_send: &[String],
        thoughts_to_send: &[String],
    ) -> Self {
        let files = files_to_send
            .iter()
            .filter_map(|path| match memory.file_contents(path) {
                Some("") => Some(FileExcerpt {
                    path: path.clone(),
                    contents: "[not read yet: use READ_FILE first]".to_string(),
                }),
                Some(contents) => Some(FileExcerpt {
                    path: path.clone(),
                    contents: contents.to_string(),
                }),
                None => {
                    warn!(path = %path, "requested file is not tracked");
                    None
                }
            })
            .collect();
        let thoughts = thoughts_to_send
            .iter()
            .filter_map(|label| match memory.thought(label) {
                Some(text) => Some(ThoughtExcerpt {
                    label: label.clone(),
                    text: text.to_string(),
                }),
                None => {
                    warn!(label = %label, "requested thought does not exist");
                    None
                }
            })
            .collect();

        Self {
            task: task.to_string(),
            explanation: explanation.to_string(),
            files,
            thoughts,
            todo: memory.todo().iter().cloned().collect(),
            tracked: memory.tracked_paths().map(str::to_string).collect(),
            logs: memory.recent_logs.clone(),
            thought_labels: memory.thought_labels().map(str::to_string).collect(),
            tools: Vec::new(),
            tool_output_label: config.tool_output_label.clone(),
            command_output_label: config.command_output_label.clone(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }
}

#[derive(Debug, Clone)]
struct ParsedSection {
    key: String,
    required: bool,
    content: String,
}

fn render_template(input: &PromptInputs) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("reason", REASON_TEMPLATE)
        .context("register reason template")?;
    let template = env.get_template("reason")?;
    let rendered = template
        .render(context! {
            task => input.task.trim(),
            explanation => (!input.explanation.trim().is_empty()).then(|| input.explanation.trim()),
            files => &input.files,
            thoughts => &input.thoughts,
            todo => &input.todo,
            tracked => (!input.tracked.is_empty()).then(|| input.tracked.join("\n")),
            logs => (!input.logs.is_empty()).then(|| input.logs.join("\n")),
            thought_labels => &input.thought_labels,
            tools => &input.tools,
            tool_output_label => &input.tool_output_label,
            command_output_label => &input.command_output_label,
        })
        .context("render reason template")?;
    Ok(rendered)
}

fn parse_sections(rendered: &str) -> Vec<ParsedSection> {
    let Some(section_re) = SECTION_RE.as_ref() else {
        return vec![ParsedSection {
            key: "all".to_string(),
            required: true,
            content: rendered.trim().to_string(),
        }];
    };
    let markers: Vec<_> = section_re.captures_iter(rendered).collect();

    let mut sections = Vec::new();
    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(key), Some(kind)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(rendered.len(), |m| m.start());
        let content = rendered[whole.end()..end].trim().to_string();
        if !content.is_empty() {
            sections.push(ParsedSection {
                key: key.as_str().to_string(),
                required: kind.as_str() == "required",
                content,
            });
        }
    }
    sections
}

fn apply_budget(sections: &mut Vec<ParsedSection>, budget: usize) {
    let total_len = |secs: &[ParsedSection]| -> usize { secs.iter().map(|s| s.content.len()).sum() };

    for key in DROP_ORDER {
        if total_len(sections) <= budget {
            return;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            debug!(
                section = key,
                bytes_dropped = sections[idx].content.len(),
                "dropped section for budget"
            );
            sections.remove(idx);
        }
    }

    let total = total_len(sections);
    let Some(last) = sections.last_mut() else {
        return;
    };
    if total <= budget {
        return;
    }
    let allowed = budget.saturating_sub(total - last.content.len());
    let before_len = last.content.len();
    if allowed > 12 {
        last.content.truncate(floor_char_boundary(&last.content, allowed - 12));
        last.content.push_str("\n[truncated]");
    } else {
        last.content.truncate(floor_char_boundary(&last.content, allowed));
    }
    debug!(
        section = %last.key,
        before_len,
        after_len = last.content.len(),
        "truncated section for budget"
    );
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut cut = index.min(text.len());
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    cut
}

/// Render the reasoning prompt within `budget_bytes`.
pub fn build_prompt(input: &PromptInputs, budget_bytes: usize) -> Result<String> {
    let rendered = render_template(input)?;
    let mut sections = parse_sections(&rendered);
    apply_budget(&mut sections, budget_bytes);
    Ok(sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> PromptInputs {
        let mut memory = Memory::default();
        memory.set_file_contents("src/main.rs", "fn main() {}");
        memory.track_file("README.md");
        memory.set_file_contents("secret.txt", "do not send");
        memory.set_thought("plan", "step one");
        memory.set_thought("private", "not requested");
        memory.todo_append_back("finish parser");
        memory.set_recent_logs(vec!["[t] NO_OP {} ::  => ok".to_string()], 10);

        PromptInputs::from_memory(
            &memory,
            &AgentConfig::default(),
            "Write the parser",
            "next todo",
            &["src/main.rs".to_string(), "README.md".to_string(), "ghost.rs".to_string()],
            &["plan".to_string()],
        )
    }

    #[test]
    fn only_requested_memory_is_rendered() {
        let prompt = build_prompt(&inputs(), 100_000).expect("prompt");

        assert!(prompt.contains("Write the parser"));
        assert!(prompt.contains("fn main() {}"));
        assert!(prompt.contains("[not read yet"));
        assert!(prompt.contains("step one"));
        assert!(!prompt.contains("do not send"));
        assert!(!prompt.contains("not requested"));
        assert!(!prompt.contains("ghost.rs\">"));
    }

    #[test]
    fn catalog_lists_tools_and_labels_without_contents() {
        let input = inputs().with_tools(vec!["memory::count_todos - count todos".to_string()]);
        let prompt = build_prompt(&input, 100_000).expect("prompt");

        assert!(prompt.contains("- memory::count_todos - count todos"));
        assert!(prompt.contains("plan, private"));
        assert!(!prompt.contains("not requested"));
    }

    #[test]
    fn sections_appear_in_stable_order() {
        let prompt = build_prompt(&inputs(), 100_000).expect("prompt");
        let order = [
            "### Contract",
            "### Task",
            "### Files",
            "### Tracked Paths",
            "### Thoughts",
            "### Todo",
            "### Recent Actions",
        ];
        let positions: Vec<usize> = order
            .iter()
            .map(|heading| prompt.find(heading).expect(heading))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn budget_drops_logs_before_thoughts() {
        let mut input = inputs();
        input.logs = vec!["log line".repeat(200)];
        let full = build_prompt(&input, 100_000).expect("prompt");
        let budget = full.len() - 500;

        let prompt = build_prompt(&input, budget).expect("prompt");
        assert!(!prompt.contains("### Recent Actions"));
        assert!(prompt.contains("### Thoughts"));
        assert!(prompt.contains("### Contract"));
    }

    #[test]
    fn tiny_budget_keeps_only_required_sections() {
        let prompt = build_prompt(&inputs(), 200).expect("prompt");
        assert!(prompt.contains("### Contract"));
        assert!(prompt.contains("### Task"));
        assert!(!prompt.contains("### Thoughts"));
        assert!(!prompt.contains("### Todo"));
        assert!(!prompt.contains("fn main() {}"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut sections = vec![ParsedSection {
            key: "task".to_string(),
            required: true,
            content: "é".repeat(40),
        }];
        apply_budget(&mut sections, 31);
        assert!(sections[0].content.ends_with("[truncated]"));
        assert!(sections[0].content.len() <= 31);
    }
}
