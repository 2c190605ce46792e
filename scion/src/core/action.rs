//! The closed action vocabulary.
//!
//! Actions are serialized with an internal `type` tag so the persisted queue,
//! the action log and the reasoner response all share one wire format.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// One unit of work. The variant (discriminant) never changes after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Ask the reasoning service to expand `task` into further actions.
    Reason {
        task: String,
        #[serde(default)]
        explanation: String,
        /// Tracked file paths whose cached contents are sent verbatim.
        #[serde(default)]
        files_to_send: Vec<String>,
        /// Scratchpad labels whose text is sent verbatim.
        #[serde(default)]
        thoughts_to_send: Vec<String>,
    },
    /// Insert, overwrite or delete a scratchpad entry.
    Think {
        label: String,
        #[serde(default)]
        thought: String,
        #[serde(default)]
        delete: bool,
        #[serde(default)]
        explanation: String,
    },
    ReadFile {
        file_path: String,
        #[serde(default)]
        explanation: String,
    },
    WriteFile {
        file_path: String,
        #[serde(default)]
        contents: String,
        /// When set, the contents are taken from this scratchpad entry instead.
        #[serde(default)]
        use_scratch_label: Option<String>,
        #[serde(default)]
        explanation: String,
    },
    DeleteFile {
        file_path: String,
        #[serde(default)]
        explanation: String,
    },
    /// Invoke a registered tool by module reference and name.
    RunTool {
        module_ref: String,
        tool_name: String,
        #[serde(default)]
        arguments: Map<String, Value>,
        #[serde(default)]
        explanation: String,
    },
    /// Run a shell command in the workspace root.
    RunCommand {
        command: String,
        #[serde(default)]
        timeout_secs: Option<u64>,
        #[serde(default)]
        explanation: String,
    },
    UpdateTodo {
        op: TodoOp,
        #[serde(default)]
        item: Option<String>,
        #[serde(default)]
        explanation: String,
    },
    /// Voluntary pause before the next loop iteration.
    Slumber {
        seconds: u64,
        #[serde(default)]
        explanation: String,
    },
    Terminate {
        #[serde(default)]
        explanation: String,
    },
    NoOp {
        #[serde(default)]
        explanation: String,
    },
}

/// Todo list mutation carried by [`Action::UpdateTodo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TodoOp {
    InsertFront,
    AppendBack,
    RemoveFront,
}

/// Discriminant of an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    Reason,
    Think,
    ReadFile,
    WriteFile,
    DeleteFile,
    RunTool,
    RunCommand,
    UpdateTodo,
    Slumber,
    Terminate,
    NoOp,
}

impl ActionKind {
    pub const ALL: [ActionKind; 11] = [
        ActionKind::Reason,
        ActionKind::Think,
        ActionKind::ReadFile,
        ActionKind::WriteFile,
        ActionKind::DeleteFile,
        ActionKind::RunTool,
        ActionKind::RunCommand,
        ActionKind::UpdateTodo,
        ActionKind::Slumber,
        ActionKind::Terminate,
        ActionKind::NoOp,
    ];

    /// Wire tag, identical to the serde `type` field.
    pub fn tag(self) -> &'static str {
        match self {
            ActionKind::Reason => "REASON",
            ActionKind::Think => "THINK",
            ActionKind::ReadFile => "READ_FILE",
            ActionKind::WriteFile => "WRITE_FILE",
            ActionKind::DeleteFile => "DELETE_FILE",
            ActionKind::RunTool => "RUN_TOOL",
            ActionKind::RunCommand => "RUN_COMMAND",
            ActionKind::UpdateTodo => "UPDATE_TODO",
            ActionKind::Slumber => "SLUMBER",
            ActionKind::Terminate => "TERMINATE",
            ActionKind::NoOp => "NO_OP",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

/// Failure to turn untyped JSON into an [`Action`].
#[derive(Debug, Error)]
pub enum ActionParseError {
    #[error("action is missing a string `type` tag")]
    MissingTag,
    #[error("unknown action tag '{0}'")]
    UnknownTag(String),
    #[error("invalid {tag} action: {source}")]
    Invalid {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Action {
    pub fn reason(task: impl Into<String>, explanation: impl Into<String>) -> Self {
        Action::Reason {
            task: task.into(),
            explanation: explanation.into(),
            files_to_send: Vec::new(),
            thoughts_to_send: Vec::new(),
        }
    }

    /// Recovery step asking the reasoner to diagnose why `task` went wrong.
    pub fn debug_reason(task: &str, cause: &str) -> Self {
        Action::reason(
            format!(
                "Diagnose why the previous reasoning step produced no valid continuation \
                 while working on: {task}"
            ),
            format!("recovery: {cause}"),
        )
    }

    pub fn slumber(seconds: u64, explanation: impl Into<String>) -> Self {
        Action::Slumber {
            seconds,
            explanation: explanation.into(),
        }
    }

    pub fn terminate(explanation: impl Into<String>) -> Self {
        Action::Terminate {
            explanation: explanation.into(),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Reason { .. } => ActionKind::Reason,
            Action::Think { .. } => ActionKind::Think,
            Action::ReadFile { .. } => ActionKind::ReadFile,
            Action::WriteFile { .. } => ActionKind::WriteFile,
            Action::DeleteFile { .. } => ActionKind::DeleteFile,
            Action::RunTool { .. } => ActionKind::RunTool,
            Action::RunCommand { .. } => ActionKind::RunCommand,
            Action::UpdateTodo { .. } => ActionKind::UpdateTodo,
            Action::Slumber { .. } => ActionKind::Slumber,
            Action::Terminate { .. } => ActionKind::Terminate,
            Action::NoOp { .. } => ActionKind::NoOp,
        }
    }

    pub fn explanation(&self) -> &str {
        match self {
            Action::Reason { explanation, .. }
            | Action::Think { explanation, .. }
            | Action::ReadFile { explanation, .. }
            | Action::WriteFile { explanation, .. }
            | Action::DeleteFile { explanation, .. }
            | Action::RunTool { explanation, .. }
            | Action::RunCommand { explanation, .. }
            | Action::UpdateTodo { explanation, .. }
            | Action::Slumber { explanation, .. }
            | Action::Terminate { explanation, .. }
            | Action::NoOp { explanation, .. } => explanation,
        }
    }

    /// Short human-readable description (tag plus primary target).
    pub fn summary(&self) -> String {
        let tag = self.kind().tag();
        match self {
            Action::Reason { task, .. } => format!("{tag}: {task}"),
            Action::Think { label, delete, .. } if *delete => format!("{tag}: delete {label}"),
            Action::Think { label, .. } => format!("{tag}: {label}"),
            Action::ReadFile { file_path, .. }
            | Action::WriteFile { file_path, .. }
            | Action::DeleteFile { file_path, .. } => format!("{tag}: {file_path}"),
            Action::RunTool {
                module_ref,
                tool_name,
                ..
            } => format!("{tag}: {module_ref}::{tool_name}"),
            Action::RunCommand { command, .. } => format!("{tag}: {command}"),
            Action::UpdateTodo { op, item, .. } => match item {
                Some(item) => format!("{tag}: {op:?} {item}"),
                None => format!("{tag}: {op:?}"),
            },
            Action::Slumber { seconds, .. } => format!("{tag}: {seconds}s"),
            Action::Terminate { .. } | Action::NoOp { .. } => tag.to_string(),
        }
    }

    /// Variant-specific fields as a JSON object (no tag, no explanation).
    pub fn arguments_json(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.remove("type");
            map.remove("explanation");
        }
        value
    }

    /// Parse a single untyped action, distinguishing unknown tags from bad fields.
    pub fn from_value(value: Value) -> Result<Self, ActionParseError> {
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ActionParseError::MissingTag)?
            .to_string();
        if ActionKind::from_tag(&tag).is_none() {
            return Err(ActionParseError::UnknownTag(tag));
        }
        serde_json::from_value(value).map_err(|source| ActionParseError::Invalid { tag, source })
    }
}
