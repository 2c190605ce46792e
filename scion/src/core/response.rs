//! Reasoner response parsing and validation.

use std::sync::LazyLock;

use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::core::action::{Action, ActionParseError};

/// Schema for the `{"actions": [...]}` envelope the reasoner must return.
pub const REASONER_OUTPUT_SCHEMA: &str = include_str!("../../schemas/reasoner_output.schema.json");

static VALIDATOR: LazyLock<Result<Validator, String>> = LazyLock::new(|| {
    let schema: Value = serde_json::from_str(REASONER_OUTPUT_SCHEMA)
        .map_err(|err| format!("parse embedded schema: {err}"))?;
    jsonschema::validator_for(&schema).map_err(|err| format!("invalid embedded schema: {err}"))
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResponseError {
    #[error("reasoner returned an empty response")]
    Empty,
    #[error("malformed reasoner response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub actions: Vec<Action>,
    /// Tags that were not part of the vocabulary and were skipped.
    pub dropped_tags: Vec<String>,
}

/// Parse raw reasoner text into actions.
///
/// Unknown tags are dropped; a known tag with bad fields fails the whole response.
pub fn parse_response(raw: &str) -> Result<ParsedResponse, ResponseError> {
    let body = strip_fences(raw);
    if body.is_empty() {
        return Err(ResponseError::Empty);
    }
    let value: Value = serde_json::from_str(body)
        .map_err(|err| ResponseError::Malformed(format!("invalid JSON: {err}")))?;

    let validator = VALIDATOR
        .as_ref()
        .map_err(|err| ResponseError::Malformed(err.clone()))?;
    if !validator.is_valid(&value) {
        let messages = validator
            .iter_errors(&value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(ResponseError::Malformed(format!(
            "schema validation failed: {}",
            messages.join("; ")
        )));
    }

    let items = match value {
        Value::Object(mut map) => match map.remove("actions") {
            Some(Value::Array(items)) => items,
            _ => return Err(ResponseError::Malformed("missing actions array".to_string())),
        },
        _ => return Err(ResponseError::Malformed("expected a JSON object".to_string())),
    };

    let mut actions = Vec::with_capacity(items.len());
    let mut dropped_tags = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        match Action::from_value(item) {
            Ok(action) => actions.push(action),
            Err(ActionParseError::UnknownTag(tag)) => {
                warn!(index, tag = %tag, "dropping action with unknown tag");
                dropped_tags.push(tag);
            }
            Err(err) => {
                return Err(ResponseError::Malformed(format!("action {index}: {err}")));
            }
        }
    }
    Ok(ParsedResponse {
        actions,
        dropped_tags,
    })
}

/// Remove a surrounding markdown code fence (```json ... ```), if any.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::ActionKind;

    #[test]
    fn parses_fenced_envelope() {
        let raw = "```json\n{\"actions\": [{\"type\": \"READ_FILE\", \"file_path\": \"a.txt\"}, {\"type\": \"REASON\", \"task\": \"next\"}]}\n```";
        let parsed = parse_response(raw).expect("parse");
        let kinds: Vec<_> = parsed.actions.iter().map(Action::kind).collect();
        assert_eq!(kinds, vec![ActionKind::ReadFile, ActionKind::Reason]);
        assert!(parsed.dropped_tags.is_empty());
    }

    #[test]
    fn unknown_tags_are_dropped_not_fatal() {
        let raw = r#"{"actions": [{"type": "TELEPORT"}, {"type": "NO_OP"}]}"#;
        let parsed = parse_response(raw).expect("parse");
        assert_eq!(parsed.actions.len(), 1);
        assert_eq!(parsed.dropped_tags, vec!["TELEPORT".to_string()]);
    }

    #[test]
    fn blank_response_is_empty() {
        assert_eq!(parse_response("  \n"), Err(ResponseError::Empty));
        assert_eq!(parse_response("```\n```"), Err(ResponseError::Empty));
    }

    #[test]
    fn schema_and_field_errors_are_malformed() {
        assert!(matches!(
            parse_response(r#"{"steps": []}"#),
            Err(ResponseError::Malformed(_))
        ));
        assert!(matches!(
            parse_response(r#"{"actions": [{"type": "SLUMBER"}]}"#),
            Err(ResponseError::Malformed(msg)) if msg.contains("action 0")
        ));
        assert!(matches!(
            parse_response("READ_FILE: a.txt"),
            Err(ResponseError::Malformed(_))
        ));
    }
}
