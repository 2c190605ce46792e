//! Keep the agent alive: every reasoning step must end by scheduling another one.

use crate::core::action::{Action, ActionKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Continuation {
    /// The response already ends with a `Reason`; enqueue as-is.
    Intact(Vec<Action>),
    /// The response had work but no trailing `Reason`; one was appended that
    /// repeats the original task.
    Extended(Vec<Action>),
    /// Nothing usable came back.
    Missing,
}

impl Continuation {
    pub fn into_actions(self) -> Vec<Action> {
        match self {
            Continuation::Intact(actions) | Continuation::Extended(actions) => actions,
            Continuation::Missing => Vec::new(),
        }
    }
}

pub fn ensure_continuation(mut actions: Vec<Action>, task: &str) -> Continuation {
    match actions.last().map(Action::kind) {
        None => Continuation::Missing,
        Some(ActionKind::Reason) => Continuation::Intact(actions),
        Some(_) => {
            actions.push(Action::reason(
                task,
                "continue: previous step did not schedule a follow-up",
            ));
            Continuation::Extended(actions)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(path: &str) -> Action {
        Action::ReadFile {
            file_path: path.to_string(),
            explanation: String::new(),
        }
    }

    #[test]
    fn missing_trailing_reason_repeats_original_task_verbatim() {
        let task = "Refactor the parser; keep  spacing\nexact";
        let actions = vec![
            read("x"),
            Action::WriteFile {
                file_path: "y".to_string(),
                contents: "z".to_string(),
                use_scratch_label: None,
                explanation: String::new(),
            },
        ];

        let Continuation::Extended(actions) = ensure_continuation(actions, task) else {
            panic!("expected extended continuation");
        };
        assert_eq!(actions.len(), 3);
        let Action::Reason { task: follow_up, .. } = &actions[2] else {
            panic!("expected trailing reason");
        };
        assert_eq!(follow_up, task);
    }

    #[test]
    fn trailing_reason_is_left_untouched() {
        let actions = vec![read("x"), Action::reason("next", "")];
        assert_eq!(
            ensure_continuation(actions.clone(), "orig"),
            Continuation::Intact(actions)
        );
    }

    #[test]
    fn empty_response_is_missing() {
        assert_eq!(ensure_continuation(Vec::new(), "orig"), Continuation::Missing);
    }
}
