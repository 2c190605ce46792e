//! Ordered pending-action queue.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::action::{Action, ActionParseError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionQueue {
    items: VecDeque<Action>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a queue from untyped entries, keeping every entry that parses.
    ///
    /// Rejected entries are returned alongside their index so the caller can log them.
    pub fn from_values(values: Vec<Value>) -> (Self, Vec<(usize, ActionParseError)>) {
        let mut queue = Self::new();
        let mut rejected = Vec::new();
        for (index, value) in values.into_iter().enumerate() {
            match Action::from_value(value) {
                Ok(action) => queue.push_back(action),
                Err(err) => rejected.push((index, err)),
            }
        }
        (queue, rejected)
    }

    pub fn pop_front(&mut self) -> Option<Action> {
        self.items.pop_front()
    }

    pub fn pop_back(&mut self) -> Option<Action> {
        self.items.pop_back()
    }

    pub fn push_back(&mut self, action: Action) {
        self.items.push_back(action);
    }

    pub fn push_front(&mut self, action: Action) {
        self.items.push_front(action);
    }

    pub fn extend<I: IntoIterator<Item = Action>>(&mut self, actions: I) {
        self.items.extend(actions);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn front(&self) -> Option<&Action> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Action> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::ActionKind;
    use serde_json::json;

    #[test]
    fn front_insertion_preserves_fifo_for_the_rest() {
        let mut queue = ActionQueue::new();
        queue.push_back(Action::reason("a", ""));
        queue.push_back(Action::reason("b", ""));
        queue.push_front(Action::slumber(1, ""));

        let kinds: Vec<_> = queue.snapshot().iter().map(Action::kind).collect();
        assert_eq!(
            kinds,
            vec![ActionKind::Slumber, ActionKind::Reason, ActionKind::Reason]
        );
        assert_eq!(queue.pop_back(), Some(Action::reason("b", "")));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn from_values_drops_unknown_tags_and_keeps_the_rest() {
        let (queue, rejected) = ActionQueue::from_values(vec![
            json!({"type": "REASON", "task": "first"}),
            json!({"type": "SUMMON", "task": "nope"}),
            json!({"type": "TERMINATE"}),
        ]);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.front(), Some(&Action::reason("first", "")));
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].0, 1);
    }

    #[test]
    fn serializes_as_plain_array() {
        let mut queue = ActionQueue::new();
        queue.push_back(Action::terminate("done"));
        let value = serde_json::to_value(&queue).expect("serialize");
        assert_eq!(value, json!([{"type": "TERMINATE", "explanation": "done"}]));
    }
}
