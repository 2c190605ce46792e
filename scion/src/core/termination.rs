//! Shutdown scheduling once the todo list runs dry.

use crate::core::action::{Action, ActionKind};
use crate::core::queue::ActionQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// `Terminate` sits at the queue front; popping it ends the loop.
    Terminated,
}

/// Rewrite the queue to `[Terminate, <last pending action>]` when there is no
/// work left on the todo list.
///
/// The preserved action stays queued so a later run picks it up.
pub fn schedule_termination(queue: &mut ActionQueue, todo_is_empty: bool) -> LoopState {
    if queue.front().map(Action::kind) == Some(ActionKind::Terminate) {
        return LoopState::Terminated;
    }
    if !todo_is_empty {
        return LoopState::Running;
    }
    let preserved = queue.pop_back();
    queue.clear();
    queue.push_back(Action::terminate("todo list is empty"));
    if let Some(action) = preserved {
        queue.push_back(action);
    }
    LoopState::Terminated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_todo_keeps_running() {
        let mut queue = ActionQueue::new();
        queue.push_back(Action::reason("a", ""));
        assert_eq!(schedule_termination(&mut queue, false), LoopState::Running);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn empty_todo_keeps_only_the_last_action() {
        let mut queue = ActionQueue::new();
        queue.push_back(Action::slumber(1, ""));
        queue.push_back(Action::reason("next", ""));

        assert_eq!(schedule_termination(&mut queue, true), LoopState::Terminated);
        assert_eq!(
            queue.snapshot(),
            vec![Action::terminate("todo list is empty"), Action::reason("next", "")]
        );

        // Already scheduled: left alone.
        assert_eq!(schedule_termination(&mut queue, true), LoopState::Terminated);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn empty_queue_gets_a_lone_terminate() {
        let mut queue = ActionQueue::new();
        schedule_termination(&mut queue, true);
        assert_eq!(queue.snapshot(), vec![Action::terminate("todo list is empty")]);
    }
}
