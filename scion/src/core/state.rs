//! The three pieces of durable agent state, loaded together and flushed together.

use crate::core::memory::Memory;
use crate::core::queue::ActionQueue;
use crate::core::quota::QuotaState;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentState {
    pub queue: ActionQueue,
    pub memory: Memory,
    pub quota: QuotaState,
}
