//! Resumable, policy-gated autonomous agent loop.
//!
//! An agent works through a persisted queue of typed actions. `Reason`
//! actions call an external reasoning service that answers with more actions;
//! everything else is dispatched locally under a review gate for protected
//! files, workspace path checks and a daily reasoning quota.
//!
//! - **[`core`]**: Pure, deterministic logic (actions, queue, memory, quota,
//!   protection, response parsing). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting adapters (state stores, workspace files, child
//!   processes, the reasoner transport, the action log).
//!
//! Orchestration modules ([`dispatch`], [`step`], [`looping`]) coordinate core
//! logic with I/O to implement CLI commands.

pub mod core;
pub mod dispatch;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
