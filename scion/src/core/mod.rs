//! Deterministic, pure logic for the agent loop.
//!
//! Core modules must be free of I/O side effects: no filesystem, process,
//! clock or network access. They operate on in-memory state and return
//! deterministic outputs suitable for tests.

pub mod action;
pub mod budget;
pub mod continuation;
pub mod memory;
pub mod path;
pub mod protection;
pub mod queue;
pub mod quota;
pub mod response;
pub mod state;
pub mod termination;
