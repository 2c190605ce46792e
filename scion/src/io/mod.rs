//! Side-effecting adapters: filesystem, child processes, clock and the reasoner.

pub mod action_log;
pub mod clock;
pub mod config;
pub mod init;
pub mod process;
pub mod prompt;
pub mod proposals;
pub mod reasoner;
pub mod store;
pub mod workspace;
