//! Stable exit codes for scion CLI commands.

/// Command succeeded, or `run` ended on a `Terminate` action.
pub const OK: i32 = 0;
/// Invalid layout/config/state or any other error.
pub const INVALID: i32 = 1;
/// `run` stopped because today's reasoning quota is used up.
pub const QUOTA_EXHAUSTED: i32 = 2;
/// `run` stopped at the per-run reasoning step limit.
pub const STEP_LIMIT: i32 = 3;
/// `run` reached a `Reason` action with no reasoner configured.
pub const REASONER_UNAVAILABLE: i32 = 4;
/// `run` hit `--max-iterations`.
pub const MAX_ITERATIONS: i32 = 5;
