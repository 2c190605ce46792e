//! Multi-iteration driver for `scion run`.

use anyhow::Result;
use tracing::info;

use crate::io::clock::Clock;
use crate::io::reasoner::Reasoner;
use crate::step::{Agent, StepOutcome};

/// Reason why `run_loop` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// A `Terminate` action was popped.
    Terminated,
    /// The run used more reasoning steps than `max_reason_steps_per_run`.
    StepLimit { steps: i64, max: u32 },
    /// Today's reasoning quota is used up.
    QuotaExhausted { max_per_day: u32 },
    /// A `Reason` action came up with no reasoner configured.
    ReasonerUnavailable,
    /// The caller's iteration cap was reached.
    MaxIterations { iterations: u32 },
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub iterations: u32,
    pub stop: LoopStop,
}

/// Step the agent until something stops it.
///
/// Handler failures are recovered inside [`Agent::step`]; an `Err` here means
/// state could not be persisted and the loop cannot continue safely.
pub fn run_loop<R: Reasoner, C: Clock, F: FnMut(&StepOutcome)>(
    agent: &mut Agent<R, C>,
    max_iterations: Option<u32>,
    mut on_step: F,
) -> Result<LoopOutcome> {
    agent.begin_run()?;
    let mut iterations = 0u32;
    loop {
        if let Some(max) = max_iterations
            && iterations >= max
        {
            info!(iterations, "iteration cap reached");
            return Ok(LoopOutcome {
                iterations,
                stop: LoopStop::MaxIterations { iterations },
            });
        }

        let outcome = agent.step()?;
        iterations += 1;
        on_step(&outcome);
        if let Some(stop) = outcome.stop {
            info!(iterations, stop = ?stop, "loop stopped");
            return Ok(LoopOutcome { iterations, stop });
        }
    }
}
