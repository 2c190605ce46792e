//! Gating for reasoning-service calls: per-run step ceiling and daily quota.

use chrono::NaiveDate;

use crate::core::memory::Memory;
use crate::core::quota::{QuotaState, REASON_RESOURCE};

/// Memory counter holding the number of reasoning steps taken in the current run.
pub const REASON_STEPS_COUNTER: &str = "reason_steps";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReasonLimits {
    pub max_steps_per_run: u32,
    pub max_calls_per_day: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetVerdict {
    Proceed,
    StepLimit { steps: i64, max: u32 },
    QuotaExhausted { max_per_day: u32 },
}

/// Count one reasoning step and charge the daily quota.
///
/// The step counter is incremented even when the call is refused. The quota is
/// charged only after the step ceiling passes.
pub fn charge_reason_step(
    memory: &mut Memory,
    quota: &mut QuotaState,
    today: NaiveDate,
    limits: ReasonLimits,
) -> BudgetVerdict {
    let steps = memory.increment(REASON_STEPS_COUNTER);
    if steps > i64::from(limits.max_steps_per_run) {
        return BudgetVerdict::StepLimit {
            steps,
            max: limits.max_steps_per_run,
        };
    }
    if !quota.try_consume(REASON_RESOURCE, today, limits.max_calls_per_day) {
        return BudgetVerdict::QuotaExhausted {
            max_per_day: limits.max_calls_per_day,
        };
    }
    BudgetVerdict::Proceed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).expect("date")
    }

    #[test]
    fn step_ceiling_refuses_without_charging_quota() {
        let mut memory = Memory::default();
        let mut quota = QuotaState::default();
        let limits = ReasonLimits {
            max_steps_per_run: 1,
            max_calls_per_day: 10,
        };

        assert_eq!(
            charge_reason_step(&mut memory, &mut quota, today(), limits),
            BudgetVerdict::Proceed
        );
        assert_eq!(
            charge_reason_step(&mut memory, &mut quota, today(), limits),
            BudgetVerdict::StepLimit { steps: 2, max: 1 }
        );
        assert_eq!(quota.remaining(REASON_RESOURCE), Some(9));
    }

    #[test]
    fn exhausted_quota_refuses() {
        let mut memory = Memory::default();
        let mut quota = QuotaState::default();
        let limits = ReasonLimits {
            max_steps_per_run: 10,
            max_calls_per_day: 0,
        };
        assert_eq!(
            charge_reason_step(&mut memory, &mut quota, today(), limits),
            BudgetVerdict::QuotaExhausted { max_per_day: 0 }
        );
    }
}
