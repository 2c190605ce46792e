//! Daily resource quotas.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Resource key for reasoning-service calls.
pub const REASON_RESOURCE: &str = "reason";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuota {
    pub reset_date: NaiveDate,
    pub remaining: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaState {
    pub resources: BTreeMap<String, ResourceQuota>,
}

impl QuotaState {
    /// Reset `resource` to `max` if the date advanced. Returns true when a reset happened.
    ///
    /// A missing entry is created at `max` dated `today`.
    pub fn refresh(&mut self, resource: &str, today: NaiveDate, max: u32) -> bool {
        match self.resources.get_mut(resource) {
            Some(quota) if today > quota.reset_date => {
                quota.reset_date = today;
                quota.remaining = max;
                true
            }
            Some(_) => false,
            None => {
                self.resources.insert(
                    resource.to_string(),
                    ResourceQuota {
                        reset_date: today,
                        remaining: max,
                    },
                );
                true
            }
        }
    }

    /// Refresh, then take one unit if any is left.
    pub fn try_consume(&mut self, resource: &str, today: NaiveDate, max: u32) -> bool {
        self.refresh(resource, today, max);
        match self.resources.get_mut(resource) {
            Some(quota) if quota.remaining > 0 => {
                quota.remaining -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn remaining(&self, resource: &str) -> Option<u32> {
        self.resources.get(resource).map(|quota| quota.remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).expect("valid date")
    }

    #[test]
    fn rollover_resets_to_max_regardless_of_prior_value() {
        for prior in [0, 3, 100, 250] {
            let mut state = QuotaState::default();
            state.resources.insert(
                REASON_RESOURCE.to_string(),
                ResourceQuota {
                    reset_date: day(1),
                    remaining: prior,
                },
            );
            assert!(state.refresh(REASON_RESOURCE, day(2), 100));
            assert_eq!(state.remaining(REASON_RESOURCE), Some(100));
        }
    }

    #[test]
    fn refresh_resets_only_once_per_date() {
        let mut state = QuotaState::default();
        assert!(state.try_consume(REASON_RESOURCE, day(1), 2));
        assert!(!state.refresh(REASON_RESOURCE, day(1), 2));
        assert_eq!(state.remaining(REASON_RESOURCE), Some(1));
    }

    #[test]
    fn consume_stops_at_zero_until_next_day() {
        let mut state = QuotaState::default();
        assert!(state.try_consume(REASON_RESOURCE, day(1), 1));
        assert!(!state.try_consume(REASON_RESOURCE, day(1), 1));
        assert_eq!(state.remaining(REASON_RESOURCE), Some(0));

        assert!(state.try_consume(REASON_RESOURCE, day(2), 1));
        assert_eq!(state.remaining(REASON_RESOURCE), Some(0));
    }

    #[test]
    fn clock_going_backwards_does_not_reset() {
        let mut state = QuotaState::default();
        state.try_consume(REASON_RESOURCE, day(5), 3);
        assert!(!state.refresh(REASON_RESOURCE, day(4), 3));
        assert_eq!(state.remaining(REASON_RESOURCE), Some(2));
    }
}
