//! Wall clock and sleeping, injectable for tests.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Current UTC date; the quota day boundary.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}
