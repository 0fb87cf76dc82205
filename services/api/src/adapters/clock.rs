//! services/api/src/adapters/clock.rs

use chrono::{DateTime, FixedOffset, Local};
use progress_journal_core::ports::Clock;

/// Reads the host's wall clock in its local offset.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().into()
    }
}
