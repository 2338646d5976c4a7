//! Wall-clock adapter.
//!
//! [`SystemClock`] is the production [`Clock`]: UTC from the OS.  Tests
//! and the simulator substitute their own implementations.

use chrono::{DateTime, Utc};

use crate::app::ports::Clock;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
