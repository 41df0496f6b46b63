// ABOUTME: Wall-clock seam used by backends for TTL assignment and expiry checks.
// ABOUTME: Production code uses SystemClock; tests substitute a manually advanced clock.

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Type alias for the Arc-wrapped clock shared by a backend.
pub type SharedClock = Arc<dyn Clock>;

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// A clock that only moves when told to.
    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn new(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(now),
            })
        }

        pub fn advance(&self, by: chrono::Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }
}
