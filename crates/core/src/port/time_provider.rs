// Time Provider Port (for testability)

use chrono::{DateTime, Utc};

/// Time provider interface (allows mocking in tests)
pub trait TimeProvider: Send + Sync {
    /// Current UTC time
    fn now(&self) -> DateTime<Utc>;
}

/// System time provider (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Manually driven clock
    pub struct MockTimeProvider {
        millis: AtomicI64,
    }

    impl MockTimeProvider {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                millis: AtomicI64::new(start.timestamp_millis()),
            }
        }

        pub fn advance(&self, by: std::time::Duration) {
            self.millis
                .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
        }

        pub fn set(&self, at: DateTime<Utc>) {
            self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
        }
    }

    impl TimeProvider for MockTimeProvider {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst))
                .unwrap_or_default()
        }
    }
}
