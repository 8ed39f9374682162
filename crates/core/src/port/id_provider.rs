// Local job id generation

/// Source of ids for jobs the provider did not number
pub trait IdProvider: Send + Sync {
    fn generate_id(&self) -> String;
}

/// `local-<uuid v4>`; the prefix keeps generated ids apart from provider ids
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn generate_id(&self) -> String {
        format!("local-{}", uuid::Uuid::new_v4())
    }
}

// ============================================================================
// Mock Implementation (for testing)
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Deterministic `local-1`, `local-2`, ...
    #[derive(Default)]
    pub struct SequentialIdProvider {
        next: AtomicU64,
    }

    impl SequentialIdProvider {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl IdProvider for SequentialIdProvider {
        fn generate_id(&self) -> String {
            format!("local-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }
}
