// Processor defaults (no magic values in the loop)
use std::time::Duration;

/// Jobs pulled from `submitted` per cycle
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Provider status polls per job per cycle
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 15;

/// Delay between status polls (4s)
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(4);

/// Upper bound for a single status poll (20s)
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(20);

/// In-progress jobs older than this are failed without polling (1h)
pub const DEFAULT_MAX_JOB_AGE: Duration = Duration::from_secs(60 * 60);

/// Sleep after an empty cycle (30s)
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(30);

/// Sleep once the idle streak reaches the threshold (120s)
pub const DEFAULT_EXTENDED_IDLE_INTERVAL: Duration = Duration::from_secs(120);

/// Consecutive empty cycles before the extended interval applies
pub const DEFAULT_IDLE_CYCLES_BEFORE_BACKOFF: u32 = 3;

/// Pause between cycles while work remains (1s)
pub const DEFAULT_BUSY_INTERVAL: Duration = Duration::from_secs(1);

/// Sleep after an unexpected cycle error (10s)
pub const DEFAULT_ERROR_COOLDOWN: Duration = Duration::from_secs(10);

/// Completed jobs considered for the average processing time
pub const STATS_WINDOW: usize = 10;

/// Staging status checks in the waitForDownstream step
pub const DEFAULT_DOWNSTREAM_WAIT_ATTEMPTS: u32 = 3;

/// Delay between staging status checks (2s)
pub const DEFAULT_DOWNSTREAM_WAIT_DELAY: Duration = Duration::from_secs(2);
