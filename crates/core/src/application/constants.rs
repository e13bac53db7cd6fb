// Engine constants (no magic values)
use std::time::Duration;

/// Platform limit for one message's content, in characters
pub const PLATFORM_MESSAGE_LIMIT: usize = 2000;

/// Default payload characters per carrier (header fits in the remainder)
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 1900;

/// Dispatcher lanes with no traffic for this long are retired
pub const DEFAULT_LANE_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Unused per-key locks are pruned once the lock table grows past this
pub const KEY_LOCK_PRUNE_THRESHOLD: usize = 1024;

/// Default number of members shown by a bounded list
pub const DEFAULT_LIST_LIMIT: usize = 8;
