//! Crate-wide constants.

pub const APP_NAME: &str = "stint";

/// Length of the truncated hash used for identity keys on disk.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// Version written into every persisted history record.
pub const HISTORY_FORMAT_VERSION: u32 = 1;

/// Extension of the lock file kept beside each workspace directory.
pub const WORKSPACE_LOCK_EXTENSION: &str = "lock";

/// Version written into workspace lock metadata.
pub const WORKSPACE_LOCK_VERSION: u32 = 1;

/// Upper bound on the number of out-of-date reasons reported for one execution.
pub const MAX_OUT_OF_DATE_MESSAGES: usize = 3;
