/// Maximum length of an assignment role label, in bytes.
pub const MAX_ROLE_LEN: usize = 256;

/// Maximum assignments a single engineer may hold at once.
pub const MAX_ASSIGNMENTS_PER_ENGINEER: usize = 1024;

/// Widest assignment range accepted, in days (inclusive).
pub const MAX_RANGE_DAYS: i64 = 3_660;

/// Upper bound on a single allocation, in percent.
pub const MAX_ALLOCATION_PERCENT: u32 = 100;

/// Maximum size of one persisted snapshot frame, in bytes.
pub const MAX_FRAME_LEN: usize = 64 * 1024;
