//! Process exit codes. Part of the public contract of `lakeplan`.

pub const SUCCESS: i32 = 0;
pub const VALIDATION_FAILED: i32 = 1; // Rejected descriptor/path, collision, invalid layout, failed actions
pub const INTERNAL_ERROR: i32 = 2; // Config, store connection or I/O error
