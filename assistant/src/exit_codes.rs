//! Stable exit codes for `assistant` CLI commands.

/// Command succeeded; for `run`, the task finished before the step ceiling.
pub const OK: i32 = 0;
/// Invalid arguments, config, credentials or fixture files.
pub const INVALID: i32 = 1;
/// `assistant run` hit the step ceiling before any tool reported completion.
pub const INCOMPLETE: i32 = 2;
