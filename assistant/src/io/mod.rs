//! I/O helpers: configuration, child processes, model client, fixture backends.

pub mod config;
pub mod fixtures;
pub mod llm;
pub mod process;
