//! Goal-resolution and execution engine for a mail and calendar assistant.
//!
//! A natural-language goal is mapped to tool calls, the calls are dispatched,
//! and a bounded loop records every step. The crate keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (tool selection, date inference,
//!   query construction, parameter resolution, discrepancy detection).
//! - **[`io`]**: Side effects (config files, child processes, the model
//!   client, JSON fixture backends).
//! - **[`tools`]**: The capability interface, registry and concrete tools.
//!
//! Orchestration modules ([`dispatch`], [`planner`], [`looping`], [`task`])
//! combine these into runs driven by the CLI.

pub mod core;
pub mod dispatch;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod memory;
pub mod planner;
pub mod task;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
