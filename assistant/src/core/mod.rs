//! Deterministic, pure logic for goal resolution.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod dates;
pub mod discrepancy;
pub mod filters;
pub mod params;
pub mod selector;
pub mod suggestions;
pub mod tool_ids;
pub mod types;
