//! Typed accessors for capability arguments. `null` counts as absent.

use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::core::types::Arguments;

fn present<'a>(args: &'a Arguments, key: &str) -> Option<&'a Value> {
    args.get(key).filter(|v| !v.is_null())
}

pub fn optional_str<'a>(args: &'a Arguments, key: &str) -> Result<Option<&'a str>> {
    match present(args, key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(anyhow!("argument '{key}' must be a string (got {other})")),
    }
}

pub fn required_str<'a>(args: &'a Arguments, key: &str) -> Result<&'a str> {
    optional_str(args, key)?.ok_or_else(|| anyhow!("missing required argument '{key}'"))
}

pub fn optional_bool(args: &Arguments, key: &str) -> Result<Option<bool>> {
    match present(args, key) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(anyhow!("argument '{key}' must be a boolean (got {other})")),
    }
}

pub fn optional_u64(args: &Arguments, key: &str) -> Result<Option<u64>> {
    match present(args, key) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| anyhow!("argument '{key}' must be a non-negative integer (got {value})")),
    }
}
