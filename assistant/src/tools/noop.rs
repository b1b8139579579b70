use anyhow::Result;
use serde_json::json;

use crate::core::tool_ids;
use crate::core::types::{Arguments, Payload};
use crate::tools::Capability;
use crate::tools::args::optional_bool;

/// Takes no action. `done` (default true) is echoed back so a planner can
/// either finish the run or idle for a step.
pub struct Noop;

impl Capability for Noop {
    fn name(&self) -> &str {
        tool_ids::NOOP
    }

    fn description(&self) -> &str {
        "Take no action. Pass done=true when the goal is satisfied."
    }

    fn invoke(&self, args: &Arguments) -> Result<Payload> {
        let done = optional_bool(args, "done")?.unwrap_or(true);
        let mut payload = Payload::new();
        payload.insert("done".to_string(), json!(done));
        payload.insert("message".to_string(), json!("No action taken"));
        Ok(payload)
    }
}
