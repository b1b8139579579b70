//! Planning collaborators.
//!
//! A [`Planner`] proposes the next action from the run state, the memory
//! context and the tool catalog. It never executes anything and never fails:
//! problems are folded into an idle no-op proposal whose rationale explains
//! what went wrong, so the loop keeps going.

pub mod goal;
pub mod llm;

use anyhow::Result;

use crate::core::types::{ActionProposal, AgentState};
use crate::tools::ToolInfo;

pub use goal::GoalPlanner;
pub use llm::{LlmPlanner, LlmToolClassifier};

pub trait Planner {
    fn propose(&mut self, state: &AgentState, context: &str, tools: &[ToolInfo]) -> ActionProposal;
}

/// Picks the tools a goal needs, as an alternative to the keyword table.
pub trait ToolClassifier {
    fn classify(&self, goal: &str, tools: &[ToolInfo]) -> Result<Vec<String>>;
}
