//! One-shot task runs and dry-run plan resolution.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::instrument;

use crate::core::params::{PlannedCall, plan_calls};
use crate::core::selector::select_tools;
use crate::core::suggestions::suggest_tools;
use crate::core::types::{AgentState, Goal, StopReason, ToolResult};
use crate::dispatch::Dispatcher;
use crate::io::config::AgentConfig;
use crate::looping::run_agent;
use crate::memory::WorkingMemory;
use crate::planner::Planner;
use crate::tools::ToolRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOptions {
    pub max_steps: Option<u32>,
    pub memory_window: usize,
    pub approve_destructive: bool,
}

impl From<&AgentConfig> for TaskOptions {
    fn from(config: &AgentConfig) -> Self {
        Self {
            max_steps: Some(config.max_steps),
            memory_window: config.memory_window,
            approve_destructive: config.approve_destructive,
        }
    }
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

/// Outcome of one task, suitable for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub goal: String,
    /// No recorded tool call failed.
    pub ok: bool,
    /// A tool result requested completion before the step ceiling.
    pub complete: bool,
    pub stop_reason: Option<StopReason>,
    pub steps_executed: u32,
    pub results: Vec<ToolResult>,
    pub history: Vec<String>,
    pub warnings: Vec<String>,
    pub suggested_tools: Vec<String>,
}

impl TaskReport {
    pub fn from_state(state: &AgentState) -> Self {
        let results: Vec<ToolResult> = state.results().iter().cloned().collect();
        let warnings = results
            .iter()
            .flat_map(|r| r.warnings.iter().cloned())
            .collect();
        Self {
            goal: state.goal().to_string(),
            ok: results.iter().all(|r| r.success),
            complete: state.stop_reason() == Some(StopReason::Completed),
            stop_reason: state.stop_reason(),
            steps_executed: state.step_count(),
            results,
            history: state.history().iter().cloned().collect(),
            warnings,
            suggested_tools: suggest_tools(state.goal().as_str()),
        }
    }
}

/// Run `goal` with a fresh state and memory.
#[instrument(skip_all, fields(goal = %goal))]
pub fn run_task(
    goal: &str,
    options: &TaskOptions,
    registry: &ToolRegistry,
    planner: &mut dyn Planner,
) -> TaskReport {
    let dispatcher = Dispatcher::new(registry, options.approve_destructive);
    let mut memory = WorkingMemory::new();
    let state = AgentState::new(Goal::new(goal), options.max_steps);
    let state = run_agent(
        state,
        &dispatcher,
        planner,
        &mut memory,
        options.memory_window,
    );
    TaskReport::from_state(&state)
}

/// Dry-run view of what the deterministic planner would do.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub goal: String,
    pub reference_date: NaiveDate,
    pub calls: Vec<PlannedCall>,
    pub suggested_tools: Vec<String>,
}

/// Select tools for `goal` and resolve their arguments without dispatching.
pub fn resolve_plan(goal: &str, reference: NaiveDate) -> Vec<PlannedCall> {
    plan_calls(goal, select_tools(goal), reference)
}

pub fn plan_report(goal: &str, reference: NaiveDate) -> PlanReport {
    PlanReport {
        goal: goal.to_string(),
        reference_date: reference,
        calls: resolve_plan(goal, reference),
        suggested_tools: suggest_tools(goal),
    }
}
