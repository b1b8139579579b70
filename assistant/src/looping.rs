//! The agent loop: plan, dispatch, record, until done or out of steps.

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::discrepancy;
use crate::core::types::{AgentState, ToolResult};
use crate::dispatch::Dispatcher;
use crate::memory::Memory;
use crate::planner::Planner;

/// Prefix that marks discrepancy warnings in history and memory.
pub const DISCREPANCY_BANNER: &str = "!!! DISCREPANCY !!!";

fn status_line(step: u32, result: &ToolResult) -> String {
    if result.success {
        match result.payload.get("summary").and_then(Value::as_str) {
            Some(summary) => format!("Step {step}: {} succeeded: {summary}", result.tool),
            None => format!("Step {step}: {} succeeded", result.tool),
        }
    } else {
        format!(
            "Step {step}: {} failed: {}",
            result.tool,
            result.error_message.as_deref().unwrap_or("unknown error")
        )
    }
}

fn memory_entry(result: &ToolResult) -> String {
    let body = if result.success {
        let payload = serde_json::to_string(&result.payload).unwrap_or_else(|_| "{}".to_string());
        format!("Tool {} result: {payload}", result.tool)
    } else {
        format!(
            "Tool {} failed: {}",
            result.tool,
            result.error_message.as_deref().unwrap_or("unknown error")
        )
    };
    if result.warnings.is_empty() {
        return body;
    }
    let mut entry = String::new();
    for warning in &result.warnings {
        entry.push_str(&format!("{DISCREPANCY_BANNER} {warning}\n"));
    }
    entry.push_str(&body);
    entry
}

/// Run `state` to termination and hand it back.
///
/// Per-step failures (unknown tools, failing capabilities, unusable planner
/// output) are recorded and the loop moves on; nothing here returns an error.
/// With no step ceiling the run ends only when a result requests completion.
#[instrument(skip_all, fields(goal = %state.goal(), max_steps = ?state.max_steps()))]
pub fn run_agent(
    mut state: AgentState,
    dispatcher: &Dispatcher<'_>,
    planner: &mut dyn Planner,
    memory: &mut dyn Memory,
    memory_window: usize,
) -> AgentState {
    let catalog = dispatcher.registry().catalog();
    info!(tools = catalog.len(), "agent run started");

    while !state.is_terminated() {
        let step = state.begin_step();
        let context = memory.build_context(memory_window);
        let proposal = planner.propose(&state, &context, &catalog);
        debug!(step, tool = %proposal.tool, "planner proposed");
        state.add_history(format!(
            "Step {step}: planner proposed {} ({})",
            proposal.tool, proposal.rationale
        ));

        if !dispatcher.registry().contains(&proposal.tool) {
            warn!(step, tool = %proposal.tool, "proposed tool not registered");
            let note = format!("No tool named '{}' registered. Skipping.", proposal.tool);
            memory.append(&note);
            state.add_history(note);
            state.check_step_limit();
            continue;
        }

        let mut result = dispatcher.invoke(&proposal.tool, &proposal.arguments);
        if let Some(reconciliation) = discrepancy::annotate(&mut result) {
            warn!(
                step,
                estimated = reconciliation.estimated,
                actual = reconciliation.actual,
                "count discrepancy"
            );
        }

        state.add_history(status_line(step, &result));
        for warning in &result.warnings {
            state.add_history(format!("{DISCREPANCY_BANNER} {warning}"));
        }
        memory.append(&memory_entry(&result));
        state.add_result(result);
        state.check_step_limit();
    }

    info!(
        steps = state.step_count(),
        stop = ?state.stop_reason(),
        "agent run finished"
    );
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ActionProposal, Arguments, Goal, StopReason};
    use crate::memory::WorkingMemory;
    use crate::test_support::{FailingCapability, ScriptedPlanner, StaticCapability, args};
    use crate::tools::ToolRegistry;
    use crate::tools::noop::Noop;
    use serde_json::json;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Noop);
        registry.register(StaticCapability::new(
            "count",
            json!({ "returned": 5, "total": 50, "summary": "Found 5 emails" }),
        ));
        registry.register(FailingCapability::new("broken", "backend unavailable"));
        registry
    }

    fn run(planner: &mut ScriptedPlanner, max_steps: Option<u32>) -> (AgentState, WorkingMemory) {
        let registry = registry();
        let dispatcher = Dispatcher::new(&registry, false);
        let mut memory = WorkingMemory::new();
        let state = AgentState::new(Goal::new("count my mail"), max_steps);
        let state = run_agent(state, &dispatcher, planner, &mut memory, 10);
        (state, memory)
    }

    #[test]
    fn finishes_when_result_requests_completion() {
        let mut planner = ScriptedPlanner::new(vec![ActionProposal::finish("nothing to do")]);
        let (state, _) = run(&mut planner, Some(10));
        assert_eq!(state.step_count(), 1);
        assert_eq!(state.stop_reason(), Some(StopReason::Completed));
        assert_eq!(
            state.history().as_slice()[0],
            "Step 1: planner proposed noop (nothing to do)"
        );
    }

    #[test]
    fn idle_planner_stops_at_step_ceiling() {
        let mut planner = ScriptedPlanner::always_idle();
        let (state, _) = run(&mut planner, Some(3));
        assert_eq!(state.step_count(), 3);
        assert_eq!(state.results().len(), 3);
        assert_eq!(state.stop_reason(), Some(StopReason::MaxStepsReached));
        assert_eq!(planner.contexts.len(), 3);
    }

    #[test]
    fn unregistered_tool_is_skipped_without_result() {
        let mut planner = ScriptedPlanner::new(vec![ActionProposal::new(
            "teleport",
            Arguments::new(),
            "why not",
        )]);
        let (state, _) = run(&mut planner, Some(5));
        assert!(
            state
                .history()
                .iter()
                .any(|h| h == "No tool named 'teleport' registered. Skipping.")
        );
        // Only the finishing no-op produced a result.
        assert_eq!(state.results().len(), 1);
        assert_eq!(state.step_count(), 2);
    }

    #[test]
    fn discrepancy_reaches_history_and_next_context() {
        let mut planner = ScriptedPlanner::new(vec![ActionProposal::new(
            "count",
            args(json!({ "query": "is:unread" })),
            "count unread",
        )]);
        let (state, memory) = run(&mut planner, Some(5));

        let first = &state.results().as_slice()[0];
        assert!(first.success);
        assert_eq!(first.warnings.len(), 1);
        assert!(
            state
                .history()
                .iter()
                .any(|h| h.starts_with(DISCREPANCY_BANNER))
        );
        assert!(planner.contexts[1].contains(DISCREPANCY_BANNER));
        assert!(memory.build_context(10).contains("50"));
    }

    #[test]
    fn failures_are_recorded_and_loop_continues() {
        let mut planner = ScriptedPlanner::new(vec![ActionProposal::new(
            "broken",
            Arguments::new(),
            "try it",
        )]);
        let (state, _) = run(&mut planner, Some(5));
        let first = &state.results().as_slice()[0];
        assert!(!first.success);
        assert!(
            state
                .history()
                .iter()
                .any(|h| h == "Step 1: broken failed: backend unavailable")
        );
        assert_eq!(state.stop_reason(), Some(StopReason::Completed));
    }

    #[test]
    fn zero_step_ceiling_runs_nothing() {
        let mut planner = ScriptedPlanner::always_idle();
        let (state, _) = run(&mut planner, Some(0));
        assert_eq!(state.step_count(), 0);
        assert!(state.history().is_empty());
        assert!(planner.contexts.is_empty());
    }
}
