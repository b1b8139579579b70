//! Deterministic planner: select tools once, resolve their arguments, then finish.

use std::collections::VecDeque;

use chrono::NaiveDate;
use tracing::{debug, instrument, warn};

use crate::core::params::{PlannedCall, plan_calls};
use crate::core::selector::select_tools;
use crate::core::tool_ids;
use crate::core::types::{ActionProposal, AgentState};
use crate::planner::{Planner, ToolClassifier};
use crate::tools::ToolInfo;

/// Proposes one resolved call per selected tool, in selection order, then a
/// finishing no-op. Dates resolve against a fixed reference day so a replay
/// of the same goal yields the same proposals.
///
/// A goal that resolves to N calls needs N + 1 steps to complete: with a
/// ceiling of N every call still runs, but the run stops at the ceiling
/// instead of completing.
pub struct GoalPlanner {
    reference: NaiveDate,
    classifier: Option<Box<dyn ToolClassifier>>,
    pending: Option<VecDeque<(PlannedCall, &'static str)>>,
}

impl GoalPlanner {
    pub fn new(reference: NaiveDate) -> Self {
        Self {
            reference,
            classifier: None,
            pending: None,
        }
    }

    /// Ask `classifier` first; the keyword table remains the fallback.
    pub fn with_classifier(mut self, classifier: Box<dyn ToolClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    fn select(&self, goal: &str, tools: &[ToolInfo]) -> (Vec<String>, &'static str) {
        if let Some(classifier) = &self.classifier {
            match classifier.classify(goal, tools) {
                Ok(names) => {
                    let known: Vec<String> = names
                        .into_iter()
                        .filter(|name| tool_ids::is_selectable(name))
                        .filter(|name| tools.is_empty() || tools.iter().any(|t| &t.name == name))
                        .collect();
                    if !known.is_empty() {
                        return (known, "classifier");
                    }
                    warn!("classifier chose no known tools, using keyword table");
                }
                Err(err) => warn!(err = %format!("{err:#}"), "classifier failed, using keyword table"),
            }
        }
        let names = select_tools(goal).into_iter().map(str::to_string).collect();
        (names, "keyword match")
    }

    fn plan(&self, goal: &str, tools: &[ToolInfo]) -> VecDeque<(PlannedCall, &'static str)> {
        let (names, source) = self.select(goal, tools);
        debug!(?names, source, "selected tools");
        plan_calls(goal, names.iter().map(String::as_str), self.reference)
            .into_iter()
            .map(|call| (call, source))
            .collect()
    }
}

impl Planner for GoalPlanner {
    #[instrument(skip_all, fields(step = state.step_count()))]
    fn propose(&mut self, state: &AgentState, _context: &str, tools: &[ToolInfo]) -> ActionProposal {
        if self.pending.is_none() {
            self.pending = Some(self.plan(state.goal().as_str(), tools));
        }
        match self.pending.as_mut().and_then(VecDeque::pop_front) {
            Some((call, source)) => {
                let mut rationale = format!("{} selected by {source}", call.tool);
                if !call.notes.is_empty() {
                    rationale.push_str(&format!(" ({})", call.notes.join("; ")));
                }
                ActionProposal::new(call.tool, call.arguments, rationale)
            }
            None => ActionProposal::finish("all planned calls dispatched"),
        }
    }
}
