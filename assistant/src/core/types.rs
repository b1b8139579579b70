//! Shared deterministic types for the goal-resolution engine.
//!
//! These types define stable contracts between the selector, resolver,
//! dispatcher and loop. They do not depend on external state or I/O.

use std::fmt;

use anyhow::{Result, anyhow};
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured tool arguments (name → JSON value).
pub type Arguments = Map<String, Value>;

/// Tool-specific result payload.
pub type Payload = Map<String, Value>;

/// The natural-language task description driving one agent run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Goal(String);

impl Goal {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of the no-op tool used to finish (or idle through) a run.
pub const NOOP_TOOL: &str = "noop";

/// A proposed next action. Produced by planning, never executed by the producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionProposal {
    pub tool: String,
    #[serde(default)]
    pub arguments: Arguments,
    #[serde(default)]
    pub rationale: String,
}

impl ActionProposal {
    pub fn new(tool: impl Into<String>, arguments: Arguments, rationale: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            arguments,
            rationale: rationale.into(),
        }
    }

    /// No-op that asks the loop to finish after this step.
    pub fn finish(rationale: impl Into<String>) -> Self {
        Self::new(NOOP_TOOL, Arguments::new(), rationale)
    }

    /// No-op that keeps the loop running (used when planning fails).
    pub fn idle(rationale: impl Into<String>) -> Self {
        let mut arguments = Arguments::new();
        arguments.insert("done".to_string(), Value::Bool(false));
        Self::new(NOOP_TOOL, arguments, rationale)
    }
}

/// Outcome of a single tool invocation.
///
/// A failed result always carries a non-empty `error_message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool: String,
    pub success: bool,
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ToolResult {
    pub fn ok(tool: impl Into<String>, payload: Payload) -> Self {
        Self {
            tool: tool.into(),
            success: true,
            payload,
            error_message: None,
            warnings: Vec::new(),
        }
    }

    pub fn failure(tool: impl Into<String>, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "unknown error".to_string();
        }
        Self {
            tool: tool.into(),
            success: false,
            payload: Payload::new(),
            error_message: Some(message),
            warnings: Vec::new(),
        }
    }

    /// True when the payload carries `"done": true`.
    pub fn requests_completion(&self) -> bool {
        matches!(self.payload.get("done"), Some(Value::Bool(true)))
    }
}

/// Append-only buffer: entries can be added and read, never edited or removed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AppendLog<T>(Vec<T>);

impl<T> AppendLog<T> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, entry: T) {
        self.0.push(entry);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&T> {
        self.0.last()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }
}

impl<T> Default for AppendLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> IntoIterator for &'a AppendLog<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A tool result requested completion.
    Completed,
    /// The step ceiling was reached first.
    MaxStepsReached,
}

/// Mutable state for one agent run.
///
/// Created once per task, mutated in place by the loop, discarded when the
/// caller is done with it. `terminated` is absorbing.
#[derive(Debug, Clone, Serialize)]
pub struct AgentState {
    goal: Goal,
    step_count: u32,
    max_steps: Option<u32>,
    history: AppendLog<String>,
    results: AppendLog<ToolResult>,
    terminated: bool,
    stop_reason: Option<StopReason>,
}

impl AgentState {
    pub fn new(goal: Goal, max_steps: Option<u32>) -> Self {
        let mut state = Self {
            goal,
            step_count: 0,
            max_steps,
            history: AppendLog::new(),
            results: AppendLog::new(),
            terminated: false,
            stop_reason: None,
        };
        // A zero ceiling leaves nothing to run.
        state.check_step_limit();
        state
    }

    pub fn goal(&self) -> &Goal {
        &self.goal
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn max_steps(&self) -> Option<u32> {
        self.max_steps
    }

    pub fn history(&self) -> &AppendLog<String> {
        &self.history
    }

    pub fn results(&self) -> &AppendLog<ToolResult> {
        &self.results
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Advance the step counter. Returns the new step number.
    pub fn begin_step(&mut self) -> u32 {
        self.step_count += 1;
        self.step_count
    }

    pub fn add_history(&mut self, entry: impl Into<String>) {
        self.history.push(entry.into());
    }

    /// Record a tool result; completion requests terminate the run.
    pub fn add_result(&mut self, result: ToolResult) {
        let done = result.requests_completion();
        self.results.push(result);
        if done {
            self.terminate(StopReason::Completed);
        }
    }

    /// Re-evaluate the step ceiling after a step finished.
    pub fn check_step_limit(&mut self) {
        if let Some(max) = self.max_steps
            && self.step_count >= max
        {
            self.terminate(StopReason::MaxStepsReached);
        }
    }

    fn terminate(&mut self, reason: StopReason) {
        if !self.terminated {
            self.terminated = true;
            self.stop_reason = Some(reason);
        }
    }
}

/// Inclusive calendar date range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(anyhow!("date range start {start} is after end {end}"));
        }
        Ok(Self { start, end })
    }

    /// A single-day range.
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Monday to Sunday week containing `date`.
    ///
    /// At the edges of the representable calendar the week is cut short at
    /// [`NaiveDate::MIN`] or [`NaiveDate::MAX`].
    pub fn week_of(date: NaiveDate) -> Self {
        let back = u64::from(date.weekday().num_days_from_monday());
        let monday = date.checked_sub_days(Days::new(back)).unwrap_or(NaiveDate::MIN);
        Self::week_starting(monday)
    }

    /// Seven-day range beginning at `monday`, ending no later than [`NaiveDate::MAX`].
    pub(crate) fn week_starting(monday: NaiveDate) -> Self {
        Self {
            start: monday,
            end: monday.checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

/// Service estimate vs. retrieved count for one query. Transient, not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CountReconciliation {
    pub estimated: u64,
    pub actual: u64,
    pub discrepancy_ratio: f64,
}
