//! Model-backed planning.
//!
//! Prompts are minijinja templates; responses are JSON objects checked against
//! bundled JSON Schemas (draft 2020-12) before use.

use std::rc::Rc;

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::{Draft, Validator};
use minijinja::{Environment, context};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::core::types::{ActionProposal, AgentState, Arguments, NOOP_TOOL};
use crate::io::llm::LlmClient;
use crate::planner::{Planner, ToolClassifier};
use crate::tools::ToolInfo;

const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");
const CLASSIFIER_TEMPLATE: &str = include_str!("prompts/classifier.md");
const PROPOSAL_SCHEMA: &str = include_str!("../../schemas/action_proposal.schema.json");
const SELECTION_SCHEMA: &str = include_str!("../../schemas/tool_selection.schema.json");

/// Proposal as the model writes it.
#[derive(Debug, Deserialize)]
struct WireProposal {
    #[serde(default = "default_tool")]
    name: String,
    #[serde(default)]
    args: Arguments,
    #[serde(default = "default_reason")]
    reason: String,
}

fn default_tool() -> String {
    NOOP_TOOL.to_string()
}

fn default_reason() -> String {
    "model response".to_string()
}

#[derive(Debug, Deserialize)]
struct WireSelection {
    tools: Vec<String>,
}

fn compile_schema(raw: &str, label: &str) -> Result<Validator> {
    let schema: Value =
        serde_json::from_str(raw).with_context(|| format!("parse {label} schema"))?;
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .map_err(|err| anyhow!("compile {label} schema: {err}"))
}

fn templates() -> Environment<'static> {
    let mut env = Environment::new();
    env.add_template("planner", PLANNER_TEMPLATE)
        .expect("planner template should be valid");
    env.add_template("classifier", CLASSIFIER_TEMPLATE)
        .expect("classifier template should be valid");
    env
}

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Parse a model response as JSON and validate it against `validator`.
fn parse_validated(text: &str, validator: &Validator) -> Result<Value> {
    let cleaned = strip_code_fences(text);
    let value: Value = match serde_json::from_str(cleaned) {
        Ok(value) => value,
        // Models sometimes wrap the object in prose.
        Err(err) => match (cleaned.find('{'), cleaned.rfind('}')) {
            (Some(start), Some(end)) if start < end => serde_json::from_str(&cleaned[start..=end])
                .with_context(|| format!("response is not json: {err}"))?,
            _ => bail!("response is not json: {err}"),
        },
    };
    let messages: Vec<String> = validator
        .iter_errors(&value)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed: {}", messages.join("; "));
    }
    Ok(value)
}

/// Asks a language model for each next action.
pub struct LlmPlanner {
    client: Rc<dyn LlmClient>,
    env: Environment<'static>,
    validator: Validator,
}

impl LlmPlanner {
    pub fn new(client: Rc<dyn LlmClient>) -> Result<Self> {
        Ok(Self {
            client,
            env: templates(),
            validator: compile_schema(PROPOSAL_SCHEMA, "action proposal")?,
        })
    }

    pub fn render_prompt(
        &self,
        state: &AgentState,
        context: &str,
        tools: &[ToolInfo],
    ) -> Result<String> {
        let template = self.env.get_template("planner")?;
        let rendered = template.render(context! {
            goal => state.goal().as_str().trim(),
            step => state.step_count(),
            max_steps => state.max_steps(),
            context => (!context.trim().is_empty()).then(|| context.trim()),
            tools => tools,
        })?;
        Ok(rendered)
    }

    /// Turn raw model output into a proposal.
    pub fn parse_response(&self, text: &str) -> Result<ActionProposal> {
        let value = parse_validated(text, &self.validator)?;
        let wire: WireProposal =
            serde_json::from_value(value).context("deserialize action proposal")?;
        Ok(ActionProposal::new(wire.name, wire.args, wire.reason))
    }

    fn try_propose(
        &self,
        state: &AgentState,
        context: &str,
        tools: &[ToolInfo],
    ) -> Result<ActionProposal> {
        let prompt = self
            .render_prompt(state, context, tools)
            .context("render planner prompt")?;
        let response = self.client.complete(&prompt).context("planner call failed")?;
        self.parse_response(&response)
            .context("could not use planner response")
    }
}

impl Planner for LlmPlanner {
    #[instrument(skip_all, fields(step = state.step_count()))]
    fn propose(&mut self, state: &AgentState, context: &str, tools: &[ToolInfo]) -> ActionProposal {
        match self.try_propose(state, context, tools) {
            Ok(proposal) => {
                debug!(tool = %proposal.tool, "model proposed action");
                proposal
            }
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(err = %reason, "planning failed, idling");
                ActionProposal::idle(reason)
            }
        }
    }
}

/// Tool selection by a language model.
pub struct LlmToolClassifier {
    client: Rc<dyn LlmClient>,
    env: Environment<'static>,
    validator: Validator,
}

impl LlmToolClassifier {
    pub fn new(client: Rc<dyn LlmClient>) -> Result<Self> {
        Ok(Self {
            client,
            env: templates(),
            validator: compile_schema(SELECTION_SCHEMA, "tool selection")?,
        })
    }
}

impl ToolClassifier for LlmToolClassifier {
    #[instrument(skip_all)]
    fn classify(&self, goal: &str, tools: &[ToolInfo]) -> Result<Vec<String>> {
        let template = self.env.get_template("classifier")?;
        let prompt = template
            .render(context! { goal => goal.trim(), tools => tools })
            .context("render classifier prompt")?;
        let response = self
            .client
            .complete(&prompt)
            .context("classifier call failed")?;
        let value = parse_validated(&response, &self.validator)?;
        let selection: WireSelection =
            serde_json::from_value(value).context("deserialize tool selection")?;
        debug!(tools = ?selection.tools, "model selected tools");
        Ok(selection.tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Goal;
    use crate::test_support::ScriptedLlm;
    use serde_json::json;

    fn catalog() -> Vec<ToolInfo> {
        vec![ToolInfo {
            name: "query_email".to_string(),
            description: "Search emails".to_string(),
            destructive: false,
        }]
    }

    fn state() -> AgentState {
        AgentState::new(Goal::new("count unread emails"), Some(5))
    }

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {} "), "{}");
    }

    #[test]
    fn parses_fenced_proposal() {
        let llm = Rc::new(ScriptedLlm::new(vec![Ok(
            "```json\n{\"name\":\"query_email\",\"args\":{\"query\":\"is:unread\",\"count_all\":true},\"reason\":\"count them\"}\n```"
                .to_string(),
        )]));
        let mut planner = LlmPlanner::new(llm.clone()).expect("planner");
        let proposal = planner.propose(&state(), "", &catalog());
        assert_eq!(proposal.tool, "query_email");
        assert_eq!(proposal.arguments.get("count_all"), Some(&json!(true)));
        assert_eq!(proposal.rationale, "count them");
    }

    #[test]
    fn missing_fields_get_defaults() {
        let llm = Rc::new(ScriptedLlm::new(vec![Ok("{\"reason\":\"done\"}".to_string())]));
        let mut planner = LlmPlanner::new(llm).expect("planner");
        let proposal = planner.propose(&state(), "", &catalog());
        assert_eq!(proposal.tool, NOOP_TOOL);
        assert!(proposal.arguments.is_empty());
    }

    #[test]
    fn malformed_response_idles() {
        let llm = Rc::new(ScriptedLlm::new(vec![Ok("I think you should count".to_string())]));
        let mut planner = LlmPlanner::new(llm).expect("planner");
        let proposal = planner.propose(&state(), "", &catalog());
        assert_eq!(proposal.tool, NOOP_TOOL);
        assert_eq!(proposal.arguments.get("done"), Some(&json!(false)));
        assert!(proposal.rationale.contains("not json"));
    }

    #[test]
    fn schema_violation_idles() {
        let llm = Rc::new(ScriptedLlm::new(vec![Ok(
            "{\"name\":\"query_email\",\"args\":\"is:unread\"}".to_string(),
        )]));
        let mut planner = LlmPlanner::new(llm).expect("planner");
        let proposal = planner.propose(&state(), "", &catalog());
        assert_eq!(proposal.arguments.get("done"), Some(&json!(false)));
        assert!(proposal.rationale.contains("schema validation failed"));
    }

    #[test]
    fn client_error_idles() {
        let llm = Rc::new(ScriptedLlm::new(vec![Err("connection reset".to_string())]));
        let mut planner = LlmPlanner::new(llm).expect("planner");
        let proposal = planner.propose(&state(), "", &catalog());
        assert_eq!(proposal.arguments.get("done"), Some(&json!(false)));
        assert!(proposal.rationale.contains("connection reset"));
    }

    #[test]
    fn prompt_carries_goal_context_and_tools() {
        let llm = Rc::new(ScriptedLlm::new(vec![Ok("{}".to_string())]));
        let mut planner = LlmPlanner::new(llm.clone()).expect("planner");
        planner.propose(&state(), "!!! DISCREPANCY !!! estimate inflated", &catalog());
        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("count unread emails"));
        assert!(prompts[0].contains("!!! DISCREPANCY !!!"));
        assert!(prompts[0].contains("- query_email: Search emails"));
    }

    #[test]
    fn classifier_returns_model_choice() {
        let llm = Rc::new(ScriptedLlm::new(vec![Ok(
            "{\"tools\":[\"query_email\"],\"reason\":\"mail question\"}".to_string(),
        )]));
        let classifier = LlmToolClassifier::new(llm).expect("classifier");
        let tools = classifier.classify("any news from bob?", &catalog()).expect("classify");
        assert_eq!(tools, vec!["query_email"]);
    }

    #[test]
    fn classifier_rejects_bad_shape() {
        let llm = Rc::new(ScriptedLlm::new(vec![Ok("{\"tool\":\"query_email\"}".to_string())]));
        let classifier = LlmToolClassifier::new(llm).expect("classifier");
        assert!(classifier.classify("x", &catalog()).is_err());
    }
}
