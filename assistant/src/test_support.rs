//! Test-only planners, capabilities, model clients and fixture files.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use serde_json::Value;
use tempfile::TempDir;

use crate::core::types::{ActionProposal, AgentState, Arguments, Payload};
use crate::io::llm::LlmClient;
use crate::planner::Planner;
use crate::tools::{Capability, ToolInfo};

/// Build an argument map from a JSON object literal.
pub fn args(value: Value) -> Arguments {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Planner that replays proposals in order, then repeats `fallback`.
///
/// Records every context it was shown.
pub struct ScriptedPlanner {
    script: VecDeque<ActionProposal>,
    fallback: ActionProposal,
    pub contexts: Vec<String>,
}

impl ScriptedPlanner {
    pub fn new(script: Vec<ActionProposal>) -> Self {
        Self {
            script: script.into(),
            fallback: ActionProposal::finish("script exhausted"),
            contexts: Vec::new(),
        }
    }

    /// Planner that never asks to finish.
    pub fn always_idle() -> Self {
        Self::new(Vec::new()).with_fallback(ActionProposal::idle("nothing to do"))
    }

    pub fn with_fallback(mut self, fallback: ActionProposal) -> Self {
        self.fallback = fallback;
        self
    }
}

impl Planner for ScriptedPlanner {
    fn propose(&mut self, _state: &AgentState, context: &str, _tools: &[ToolInfo]) -> ActionProposal {
        self.contexts.push(context.to_string());
        self.script
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Capability that always returns the same payload.
pub struct StaticCapability {
    name: String,
    payload: Value,
    destructive: bool,
}

impl StaticCapability {
    pub fn new(name: &str, payload: Value) -> Self {
        Self {
            name: name.to_string(),
            payload,
            destructive: false,
        }
    }

    pub fn marked_destructive(mut self) -> Self {
        self.destructive = true;
        self
    }
}

impl Capability for StaticCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Returns a fixed payload."
    }

    fn destructive(&self) -> bool {
        self.destructive
    }

    fn invoke(&self, _args: &Arguments) -> Result<Payload> {
        match &self.payload {
            Value::Object(map) => Ok(map.clone()),
            _ => Ok(Payload::new()),
        }
    }
}

/// Capability that always fails with `message`.
pub struct FailingCapability {
    name: String,
    message: String,
}

impl FailingCapability {
    pub fn new(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}

impl Capability for FailingCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails."
    }

    fn invoke(&self, _args: &Arguments) -> Result<Payload> {
        Err(anyhow!("{}", self.message))
    }
}

/// Capability that panics when invoked.
pub struct PanickingCapability {
    name: String,
}

impl PanickingCapability {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Capability for PanickingCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always panics."
    }

    fn invoke(&self, _args: &Arguments) -> Result<Payload> {
        panic!("{} exploded", self.name)
    }
}

/// Model client that replays canned responses. `Err` entries become errors.
pub struct ScriptedLlm {
    responses: RefCell<VecDeque<Result<String, String>>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl LlmClient for ScriptedLlm {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        match self.responses.borrow_mut().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted response left")),
        }
    }
}

/// Mail and calendar fixture files in a temporary directory.
pub struct FixtureFiles {
    pub dir: TempDir,
    pub mail: PathBuf,
    pub calendar: PathBuf,
}

/// Write `mail` and `calendar` JSON to a fresh temporary directory.
pub fn fixture_files(mail: &Value, calendar: &Value) -> Result<FixtureFiles> {
    let dir = tempfile::tempdir()?;
    let mail_path = dir.path().join("mail.json");
    let calendar_path = dir.path().join("calendar.json");
    fs::write(&mail_path, serde_json::to_string_pretty(mail)?)?;
    fs::write(&calendar_path, serde_json::to_string_pretty(calendar)?)?;
    Ok(FixtureFiles {
        dir,
        mail: mail_path,
        calendar: calendar_path,
    })
}
