//! Language-model client abstraction.
//!
//! The [`LlmClient`] trait decouples planners from the model backend. The
//! shipped backend, [`CommandLlm`], pipes the prompt into a configured command
//! and reads the completion from its stdout; tests use scripted clients.

use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use tracing::{debug, info, instrument, warn};

use crate::io::config::PlannerConfig;
use crate::io::process::run_command_with_timeout;

/// A text-completion backend.
pub trait LlmClient {
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Completion backend that spawns a command per prompt.
#[derive(Debug, Clone)]
pub struct CommandLlm {
    program: String,
    args: Vec<String>,
    model: String,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandLlm {
    /// Build from config. Fails when no command is configured or the
    /// credential variable (looked up through `env`) is unset or empty.
    pub fn new<F>(config: &PlannerConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some((program, args)) = config.command.split_first() else {
            bail!("planner.command must be set to use the llm planner");
        };
        if program.trim().is_empty() {
            bail!("planner.command must be a non-empty array");
        }
        let credential_set = env(&config.credential_env).is_some_and(|v| !v.trim().is_empty());
        if !credential_set {
            bail!(
                "{} is not set; the llm planner needs a model credential",
                config.credential_env
            );
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
        })
    }
}

impl LlmClient for CommandLlm {
    #[instrument(skip_all, fields(program = %self.program, model = %self.model, prompt_bytes = prompt.len()))]
    fn complete(&self, prompt: &str) -> Result<String> {
        info!("requesting completion");
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).env("AGENT_MODEL", &self.model);

        let output = run_command_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )
        .map_err(|err| anyhow!("run {}: {err:#}", self.program))?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "completion timed out");
            bail!("{} timed out after {:?}", self.program, self.timeout);
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "completion command failed");
            bail!(
                "{} failed with status {:?}: {}",
                self.program,
                output.status.code(),
                output.stderr_tail()
            );
        }
        if output.stdout_truncated > 0 {
            bail!(
                "{} output exceeded {} bytes",
                self.program,
                self.output_limit_bytes
            );
        }

        let text = output.stdout_lossy();
        debug!(response_bytes = text.len(), "completion received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(command: &[&str]) -> PlannerConfig {
        PlannerConfig {
            command: command.iter().map(|s| s.to_string()).collect(),
            ..PlannerConfig::default()
        }
    }

    fn with_key(key: &str) -> Option<String> {
        (key == "ANTHROPIC_API_KEY").then(|| "sk-test".to_string())
    }

    #[test]
    fn empty_command_is_a_configuration_error() {
        let err = CommandLlm::new(&config(&[]), with_key).unwrap_err();
        assert!(err.to_string().contains("planner.command"));
    }

    #[test]
    fn missing_credential_is_a_configuration_error() {
        let err = CommandLlm::new(&config(&["cat"]), |_| None).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY is not set"));
    }

    #[cfg(unix)]
    #[test]
    fn command_receives_prompt_on_stdin() {
        let llm = CommandLlm::new(&config(&["cat"]), with_key).expect("build");
        let text = llm.complete("{\"tool\":\"noop\"}").expect("complete");
        assert_eq!(text, "{\"tool\":\"noop\"}");
    }

    #[cfg(unix)]
    #[test]
    fn model_is_passed_through_the_environment() {
        let llm = CommandLlm::new(&config(&["sh", "-c", "cat >/dev/null; printf %s \"$AGENT_MODEL\""]), with_key)
            .expect("build");
        let text = llm.complete("ignored").expect("complete");
        assert_eq!(text, PlannerConfig::default().model);
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_reports_stderr() {
        let llm = CommandLlm::new(&config(&["sh", "-c", "cat >/dev/null; echo quota exceeded >&2; exit 3"]), with_key)
            .expect("build");
        let err = llm.complete("x").unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }
}
