//! Agent configuration stored in `assistant.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "assistant.toml";

/// Agent configuration (TOML).
///
/// Missing fields fall back to defaults, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Step ceiling for one run.
    pub max_steps: u32,

    /// Number of recent memory entries shown to the planner.
    pub memory_window: usize,

    /// Allow capabilities whose effects cannot be undone (sending mail, deleting events).
    pub approve_destructive: bool,

    pub planner: PlannerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlannerConfig {
    /// Command that reads a prompt on stdin and writes the completion to stdout.
    pub command: Vec<String>,

    /// Model identifier, passed to the command as `AGENT_MODEL`.
    pub model: String,

    /// Environment variable that must hold the model credential.
    pub credential_env: String,

    pub timeout_secs: u64,

    /// Truncate planner stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            model: "claude-3-5-sonnet-20241022".to_string(),
            credential_env: "ANTHROPIC_API_KEY".to_string(),
            timeout_secs: 30,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            memory_window: 10,
            approve_destructive: false,
            planner: PlannerConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(anyhow!("max_steps must be > 0"));
        }
        if self.memory_window == 0 {
            return Err(anyhow!("memory_window must be > 0"));
        }
        if self.planner.timeout_secs == 0 {
            return Err(anyhow!("planner.timeout_secs must be > 0"));
        }
        if self.planner.output_limit_bytes == 0 {
            return Err(anyhow!("planner.output_limit_bytes must be > 0"));
        }
        if self.planner.credential_env.trim().is_empty() {
            return Err(anyhow!("planner.credential_env must not be empty"));
        }
        Ok(())
    }

    /// Apply `AGENT_MAX_STEPS`, `AGENT_APPROVE_DESTRUCTIVE` and `AGENT_MODEL`.
    ///
    /// `lookup` is usually `|key| std::env::var(key).ok()`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("AGENT_MAX_STEPS") {
            self.max_steps = raw
                .trim()
                .parse()
                .with_context(|| format!("parse AGENT_MAX_STEPS '{raw}'"))?;
        }
        if let Some(raw) = lookup("AGENT_APPROVE_DESTRUCTIVE") {
            self.approve_destructive = parse_flag(&raw)
                .ok_or_else(|| anyhow!("parse AGENT_APPROVE_DESTRUCTIVE '{raw}'"))?;
        }
        if let Some(model) = lookup("AGENT_MODEL")
            && !model.trim().is_empty()
        {
            self.planner.model = model.trim().to_string();
        }
        debug!(
            max_steps = self.max_steps,
            approve_destructive = self.approve_destructive,
            "applied environment overrides"
        );
        self.validate()
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AgentConfig::default());
        assert_eq!(cfg.max_steps, 50);
        assert!(!cfg.approve_destructive);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("assistant.toml");
        let mut cfg = AgentConfig::default();
        cfg.planner.command = vec!["llm-cli".to_string(), "--json".to_string()];
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("assistant.toml");
        fs::write(&path, "max_steps = 7\n[planner]\ntimeout_secs = 5\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_steps, 7);
        assert_eq!(cfg.memory_window, 10);
        assert_eq!(cfg.planner.timeout_secs, 5);
        assert_eq!(cfg.planner.credential_env, "ANTHROPIC_API_KEY");
    }

    #[test]
    fn zero_limits_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("assistant.toml");
        fs::write(&path, "max_steps = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("max_steps must be > 0"));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AGENT_MAX_STEPS", "12"),
            ("AGENT_APPROVE_DESTRUCTIVE", "true"),
            ("AGENT_MODEL", "claude-haiku"),
        ]);
        let mut cfg = AgentConfig::default();
        cfg.apply_env(|key| env.get(key).map(|v| v.to_string()))
            .expect("apply");
        assert_eq!(cfg.max_steps, 12);
        assert!(cfg.approve_destructive);
        assert_eq!(cfg.planner.model, "claude-haiku");
    }

    #[test]
    fn bad_env_value_is_an_error() {
        let mut cfg = AgentConfig::default();
        let err = cfg
            .apply_env(|key| (key == "AGENT_APPROVE_DESTRUCTIVE").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("AGENT_APPROVE_DESTRUCTIVE"));
    }
}
