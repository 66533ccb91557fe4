//! Configuration file handling.
//!
//! This module handles loading, merging and validating configuration from
//! `.veriscore.toml` files.

use crate::error::{EngineError, EngineResult};
use crate::registry::ids;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".veriscore.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Orchestrator deadlines and input limits.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Composite verdict bands.
    #[serde(default)]
    pub verdict: VerdictConfig,

    /// Per-agent settings keyed by agent identifier.
    ///
    /// Entries in the file are layered over the built-in table, so a file
    /// naming one agent keeps the default endpoints of the others.
    #[serde(default = "default_agents", deserialize_with = "deserialize_agents")]
    pub agents: BTreeMap<String, AgentConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            engine: EngineConfig::default(),
            verdict: VerdictConfig::default(),
            agents: default_agents(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Output format when `--format` is not given ("json" or "markdown").
    #[serde(default = "default_format")]
    pub format: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            verbose: false,
        }
    }
}

fn default_format() -> String {
    "json".to_string()
}

/// Orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deadline for the whole fan-out, in milliseconds.
    #[serde(default = "default_global_deadline")]
    pub global_deadline_ms: u64,

    /// Deadline for a single external agent, in milliseconds.
    #[serde(default = "default_agent_timeout")]
    pub agent_timeout_ms: u64,

    /// Budget for a preflight health probe, in milliseconds.
    #[serde(default = "default_health_timeout")]
    pub health_timeout_ms: u64,

    /// Probe external services before dialing them.
    #[serde(default)]
    pub preflight_health_checks: bool,

    /// Text beyond this many characters is ignored by every detector.
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// Cap on reference texts the duplicate detector compares against.
    #[serde(default = "default_max_reference_texts")]
    pub max_reference_texts: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            global_deadline_ms: default_global_deadline(),
            agent_timeout_ms: default_agent_timeout(),
            health_timeout_ms: default_health_timeout(),
            preflight_health_checks: false,
            max_text_chars: default_max_text_chars(),
            max_reference_texts: default_max_reference_texts(),
        }
    }
}

fn default_global_deadline() -> u64 {
    8000
}

fn default_agent_timeout() -> u64 {
    5000
}

fn default_health_timeout() -> u64 {
    1000
}

fn default_max_text_chars() -> usize {
    20_000
}

fn default_max_reference_texts() -> usize {
    50
}

/// Composite verdict thresholds.
///
/// `score < suspicious_threshold` is likely genuine, `score >= fake_threshold`
/// is highly likely fake, everything between is suspicious.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VerdictConfig {
    #[serde(default = "default_suspicious_threshold")]
    pub suspicious_threshold: f64,

    #[serde(default = "default_fake_threshold")]
    pub fake_threshold: f64,
}

impl Default for VerdictConfig {
    fn default() -> Self {
        Self {
            suspicious_threshold: default_suspicious_threshold(),
            fake_threshold: default_fake_threshold(),
        }
    }
}

fn default_suspicious_threshold() -> f64 {
    30.0
}

fn default_fake_threshold() -> f64 {
    70.0
}

/// Settings for a single agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Disabled agents are never invoked.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Overrides the registry weight. The table must still sum to 1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    /// Base URL of the remote service (external agents only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Per-agent timeout; never longer than `engine.agent_timeout_ms`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Environment variable holding the service API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: None,
            endpoint: None,
            timeout_ms: None,
            api_key_env: None,
        }
    }
}

impl AgentConfig {
    fn with_endpoint(endpoint: &str) -> Self {
        Self {
            endpoint: Some(endpoint.to_string()),
            ..Default::default()
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_agents() -> BTreeMap<String, AgentConfig> {
    [
        (ids::BERT_TRANSFORMER, "http://localhost:8501"),
        (ids::SAYAM_ML, "http://localhost:8502"),
        (ids::COFACTS, "https://api.cofacts.tw"),
        (ids::URL_REPUTATION, "http://localhost:8503"),
        (ids::MEDIA_FORENSICS, "http://localhost:8504"),
    ]
    .into_iter()
    .map(|(id, endpoint)| (id.to_string(), AgentConfig::with_endpoint(endpoint)))
    .collect()
}

fn deserialize_agents<'de, D>(deserializer: D) -> Result<BTreeMap<String, AgentConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let mut agents = BTreeMap::<String, AgentConfig>::deserialize(deserializer)?;
    for (id, defaults) in default_agents() {
        let agent = agents.entry(id).or_insert_with(|| defaults.clone());
        if agent.endpoint.is_none() {
            agent.endpoint = defaults.endpoint;
        }
    }
    Ok(agents)
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(deadline) = args.deadline_ms {
            self.engine.global_deadline_ms = deadline;
            // keep health checks inside a deadline shortened from the command line
            if self.engine.health_timeout_ms >= deadline {
                self.engine.health_timeout_ms = deadline / 2;
            }
        }
        if let Some(timeout) = args.agent_timeout_ms {
            self.engine.agent_timeout_ms = timeout;
        }
        if args.preflight {
            self.engine.preflight_health_checks = true;
        }

        for id in &args.disable {
            self.agents.entry(id.clone()).or_default().enabled = false;
        }

        // --offline turns off every remote service
        if args.offline {
            for id in crate::adapters::EXTERNAL_AGENT_IDS {
                self.agents.entry(id.to_string()).or_default().enabled = false;
            }
        }

        if let Some(format) = args.format {
            self.general.format = format.as_str().to_string();
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check cross-field constraints. Called once at startup.
    pub fn validate(&self) -> EngineResult<()> {
        let engine = &self.engine;
        if engine.global_deadline_ms == 0 {
            return Err(EngineError::Configuration(
                "engine.global_deadline_ms must be at least 1".to_string(),
            ));
        }
        if engine.agent_timeout_ms == 0 || engine.agent_timeout_ms >= engine.global_deadline_ms {
            return Err(EngineError::Configuration(format!(
                "engine.agent_timeout_ms ({}) must be positive and shorter than the global deadline ({})",
                engine.agent_timeout_ms, engine.global_deadline_ms
            )));
        }
        if engine.health_timeout_ms == 0 || engine.health_timeout_ms >= engine.global_deadline_ms {
            return Err(EngineError::Configuration(format!(
                "engine.health_timeout_ms ({}) must be positive and shorter than the global deadline ({})",
                engine.health_timeout_ms, engine.global_deadline_ms
            )));
        }
        if engine.max_text_chars == 0 {
            return Err(EngineError::Configuration(
                "engine.max_text_chars must be at least 1".to_string(),
            ));
        }

        let v = &self.verdict;
        if !(v.suspicious_threshold > 0.0
            && v.suspicious_threshold < v.fake_threshold
            && v.fake_threshold <= 100.0)
        {
            return Err(EngineError::Configuration(format!(
                "verdict thresholds must satisfy 0 < suspicious ({}) < fake ({}) <= 100",
                v.suspicious_threshold, v.fake_threshold
            )));
        }

        for (id, agent) in &self.agents {
            if let Some(endpoint) = &agent.endpoint {
                if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                    return Err(EngineError::Configuration(format!(
                        "agents.{}.endpoint must start with 'http://' or 'https://'",
                        id
                    )));
                }
            }
            if agent.timeout_ms == Some(0) {
                return Err(EngineError::Configuration(format!(
                    "agents.{}.timeout_ms must be at least 1",
                    id
                )));
            }
        }

        Ok(())
    }

    /// Settings for one agent, or defaults when the file doesn't mention it.
    pub fn agent(&self, id: &str) -> AgentConfig {
        self.agents.get(id).cloned().unwrap_or_default()
    }

    /// Effective timeout for one agent, clamped to the engine-wide limit.
    pub fn agent_timeout(&self, id: &str) -> Duration {
        let limit = self.engine.agent_timeout_ms;
        let ms = self
            .agents
            .get(id)
            .and_then(|a| a.timeout_ms)
            .map(|t| t.min(limit))
            .unwrap_or(limit);
        Duration::from_millis(ms)
    }

    pub fn global_deadline(&self) -> Duration {
        Duration::from_millis(self.engine.global_deadline_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.engine.health_timeout_ms)
    }

    /// Resolve the API key for an agent from its configured env var.
    pub fn api_key(&self, id: &str) -> Option<String> {
        self.agents
            .get(id)
            .and_then(|a| a.api_key_env.as_deref())
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.is_empty())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine.global_deadline_ms, 8000);
        assert_eq!(config.engine.agent_timeout_ms, 5000);
        assert_eq!(config.verdict.suspicious_threshold, 30.0);
        assert_eq!(config.verdict.fake_threshold, 70.0);
        assert!(config.agents.contains_key(ids::BERT_TRANSFORMER));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
format = "markdown"
verbose = true

[engine]
global_deadline_ms = 3000
agent_timeout_ms = 1500

[verdict]
suspicious_threshold = 25.0

[agents.cofacts]
enabled = false

[agents.bertTransformer]
endpoint = "https://bert.internal"
timeout_ms = 9000
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.format, "markdown");
        assert!(config.general.verbose);
        assert_eq!(config.engine.global_deadline_ms, 3000);
        assert_eq!(config.engine.max_text_chars, 20_000);
        assert_eq!(config.verdict.suspicious_threshold, 25.0);
        assert_eq!(config.verdict.fake_threshold, 70.0);
        assert!(!config.agent(ids::COFACTS).enabled);
        assert!(config.agent(ids::PATTERN).enabled);
        // per-agent timeout cannot exceed the engine limit
        assert_eq!(
            config.agent_timeout(ids::BERT_TRANSFORMER),
            Duration::from_millis(1500)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_agents_table_keeps_defaults() {
        let config: Config = toml::from_str("[agents.cofacts]\nenabled = false\n").unwrap();

        assert_eq!(config.agents.len(), default_agents().len());
        let cofacts = config.agent(ids::COFACTS);
        assert!(!cofacts.enabled);
        assert_eq!(cofacts.endpoint.as_deref(), Some("https://api.cofacts.tw"));
        assert_eq!(
            config.agent(ids::BERT_TRANSFORMER).endpoint.as_deref(),
            Some("http://localhost:8501")
        );
    }

    #[test]
    fn test_partial_agent_entry_overrides_endpoint_only_when_set() {
        let config: Config = toml::from_str(
            "[agents.sayamML]\nendpoint = \"https://sayam.internal\"\n\n[agents.mediaForensics]\ntimeout_ms = 800\n",
        )
        .unwrap();

        assert_eq!(
            config.agent(ids::SAYAM_ML).endpoint.as_deref(),
            Some("https://sayam.internal")
        );
        let media = config.agent(ids::MEDIA_FORENSICS);
        assert_eq!(media.timeout_ms, Some(800));
        assert_eq!(media.endpoint.as_deref(), Some("http://localhost:8504"));
    }

    #[test]
    fn test_validate_rejects_agent_timeout_past_deadline() {
        let mut config = Config::default();
        config.engine.agent_timeout_ms = config.engine.global_deadline_ms;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_health_budget_past_deadline() {
        let mut config = Config::default();
        config.engine.global_deadline_ms = 300;
        config.engine.agent_timeout_ms = 250;
        config.engine.health_timeout_ms = 5000;
        assert!(config.validate().is_err());

        config.engine.health_timeout_ms = 200;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_short_cli_deadline_shrinks_health_budget() {
        use clap::Parser;

        let args = crate::cli::Args::try_parse_from([
            "veriscore",
            "--list-agents",
            "--deadline-ms",
            "600",
            "--agent-timeout-ms",
            "400",
        ])
        .unwrap();
        let mut config = Config::default();
        config.merge_with_args(&args);

        assert_eq!(config.engine.health_timeout_ms, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_overlapping_bands() {
        let mut config = Config::default();
        config.verdict.suspicious_threshold = 80.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let mut config = Config::default();
        config
            .agents
            .insert(ids::COFACTS.to_string(), AgentConfig::with_endpoint("ftp://x"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\npreflight_health_checks = true").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(config.engine.preflight_health_checks);
        assert!(config.agents.contains_key(ids::SAYAM_ML));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[engine]"));
        assert!(toml_str.contains("[verdict]"));
        assert!(toml_str.contains("bertTransformer"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.agents.len(), Config::default().agents.len());
    }
}
