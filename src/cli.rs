//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::Verdict;
use clap::Parser;
use std::path::PathBuf;

/// Veriscore - composite authenticity scoring for reviews and claims
///
/// Runs every applicable detector and classification service on a piece of
/// user-generated content and reduces their opinions into one score, a
/// verdict and an auditable evidence chain.
///
/// Examples:
///   veriscore --input review.json
///   cat review.json | veriscore --input - --format markdown
///   veriscore --input review.json --offline --fail-on suspicious
///   veriscore --list-agents
///   veriscore --check-health
///   veriscore --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Analysis request as JSON, or "-" to read stdin
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present_any = ["init_config", "list_agents", "check_health"]
    )]
    pub input: Option<PathBuf>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (json, markdown)
    ///
    /// Defaults to the config file setting, which defaults to json.
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .veriscore.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Global analysis deadline in milliseconds
    #[arg(long, value_name = "MS", env = "VERISCORE_DEADLINE_MS")]
    pub deadline_ms: Option<u64>,

    /// Per-agent timeout in milliseconds (must be below the deadline)
    #[arg(long, value_name = "MS", env = "VERISCORE_AGENT_TIMEOUT_MS")]
    pub agent_timeout_ms: Option<u64>,

    /// Probe external services before dialing them
    #[arg(long)]
    pub preflight: bool,

    /// Agents to disable (comma-separated identifiers)
    ///
    /// Example: --disable cofacts,mediaForensics
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub disable: Vec<String>,

    /// Disable every external service; score with local detectors only
    #[arg(long)]
    pub offline: bool,

    /// Exit with code 2 when the verdict is at or above this level
    ///
    /// Values: suspicious, fake
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<FailOnLevel>,

    /// Print the agent registry and exit
    #[arg(long)]
    pub list_agents: bool,

    /// Probe every enabled external service and exit
    #[arg(long)]
    pub check_health: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .veriscore.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// The composite result as JSON (default)
    #[default]
    Json,
    /// Markdown review report
    Markdown,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "markdown",
        }
    }

    /// Parse the config-file spelling; unknown values fall back to JSON.
    pub fn from_config(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => OutputFormat::Markdown,
            _ => OutputFormat::Json,
        }
    }
}

/// Verdict level for --fail-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum FailOnLevel {
    Suspicious,
    Fake,
}

impl FailOnLevel {
    /// Whether `verdict` is at or above this level.
    pub fn is_met(&self, verdict: Verdict) -> bool {
        let threshold = match self {
            FailOnLevel::Suspicious => Verdict::Suspicious,
            FailOnLevel::Fake => Verdict::HighlyLikelyFake,
        };
        verdict >= threshold
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.deadline_ms == Some(0) {
            return Err("Deadline must be at least 1ms".to_string());
        }
        if self.agent_timeout_ms == Some(0) {
            return Err("Agent timeout must be at least 1ms".to_string());
        }
        if let (Some(deadline), Some(timeout)) = (self.deadline_ms, self.agent_timeout_ms) {
            if timeout >= deadline {
                return Err(format!(
                    "Agent timeout ({}ms) must be shorter than the deadline ({}ms)",
                    timeout, deadline
                ));
            }
        }

        if let Some(ref input) = self.input {
            if !self.reads_stdin() && !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        if self.disable.iter().any(|id| id.trim().is_empty()) {
            return Err("--disable contains an empty agent identifier".to_string());
        }

        Ok(())
    }

    /// True when the request should be read from stdin.
    pub fn reads_stdin(&self) -> bool {
        self.input.as_deref().is_some_and(|p| p.as_os_str() == "-")
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            input: Some(PathBuf::from("-")),
            output: None,
            format: None,
            config: None,
            deadline_ms: None,
            agent_timeout_ms: None,
            preflight: false,
            disable: vec![],
            offline: false,
            fail_on: None,
            list_agents: false,
            check_health: false,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "veriscore",
            "--input",
            "-",
            "--format",
            "markdown",
            "--disable",
            "cofacts,mediaForensics",
            "--fail-on",
            "fake",
            "--offline",
        ])
        .unwrap();
        assert!(args.reads_stdin());
        assert_eq!(args.format, Some(OutputFormat::Markdown));
        assert_eq!(args.disable, vec!["cofacts", "mediaForensics"]);
        assert_eq!(args.fail_on, Some(FailOnLevel::Fake));
        assert!(args.offline);
    }

    #[test]
    fn test_input_required_unless_listing() {
        assert!(Args::try_parse_from(["veriscore"]).is_err());
        assert!(Args::try_parse_from(["veriscore", "--list-agents"]).is_ok());
        assert!(Args::try_parse_from(["veriscore", "--init-config"]).is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_timeouts() {
        let mut args = make_args();
        args.deadline_ms = Some(500);
        args.agent_timeout_ms = Some(800);
        assert!(args.validate().is_err());

        args.agent_timeout_ms = Some(300);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_missing_input_file() {
        let mut args = make_args();
        args.input = Some(PathBuf::from("/definitely/not/here.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_fail_on_levels() {
        assert!(FailOnLevel::Suspicious.is_met(Verdict::Suspicious));
        assert!(FailOnLevel::Suspicious.is_met(Verdict::HighlyLikelyFake));
        assert!(!FailOnLevel::Suspicious.is_met(Verdict::LikelyGenuine));
        assert!(!FailOnLevel::Fake.is_met(Verdict::Suspicious));
        assert!(!FailOnLevel::Fake.is_met(Verdict::Uncertain));
    }

    #[test]
    fn test_output_format_from_config() {
        assert_eq!(OutputFormat::from_config("Markdown"), OutputFormat::Markdown);
        assert_eq!(OutputFormat::from_config("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_config("yaml"), OutputFormat::Json);
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
