//! Agent registry.
//!
//! A read-only table of every agent the engine knows about, built once at
//! startup and shared across requests without synchronization.

use crate::config::AgentConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{AgentKind, AnalysisRequest, InputField};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Allowed drift of the weight sum away from 1.0.
pub const WEIGHT_TOLERANCE: f64 = 1e-3;

/// Stable agent identifiers.
pub mod ids {
    pub const PATTERN: &str = "pattern";
    pub const NLP: &str = "nlp";
    pub const BEHAVIOR: &str = "behavior";
    pub const NETWORK: &str = "network";
    pub const DUPLICATE: &str = "duplicate";
    pub const BERT_TRANSFORMER: &str = "bertTransformer";
    pub const SAYAM_ML: &str = "sayamML";
    pub const COFACTS: &str = "cofacts";
    pub const URL_REPUTATION: &str = "urlReputation";
    pub const MEDIA_FORENSICS: &str = "mediaForensics";
}

/// Static description of one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDescriptor {
    pub id: &'static str,
    pub display_name: &'static str,
    /// Category weight in (0, 1].
    pub weight: f64,
    pub kind: AgentKind,
    /// Fields that must be present for the agent to be invoked at all.
    pub required_fields: &'static [InputField],
    /// Disabled agents are never applicable.
    pub enabled: bool,
}

impl AgentDescriptor {
    const fn new(
        id: &'static str,
        display_name: &'static str,
        weight: f64,
        kind: AgentKind,
        required_fields: &'static [InputField],
    ) -> Self {
        Self {
            id,
            display_name,
            weight,
            kind,
            required_fields,
            enabled: true,
        }
    }

    /// Whether the request carries every field this agent needs.
    pub fn accepts(&self, request: &AnalysisRequest) -> bool {
        let present = request.present_fields();
        self.required_fields.iter().all(|f| present.contains(f))
    }
}

const DEFAULT_AGENTS: &[AgentDescriptor] = &[
    AgentDescriptor::new(
        ids::PATTERN,
        "Lexical Pattern Detector",
        0.15,
        AgentKind::Core,
        &[InputField::Text],
    ),
    AgentDescriptor::new(
        ids::NLP,
        "Linguistic Heuristics",
        0.15,
        AgentKind::Core,
        &[InputField::Text],
    ),
    AgentDescriptor::new(
        ids::BEHAVIOR,
        "Reviewer Behavior Signals",
        0.10,
        AgentKind::Core,
        &[InputField::UserContext],
    ),
    AgentDescriptor::new(
        ids::NETWORK,
        "Account Network Signals",
        0.05,
        AgentKind::Core,
        &[InputField::UserContext],
    ),
    AgentDescriptor::new(
        ids::DUPLICATE,
        "Duplicate Content Detector",
        0.05,
        AgentKind::Core,
        &[InputField::Text],
    ),
    AgentDescriptor::new(
        ids::BERT_TRANSFORMER,
        "BERT Generated-Text Classifier",
        0.20,
        AgentKind::External,
        &[InputField::Text],
    ),
    AgentDescriptor::new(
        ids::SAYAM_ML,
        "Review Authenticity Classifier",
        0.10,
        AgentKind::External,
        &[InputField::Text, InputField::Rating],
    ),
    AgentDescriptor::new(
        ids::COFACTS,
        "Cofacts Community Fact-Check",
        0.10,
        AgentKind::External,
        &[InputField::Text],
    ),
    AgentDescriptor::new(
        ids::URL_REPUTATION,
        "URL Reputation Lookup",
        0.05,
        AgentKind::External,
        &[InputField::SourceUrl],
    ),
    AgentDescriptor::new(
        ids::MEDIA_FORENSICS,
        "Media Forensics Service",
        0.05,
        AgentKind::External,
        &[InputField::AppMedia],
    ),
];

/// The process-wide agent table.
#[derive(Debug, Clone)]
pub struct Registry {
    descriptors: Vec<AgentDescriptor>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            descriptors: DEFAULT_AGENTS.to_vec(),
        }
    }
}

impl Registry {
    /// Build a registry from an explicit table and validate it.
    pub fn new(descriptors: Vec<AgentDescriptor>) -> EngineResult<Self> {
        let registry = Self { descriptors };
        registry.validate()?;
        Ok(registry)
    }

    /// Build the default registry with per-agent overrides applied.
    pub fn from_config(agents: &BTreeMap<String, AgentConfig>) -> EngineResult<Self> {
        let mut descriptors = DEFAULT_AGENTS.to_vec();

        for (id, overrides) in agents {
            let descriptor = descriptors
                .iter_mut()
                .find(|d| d.id == id.as_str())
                .ok_or_else(|| {
                    EngineError::Configuration(format!("unknown agent identifier '{}'", id))
                })?;

            if let Some(weight) = overrides.weight {
                debug!("Overriding weight of {}: {} -> {}", id, descriptor.weight, weight);
                descriptor.weight = weight;
            }
            descriptor.enabled = overrides.enabled;
        }

        Self::new(descriptors)
    }

    /// Check the table invariants: unique ids, weights in (0, 1], sum ~ 1.0.
    pub fn validate(&self) -> EngineResult<()> {
        if self.descriptors.is_empty() {
            return Err(EngineError::Configuration(
                "registry contains no agents".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for d in &self.descriptors {
            if !seen.insert(d.id) {
                return Err(EngineError::Configuration(format!(
                    "duplicate agent identifier '{}'",
                    d.id
                )));
            }
            if !d.weight.is_finite() || d.weight <= 0.0 || d.weight > 1.0 {
                return Err(EngineError::Configuration(format!(
                    "weight {} of agent '{}' is outside (0, 1]",
                    d.weight, d.id
                )));
            }
        }

        let total = self.total_weight();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(EngineError::Configuration(format!(
                "agent weights sum to {:.4}, expected 1.0",
                total
            )));
        }

        Ok(())
    }

    /// All descriptors in declaration order.
    pub fn descriptors(&self) -> &[AgentDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, id: &str) -> Option<&AgentDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    pub fn total_weight(&self) -> f64 {
        self.descriptors.iter().map(|d| d.weight).sum()
    }

    /// Enabled descriptors whose required fields are all present, in
    /// declaration order.
    pub fn applicable_agents(&self, request: &AnalysisRequest) -> Vec<&AgentDescriptor> {
        self.descriptors
            .iter()
            .filter(|d| d.enabled && d.accepts(request))
            .collect()
    }

    /// Descriptors that are disabled or whose inputs are missing.
    pub fn not_applicable(&self, request: &AnalysisRequest) -> Vec<&AgentDescriptor> {
        let applicable: HashSet<&str> = self
            .applicable_agents(request)
            .into_iter()
            .map(|d| d.id)
            .collect();
        self.descriptors
            .iter()
            .filter(|d| !applicable.contains(d.id))
            .collect()
    }
}
