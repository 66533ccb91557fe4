//! External agent adapters.
//!
//! One adapter per third-party service. Each builds a minimal payload,
//! calls the service under a timeout and translates the answer into an
//! [`AgentResult`]. Failures never leave the adapter: they become either
//! an abstention (`None`) or a local fallback result.

pub mod bert;
pub mod cofacts;
pub mod http;
pub mod media_forensics;
pub mod sayam;
pub mod url_reputation;

use crate::config::Config;
use crate::error::{EngineError, EngineResult, TransportError};
use crate::heuristics::detector_verdict;
use crate::models::{AgentResult, AgentVerdict, AnalysisRequest, ResultSource};
use crate::registry::ids;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use bert::BertTransformerAgent;
pub use cofacts::CofactsAgent;
pub use http::HttpAgentClient;
pub use media_forensics::MediaForensicsAgent;
pub use sayam::SayamAgent;
pub use url_reputation::UrlReputationAgent;

/// Identifiers of every external agent.
pub const EXTERNAL_AGENT_IDS: &[&str] = &[
    ids::BERT_TRANSFORMER,
    ids::SAYAM_ML,
    ids::COFACTS,
    ids::URL_REPUTATION,
    ids::MEDIA_FORENSICS,
];

/// Fallback confidences are pulled toward 50 by this factor.
const FALLBACK_COMPRESSION: f64 = 0.6;

/// Ratio at or above which a consensus reads as FAKE.
const CONSENSUS_FAKE: f64 = 0.6;
/// Ratio at or above which a consensus reads as SUSPICIOUS.
const CONSENSUS_SUSPICIOUS: f64 = 0.3;

/// A third-party classification service behind an adapter.
#[async_trait]
pub trait ExternalAgent: Send + Sync {
    /// Registry identifier of this agent.
    fn id(&self) -> &'static str;

    /// Score the request within `timeout`.
    ///
    /// Returns `None` to abstain. Must stop work once `cancel` fires.
    async fn analyze(
        &self,
        request: &AnalysisRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Option<AgentResult>;

    /// Cheap, side-effect-free liveness probe.
    async fn check_health(&self) -> bool;

    /// Local approximation of this service's signal, if one exists.
    fn fallback(&self, _request: &AnalysisRequest) -> Option<AgentResult> {
        None
    }
}

/// Turn a normalized call outcome into the adapter's answer.
///
/// Cancelled calls abstain; other failures try the fallback.
pub(crate) fn settle(
    agent: &dyn ExternalAgent,
    request: &AnalysisRequest,
    outcome: Result<AgentResult, TransportError>,
) -> Option<AgentResult> {
    match outcome {
        Ok(result) => Some(result),
        Err(TransportError::Cancelled) => {
            debug!("{} cancelled", agent.id());
            None
        }
        Err(e) => {
            debug!("{} unavailable: {}", agent.id(), e);
            let fallback = agent.fallback(request);
            if fallback.is_none() {
                debug!("{} has no fallback, abstaining", agent.id());
            }
            fallback
        }
    }
}

/// Build a fallback result with its confidence compressed toward 50.
pub(crate) fn fallback_result(agent: &str, confidence: f64, mut evidence: Vec<String>) -> AgentResult {
    let raw = confidence.clamp(0.0, 100.0);
    let compressed = 50.0 + (raw - 50.0) * FALLBACK_COMPRESSION;
    evidence.insert(
        0,
        "primary service unavailable; local approximation used".to_string(),
    );
    AgentResult {
        agent_name: agent.to_string(),
        confidence: compressed,
        verdict: detector_verdict(compressed),
        evidence,
        raw_score: raw,
        source: ResultSource::Fallback,
    }
}

/// Rescale a 0-1 probability and split it at 0.5.
pub(crate) fn probability_result(agent: &str, probability: f64, evidence: Vec<String>) -> Result<AgentResult, TransportError> {
    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return Err(TransportError::Decode(format!(
            "probability {} outside 0-1",
            probability
        )));
    }
    let verdict = if probability >= 0.5 {
        AgentVerdict::Fake
    } else {
        AgentVerdict::Genuine
    };
    Ok(AgentResult::new(agent, probability * 100.0, verdict, evidence, probability))
}

/// Map a consensus ratio (share of votes calling the content false) onto
/// the verdict bands.
pub(crate) fn consensus_verdict(ratio: f64) -> AgentVerdict {
    if ratio >= CONSENSUS_FAKE {
        AgentVerdict::Fake
    } else if ratio >= CONSENSUS_SUSPICIOUS {
        AgentVerdict::Suspicious
    } else {
        AgentVerdict::Genuine
    }
}

/// Build the HTTP adapters for every enabled external agent.
pub fn default_adapters(config: &Config) -> EngineResult<Vec<Arc<dyn ExternalAgent>>> {
    let limits = crate::heuristics::DetectorLimits::from(&config.engine);
    let mut agents: Vec<Arc<dyn ExternalAgent>> = Vec::new();

    for &id in EXTERNAL_AGENT_IDS {
        let settings = config.agent(id);
        if !settings.enabled {
            continue;
        }
        let endpoint = settings.endpoint.as_deref().ok_or_else(|| {
            EngineError::Configuration(format!("agents.{}.endpoint is required", id))
        })?;
        let client = HttpAgentClient::new(endpoint, config.api_key(id), config.health_timeout())
            .map_err(|e| EngineError::Configuration(format!("agents.{}: {}", id, e)))?;

        let agent: Arc<dyn ExternalAgent> = match id {
            ids::BERT_TRANSFORMER => Arc::new(BertTransformerAgent::new(client, limits)),
            ids::SAYAM_ML => Arc::new(SayamAgent::new(client, limits)),
            ids::COFACTS => Arc::new(CofactsAgent::new(client, limits)),
            ids::URL_REPUTATION => Arc::new(UrlReputationAgent::new(client)),
            ids::MEDIA_FORENSICS => Arc::new(MediaForensicsAgent::new(client)),
            _ => continue,
        };
        agents.push(agent);
    }

    Ok(agents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_band_is_reduced() {
        let high = fallback_result("bertTransformer", 100.0, vec![]);
        assert_eq!(high.confidence, 80.0);
        assert_eq!(high.source, ResultSource::Fallback);
        assert!(high.evidence[0].contains("unavailable"));

        let low = fallback_result("bertTransformer", 0.0, vec![]);
        assert_eq!(low.confidence, 20.0);
        assert_eq!(low.verdict, AgentVerdict::Genuine);
    }

    #[test]
    fn test_probability_result_split_point() {
        let fake = probability_result("x", 0.5, vec![]).unwrap();
        assert_eq!(fake.verdict, AgentVerdict::Fake);
        assert_eq!(fake.confidence, 50.0);

        let genuine = probability_result("x", 0.12, vec![]).unwrap();
        assert_eq!(genuine.verdict, AgentVerdict::Genuine);

        assert!(probability_result("x", 1.4, vec![]).is_err());
        assert!(probability_result("x", f64::NAN, vec![]).is_err());
    }

    #[test]
    fn test_consensus_bands() {
        assert_eq!(consensus_verdict(0.0), AgentVerdict::Genuine);
        assert_eq!(consensus_verdict(0.3), AgentVerdict::Suspicious);
        assert_eq!(consensus_verdict(0.6), AgentVerdict::Fake);
    }

    #[test]
    fn test_default_adapters_respect_enabled_flags() {
        let mut config = Config::default();
        config.agents.get_mut(ids::COFACTS).unwrap().enabled = false;
        let agents = default_adapters(&config).unwrap();
        let names: Vec<_> = agents.iter().map(|a| a.id()).collect();
        assert_eq!(names.len(), EXTERNAL_AGENT_IDS.len() - 1);
        assert!(!names.contains(&ids::COFACTS));
    }

    #[test]
    fn test_default_adapters_require_endpoint() {
        let mut config = Config::default();
        config.agents.get_mut(ids::SAYAM_ML).unwrap().endpoint = None;
        assert!(default_adapters(&config).is_err());
    }
}
