//! Local heuristic detectors (core agents).
//!
//! Each detector is a pure function of the request: no I/O, bounded work,
//! and failures are reported as [`DetectorError`] rather than panics.

pub mod behavior;
pub mod duplicate;
pub mod network;
pub mod nlp;
pub mod pattern;
pub mod text;

use crate::error::DetectorError;
use crate::models::{AgentResult, AgentVerdict, AnalysisRequest};

pub use behavior::BehaviorDetector;
pub use duplicate::DuplicateDetector;
pub use network::NetworkDetector;
pub use nlp::NlpDetector;
pub use pattern::PatternDetector;

/// Detector confidence at or above which the verdict is FAKE.
pub const FAKE_CUTOFF: f64 = 70.0;
/// Detector confidence at or above which the verdict is SUSPICIOUS.
pub const SUSPICIOUS_CUTOFF: f64 = 40.0;

/// A local detector producing a canonical result.
pub trait Detector: Send + Sync {
    /// Registry identifier of this detector.
    fn id(&self) -> &'static str;

    /// Score the request.
    fn detect(&self, request: &AnalysisRequest) -> Result<AgentResult, DetectorError>;
}

/// Limits shared by all detectors.
#[derive(Debug, Clone, Copy)]
pub struct DetectorLimits {
    pub max_text_chars: usize,
    pub max_reference_texts: usize,
}

impl Default for DetectorLimits {
    fn default() -> Self {
        Self {
            max_text_chars: 20_000,
            max_reference_texts: 50,
        }
    }
}

impl From<&crate::config::EngineConfig> for DetectorLimits {
    fn from(engine: &crate::config::EngineConfig) -> Self {
        Self {
            max_text_chars: engine.max_text_chars,
            max_reference_texts: engine.max_reference_texts,
        }
    }
}

/// The five core detectors, in registry order.
pub fn default_detectors(limits: DetectorLimits) -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(PatternDetector::new(limits)),
        Box::new(NlpDetector::new(limits)),
        Box::new(BehaviorDetector),
        Box::new(NetworkDetector),
        Box::new(DuplicateDetector::new(limits)),
    ]
}

/// Map a detector confidence onto the per-agent verdict bands.
pub fn detector_verdict(confidence: f64) -> AgentVerdict {
    if confidence >= FAKE_CUTOFF {
        AgentVerdict::Fake
    } else if confidence >= SUSPICIOUS_CUTOFF {
        AgentVerdict::Suspicious
    } else {
        AgentVerdict::Genuine
    }
}

/// Accumulates points and the evidence that produced them.
#[derive(Debug, Default)]
pub(crate) struct Scorecard {
    points: f64,
    evidence: Vec<String>,
}

impl Scorecard {
    pub(crate) fn add(&mut self, points: f64, evidence: impl Into<String>) {
        self.points += points;
        self.evidence.push(evidence.into());
    }

    pub(crate) fn note(&mut self, evidence: impl Into<String>) {
        self.evidence.push(evidence.into());
    }

    /// Unclamped points and evidence, for callers that build their own result.
    pub(crate) fn into_parts(self) -> (f64, Vec<String>) {
        (self.points, self.evidence)
    }

    /// Clamp to 0-100 and build the result.
    pub(crate) fn finish(mut self, agent: &str, quiet_evidence: &str) -> AgentResult {
        let raw = self.points;
        let confidence = raw.clamp(0.0, 100.0);
        if self.evidence.is_empty() {
            self.evidence.push(quiet_evidence.to_string());
        }
        AgentResult::new(
            agent,
            confidence,
            detector_verdict(confidence),
            self.evidence,
            raw,
        )
    }
}
