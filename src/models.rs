//! Data models for the scoring engine.
//!
//! This module contains the request, the canonical per-agent result and
//! the composite result returned to callers.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Whether an agent is a local heuristic or a third-party service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentKind {
    /// Local, deterministic, always available.
    Core,
    /// Remote classification service behind an adapter.
    External,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentKind::Core => write!(f, "core"),
            AgentKind::External => write!(f, "external"),
        }
    }
}

/// Verdict reported by a single agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentVerdict {
    Genuine,
    Fake,
    Suspicious,
    Uncertain,
}

impl fmt::Display for AgentVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentVerdict::Genuine => write!(f, "Genuine"),
            AgentVerdict::Fake => write!(f, "Fake"),
            AgentVerdict::Suspicious => write!(f, "Suspicious"),
            AgentVerdict::Uncertain => write!(f, "Uncertain"),
        }
    }
}

/// Verdict attached to a composite score.
///
/// Variants are declared in increasing severity so the derived ordering
/// can be used for `--fail-on` style comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// No agent produced a usable answer.
    Uncertain,
    LikelyGenuine,
    Suspicious,
    HighlyLikelyFake,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Uncertain => write!(f, "Uncertain"),
            Verdict::LikelyGenuine => write!(f, "Likely Genuine"),
            Verdict::Suspicious => write!(f, "Suspicious"),
            Verdict::HighlyLikelyFake => write!(f, "Highly Likely Fake"),
        }
    }
}

impl Verdict {
    /// Returns an emoji representation of the verdict.
    pub fn emoji(&self) -> &'static str {
        match self {
            Verdict::Uncertain => "⚪",
            Verdict::LikelyGenuine => "🟢",
            Verdict::Suspicious => "🟡",
            Verdict::HighlyLikelyFake => "🔴",
        }
    }
}

/// Whether a result came from the agent itself or from its local stand-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultSource {
    Primary,
    Fallback,
}

impl fmt::Display for ResultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultSource::Primary => write!(f, "primary"),
            ResultSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// A request field an agent may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputField {
    Text,
    Rating,
    UserContext,
    AppDescription,
    SourceUrl,
    AppMedia,
}

impl InputField {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputField::Text => "text",
            InputField::Rating => "rating",
            InputField::UserContext => "userContext",
            InputField::AppDescription => "appDescription",
            InputField::SourceUrl => "sourceUrl",
            InputField::AppMedia => "appMedia",
        }
    }
}

impl fmt::Display for InputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reviewer history and account features supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    /// Number of reviews the author has written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u32>,
    /// Age of the author's account in days.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_age_days: Option<u32>,
    /// Reviews posted by the author in the last 24 hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews_last_24h: Option<u32>,
    /// Mean rating across the author's reviews.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    /// Whether the platform verified the purchase/install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_purchase: Option<bool>,
    /// Accounts seen on the same device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_account_count: Option<u32>,
    /// Accounts seen behind the same IP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_account_count: Option<u32>,
    /// Accounts sharing the same payment instrument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_payment_accounts: Option<u32>,
    /// Size of the review burst this review was posted in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst_cluster_size: Option<u32>,
    /// Earlier texts by the same author, used as a duplicate reference set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_reviews: Vec<String>,
}

impl UserContext {
    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.review_count.is_none()
            && self.account_age_days.is_none()
            && self.reviews_last_24h.is_none()
            && self.average_rating.is_none()
            && self.verified_purchase.is_none()
            && self.device_account_count.is_none()
            && self.ip_account_count.is_none()
            && self.shared_payment_accounts.is_none()
            && self.burst_cluster_size.is_none()
            && self.previous_reviews.is_empty()
    }
}

/// Media attached to an app listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMedia {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub screenshots: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub video_urls: Vec<String>,
}

impl AppMedia {
    /// All non-blank media URLs, icon first.
    pub fn media_urls(&self) -> Vec<String> {
        self.icon_url
            .iter()
            .chain(self.screenshots.iter())
            .chain(self.video_urls.iter())
            .filter(|u| !u.trim().is_empty())
            .cloned()
            .collect()
    }
}

/// A single piece of content to score, plus whatever context the caller has.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Star rating attached to the content (0-5).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_context: Option<UserContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_media: Option<AppMedia>,
}

impl AnalysisRequest {
    /// Convenience constructor for a text-only request.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Non-blank text, if any.
    pub fn text(&self) -> Option<&str> {
        non_blank(self.text.as_deref())
    }

    /// Rating, if finite and within 0-5.
    pub fn rating(&self) -> Option<f64> {
        self.rating.filter(|r| r.is_finite() && (0.0..=5.0).contains(r))
    }

    /// User context, if it carries at least one value.
    pub fn user_context(&self) -> Option<&UserContext> {
        self.user_context.as_ref().filter(|c| !c.is_empty())
    }

    pub fn app_description(&self) -> Option<&str> {
        non_blank(self.app_description.as_deref())
    }

    pub fn source_url(&self) -> Option<&str> {
        non_blank(self.source_url.as_deref())
    }

    /// App media, if it lists at least one URL.
    pub fn app_media(&self) -> Option<&AppMedia> {
        self.app_media
            .as_ref()
            .filter(|m| !m.media_urls().is_empty())
    }

    /// The set of fields that carry a usable value.
    pub fn present_fields(&self) -> BTreeSet<InputField> {
        let mut fields = BTreeSet::new();
        if self.text().is_some() {
            fields.insert(InputField::Text);
        }
        if self.rating().is_some() {
            fields.insert(InputField::Rating);
        }
        if self.user_context().is_some() {
            fields.insert(InputField::UserContext);
        }
        if self.app_description().is_some() {
            fields.insert(InputField::AppDescription);
        }
        if self.source_url().is_some() {
            fields.insert(InputField::SourceUrl);
        }
        if self.app_media().is_some() {
            fields.insert(InputField::AppMedia);
        }
        fields
    }

    /// Problems with supplied values. Offending fields are treated as absent.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if let Some(r) = self.rating {
            if !r.is_finite() || !(0.0..=5.0).contains(&r) {
                problems.push(format!("rating {} is outside 0-5", r));
            }
        }

        if let Some(ctx) = &self.user_context {
            if let Some(avg) = ctx.average_rating {
                if !avg.is_finite() || !(0.0..=5.0).contains(&avg) {
                    problems.push(format!("userContext.averageRating {} is outside 0-5", avg));
                }
            }
        }

        if let Some(url) = self.source_url() {
            if !url.contains("://") && !url.contains('.') {
                problems.push(format!("sourceUrl '{}' is not a URL", url));
            }
        }

        problems
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// The normalized opinion every agent must produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    /// Identifier of the agent that produced this result.
    pub agent_name: String,
    /// Probability (0-100) that the content is inauthentic.
    pub confidence: f64,
    pub verdict: AgentVerdict,
    /// Short human-readable statements naming the signals that fired.
    pub evidence: Vec<String>,
    /// The agent's untransformed signal, kept for audit.
    pub raw_score: f64,
    pub source: ResultSource,
}

impl AgentResult {
    pub fn new(
        agent_name: impl Into<String>,
        confidence: f64,
        verdict: AgentVerdict,
        evidence: Vec<String>,
        raw_score: f64,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            confidence,
            verdict,
            evidence,
            raw_score,
            source: ResultSource::Primary,
        }
    }

    /// Checks the invariants the aggregator relies on.
    pub fn validate(&self) -> Result<(), String> {
        if self.agent_name.trim().is_empty() {
            return Err("missing agent name".to_string());
        }
        if !self.confidence.is_finite() {
            return Err(format!("confidence {} is not a finite number", self.confidence));
        }
        if !(0.0..=100.0).contains(&self.confidence) {
            return Err(format!("confidence {} is outside 0-100", self.confidence));
        }
        Ok(())
    }
}

/// Why an agent did not contribute to the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AbstentionReason {
    /// Exceeded its own per-agent timeout.
    Timeout,
    /// Still outstanding when the global deadline fired.
    Deadline,
    /// Transport failure or malformed response with no fallback.
    Error,
    /// Produced a result that broke an invariant (e.g. confidence > 100).
    Invalid,
    /// Failed its preflight health check and has no fallback.
    Unhealthy,
    /// Had nothing to score in the request.
    InsufficientSignal,
    /// Panicked inside the detector.
    Panicked,
}

impl fmt::Display for AbstentionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AbstentionReason::Timeout => "timed out",
            AbstentionReason::Deadline => "global deadline exceeded",
            AbstentionReason::Error => "error",
            AbstentionReason::Invalid => "invalid result",
            AbstentionReason::Unhealthy => "unhealthy",
            AbstentionReason::InsufficientSignal => "insufficient signal",
            AbstentionReason::Panicked => "panicked",
        };
        f.write_str(s)
    }
}

/// Outcome of invoking one applicable agent.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutcome {
    Answered(AgentResult),
    Abstained(AbstentionReason),
}

impl AgentOutcome {
    pub fn answered(&self) -> Option<&AgentResult> {
        match self {
            AgentOutcome::Answered(r) => Some(r),
            AgentOutcome::Abstained(_) => None,
        }
    }
}

/// One agent's contribution to the evidence chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceEntry {
    pub agent: String,
    pub display_name: String,
    pub effective_weight: f64,
    pub source: ResultSource,
    pub evidence: Vec<String>,
}

/// The aggregate returned for every analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResult {
    /// Weighted mean (0-100) of answering agents' confidences.
    pub composite_score: f64,
    pub verdict: Verdict,
    /// Results of the agents that answered, keyed by agent identifier.
    pub agent_results: BTreeMap<String, AgentResult>,
    /// Evidence from every answering agent, in registry order.
    pub evidence_chain: Vec<EvidenceEntry>,
    /// Agents that should have answered but did not, in registry order.
    pub missing_agents: Vec<String>,
    /// Renormalized weight actually used for each answering agent.
    pub effective_weights: BTreeMap<String, f64>,
    /// Agents skipped because their inputs were absent or they are disabled.
    #[serde(default)]
    pub not_applicable: Vec<String>,
    /// Reason recorded for each missing agent.
    #[serde(default)]
    pub abstentions: BTreeMap<String, AbstentionReason>,
}

impl CompositeResult {
    /// Number of agents that contributed to the score.
    pub fn answered_count(&self) -> usize {
        self.agent_results.len()
    }

    /// True when at least one contributing answer came from a fallback.
    pub fn used_fallback(&self) -> bool {
        self.agent_results
            .values()
            .any(|r| r.source == ResultSource::Fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_ordering() {
        assert!(Verdict::Uncertain < Verdict::LikelyGenuine);
        assert!(Verdict::LikelyGenuine < Verdict::Suspicious);
        assert!(Verdict::Suspicious < Verdict::HighlyLikelyFake);
    }

    #[test]
    fn test_present_fields_ignores_blank_and_invalid_values() {
        let request = AnalysisRequest {
            text: Some("   ".to_string()),
            rating: Some(f64::NAN),
            user_context: Some(UserContext::default()),
            app_description: Some("A notes app".to_string()),
            source_url: None,
            app_media: Some(AppMedia::default()),
        };

        let fields = request.present_fields();
        assert_eq!(fields.len(), 1);
        assert!(fields.contains(&InputField::AppDescription));
    }

    #[test]
    fn test_validate_reports_out_of_range_rating() {
        let request = AnalysisRequest {
            rating: Some(7.0),
            ..AnalysisRequest::from_text("fine")
        };
        let problems = request.validate();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("rating"));
        assert!(request.rating().is_none());
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let json = r#"{"text":"ok","rating":3,"userContext":{"reviewCount":50},"sourceUrl":"https://x.io"}"#;
        let request: AnalysisRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.rating(), Some(3.0));
        assert_eq!(
            request.user_context().and_then(|c| c.review_count),
            Some(50)
        );
        assert_eq!(request.source_url(), Some("https://x.io"));
    }

    #[test]
    fn test_agent_result_validation() {
        let mut result = AgentResult::new("pattern", 42.0, AgentVerdict::Suspicious, vec![], 42.0);
        assert!(result.validate().is_ok());

        result.confidence = 140.0;
        assert!(result.validate().is_err());

        result.confidence = f64::NAN;
        assert!(result.validate().is_err());
    }

    #[test]
    fn test_media_urls_skip_blank_entries() {
        let media = AppMedia {
            icon_url: Some("https://cdn/icon.png".to_string()),
            screenshots: vec!["".to_string(), "https://cdn/s1.png".to_string()],
            video_urls: vec![],
        };
        assert_eq!(
            media.media_urls(),
            vec!["https://cdn/icon.png", "https://cdn/s1.png"]
        );
    }

    #[test]
    fn test_composite_result_serializes_spec_field_names() {
        let result = CompositeResult {
            composite_score: 0.0,
            verdict: Verdict::Uncertain,
            agent_results: BTreeMap::new(),
            evidence_chain: vec![],
            missing_agents: vec!["pattern".to_string()],
            effective_weights: BTreeMap::new(),
            not_applicable: vec![],
            abstentions: BTreeMap::new(),
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"compositeScore\""));
        assert!(json.contains("\"verdict\":\"UNCERTAIN\""));
        assert!(json.contains("\"agentResults\":{}"));
        assert!(json.contains("\"missingAgents\":[\"pattern\"]"));
        assert!(json.contains("\"effectiveWeights\""));
    }
}
