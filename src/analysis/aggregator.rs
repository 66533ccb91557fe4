//! Score aggregation.
//!
//! Pure reduction of per-agent outcomes into a [`CompositeResult`]. Weights
//! are renormalized over the agents that answered, so an abstaining agent
//! never counts as a zero-confidence vote.

use crate::config::VerdictConfig;
use crate::models::{AgentOutcome, CompositeResult, EvidenceEntry, Verdict};
use crate::registry::Registry;
use std::collections::{BTreeMap, HashMap};

/// Map a composite score onto the verdict bands.
///
/// Bands are contiguous: `[0, suspicious)`, `[suspicious, fake)`, `[fake, 100]`.
pub fn classify_verdict(score: f64, bands: &VerdictConfig) -> Verdict {
    if score < bands.suspicious_threshold {
        Verdict::LikelyGenuine
    } else if score < bands.fake_threshold {
        Verdict::Suspicious
    } else {
        Verdict::HighlyLikelyFake
    }
}

/// Result returned when no agent can run on the request.
pub fn insufficient_input(registry: &Registry) -> CompositeResult {
    let all: Vec<String> = registry
        .descriptors()
        .iter()
        .map(|d| d.id.to_string())
        .collect();
    CompositeResult {
        composite_score: 0.0,
        verdict: Verdict::Uncertain,
        agent_results: BTreeMap::new(),
        evidence_chain: Vec::new(),
        missing_agents: all.clone(),
        effective_weights: BTreeMap::new(),
        not_applicable: all,
        abstentions: BTreeMap::new(),
    }
}

/// Reduce the outcomes of every invoked agent into a composite result.
///
/// `outcomes` holds one entry per invoked agent. Iteration follows registry
/// order, so the result does not depend on completion order.
pub fn aggregate(
    registry: &Registry,
    outcomes: &HashMap<&str, AgentOutcome>,
    not_applicable: Vec<String>,
    bands: &VerdictConfig,
) -> CompositeResult {
    let invoked: Vec<_> = registry
        .descriptors()
        .iter()
        .filter_map(|d| outcomes.get(d.id).map(|o| (d, o)))
        .collect();

    let mut abstentions = BTreeMap::new();
    let mut missing_agents = Vec::new();
    for (descriptor, outcome) in &invoked {
        if let AgentOutcome::Abstained(reason) = outcome {
            abstentions.insert(descriptor.id.to_string(), *reason);
            missing_agents.push(descriptor.id.to_string());
        }
    }

    let answered: Vec<_> = invoked
        .iter()
        .filter_map(|(d, o)| o.answered().map(|r| (*d, r)))
        .collect();
    let total_weight: f64 = answered.iter().map(|(d, _)| d.weight).sum();

    if answered.is_empty() || total_weight <= 0.0 {
        return CompositeResult {
            composite_score: 0.0,
            verdict: Verdict::Uncertain,
            agent_results: BTreeMap::new(),
            evidence_chain: Vec::new(),
            missing_agents: invoked.iter().map(|(d, _)| d.id.to_string()).collect(),
            effective_weights: BTreeMap::new(),
            not_applicable,
            abstentions,
        };
    }

    let mut agent_results = BTreeMap::new();
    let mut effective_weights = BTreeMap::new();
    let mut evidence_chain = Vec::with_capacity(answered.len());
    let mut score = 0.0;

    for (descriptor, result) in answered {
        let weight = descriptor.weight / total_weight;
        score += result.confidence * weight;

        effective_weights.insert(descriptor.id.to_string(), weight);
        agent_results.insert(descriptor.id.to_string(), result.clone());
        evidence_chain.push(EvidenceEntry {
            agent: descriptor.id.to_string(),
            display_name: descriptor.display_name.to_string(),
            effective_weight: weight,
            source: result.source,
            evidence: result.evidence.clone(),
        });
    }

    // Rounding can push a weighted mean of values in [0, 100] a hair outside.
    let composite_score = score.clamp(0.0, 100.0);

    CompositeResult {
        composite_score,
        verdict: classify_verdict(composite_score, bands),
        agent_results,
        evidence_chain,
        missing_agents,
        effective_weights,
        not_applicable,
        abstentions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AbstentionReason, AgentResult, AgentVerdict};
    use crate::registry::ids;

    fn answered(id: &str, confidence: f64) -> AgentOutcome {
        AgentOutcome::Answered(AgentResult::new(
            id,
            confidence,
            AgentVerdict::Uncertain,
            vec![format!("{} evidence", id)],
            confidence,
        ))
    }

    fn run(outcomes: Vec<(&'static str, AgentOutcome)>) -> CompositeResult {
        let map: HashMap<&str, AgentOutcome> = outcomes.into_iter().collect();
        aggregate(&Registry::default(), &map, Vec::new(), &VerdictConfig::default())
    }

    #[test]
    fn test_weights_renormalize_over_answering_agents() {
        // pattern 0.15, nlp 0.15, bertTransformer 0.20 (abstained)
        let result = run(vec![
            (ids::PATTERN, answered(ids::PATTERN, 80.0)),
            (ids::NLP, answered(ids::NLP, 40.0)),
            (
                ids::BERT_TRANSFORMER,
                AgentOutcome::Abstained(AbstentionReason::Timeout),
            ),
        ]);

        assert!((result.effective_weights[ids::PATTERN] - 0.5).abs() < 1e-9);
        assert!((result.effective_weights[ids::NLP] - 0.5).abs() < 1e-9);
        assert!((result.composite_score - 60.0).abs() < 1e-9);
        assert_eq!(result.verdict, Verdict::Suspicious);
        assert_eq!(result.missing_agents, vec![ids::BERT_TRANSFORMER]);
        assert_eq!(
            result.abstentions[ids::BERT_TRANSFORMER],
            AbstentionReason::Timeout
        );
        assert!(!result.agent_results.contains_key(ids::BERT_TRANSFORMER));
    }

    #[test]
    fn test_effective_weights_sum_to_one() {
        let result = run(vec![
            (ids::PATTERN, answered(ids::PATTERN, 10.0)),
            (ids::BEHAVIOR, answered(ids::BEHAVIOR, 90.0)),
            (ids::COFACTS, answered(ids::COFACTS, 55.0)),
            (ids::MEDIA_FORENSICS, answered(ids::MEDIA_FORENSICS, 0.0)),
        ]);
        let sum: f64 = result.effective_weights.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);

        let expected: f64 = result
            .agent_results
            .iter()
            .map(|(id, r)| r.confidence * result.effective_weights[id])
            .sum();
        assert!((result.composite_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_all_abstained_is_uncertain_without_division() {
        let result = run(vec![
            (ids::PATTERN, AgentOutcome::Abstained(AbstentionReason::Panicked)),
            (ids::NLP, AgentOutcome::Abstained(AbstentionReason::Error)),
        ]);
        assert_eq!(result.composite_score, 0.0);
        assert_eq!(result.verdict, Verdict::Uncertain);
        assert_eq!(result.missing_agents, vec![ids::PATTERN, ids::NLP]);
        assert!(result.effective_weights.is_empty());
        assert!(result.composite_score.is_finite());
    }

    #[test]
    fn test_evidence_chain_follows_registry_order() {
        let result = run(vec![
            (ids::MEDIA_FORENSICS, answered(ids::MEDIA_FORENSICS, 20.0)),
            (ids::PATTERN, answered(ids::PATTERN, 20.0)),
            (ids::BERT_TRANSFORMER, answered(ids::BERT_TRANSFORMER, 20.0)),
        ]);
        let order: Vec<_> = result.evidence_chain.iter().map(|e| e.agent.as_str()).collect();
        assert_eq!(
            order,
            vec![ids::PATTERN, ids::BERT_TRANSFORMER, ids::MEDIA_FORENSICS]
        );
        assert_eq!(result.evidence_chain[0].display_name, "Lexical Pattern Detector");
    }

    #[test]
    fn test_insufficient_input_lists_every_agent() {
        let registry = Registry::default();
        let result = insufficient_input(&registry);
        assert_eq!(result.verdict, Verdict::Uncertain);
        assert_eq!(result.composite_score, 0.0);
        assert_eq!(result.missing_agents.len(), registry.descriptors().len());
    }

    #[test]
    fn test_verdict_bands_are_exhaustive_and_monotonic() {
        let bands = VerdictConfig::default();
        let mut previous = Verdict::LikelyGenuine;
        for step in 0..=1000 {
            let score = step as f64 / 10.0;
            let verdict = classify_verdict(score, &bands);
            assert_ne!(verdict, Verdict::Uncertain);
            assert!(verdict >= previous, "verdict dropped at {}", score);
            previous = verdict;
        }
        assert_eq!(classify_verdict(29.999, &bands), Verdict::LikelyGenuine);
        assert_eq!(classify_verdict(30.0, &bands), Verdict::Suspicious);
        assert_eq!(classify_verdict(69.999, &bands), Verdict::Suspicious);
        assert_eq!(classify_verdict(70.0, &bands), Verdict::HighlyLikelyFake);
        assert_eq!(classify_verdict(100.0, &bands), Verdict::HighlyLikelyFake);
    }

    #[test]
    fn test_score_stays_within_bounds() {
        for confidence in [0.0, 0.1, 33.3, 99.999, 100.0] {
            let result = run(vec![
                (ids::PATTERN, answered(ids::PATTERN, confidence)),
                (ids::NLP, answered(ids::NLP, 100.0)),
                (ids::DUPLICATE, answered(ids::DUPLICATE, 100.0)),
            ]);
            assert!((0.0..=100.0).contains(&result.composite_score));
        }
    }
}
