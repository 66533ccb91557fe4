//! Markdown and JSON report generation.
//!
//! The JSON report is the [`CompositeResult`] itself; the Markdown report
//! is a review-oriented rendering of it for human moderators.

use crate::models::{CompositeResult, ResultSource, Verdict};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Facts about the run that produced a result.
#[derive(Debug, Clone)]
pub struct ReportMetadata {
    /// Where the request came from (file path or "stdin").
    pub input: String,
    pub analyzed_at: DateTime<Utc>,
    pub duration_ms: u128,
}

impl ReportMetadata {
    pub fn new(input: impl Into<String>, duration_ms: u128) -> Self {
        Self {
            input: input.into(),
            analyzed_at: Utc::now(),
            duration_ms,
        }
    }
}

/// Generate the Markdown review report.
pub fn generate_markdown_report(result: &CompositeResult, metadata: &ReportMetadata) -> String {
    let mut output = String::new();

    output.push_str("# Authenticity Report\n\n");
    output.push_str(&generate_metadata_section(result, metadata));
    output.push_str(&generate_verdict_section(result));
    output.push_str(&generate_agents_table(result));
    output.push_str(&generate_evidence_section(result));
    output.push_str(&generate_coverage_section(result));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(result: &CompositeResult, metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Input:** {}\n", metadata.input));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analyzed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Duration:** {}ms\n", metadata.duration_ms));
    section.push_str(&format!(
        "- **Agents Answered:** {}\n",
        result.answered_count()
    ));
    section.push_str(&format!(
        "- **Agents Missing:** {}\n",
        result.missing_agents.len()
    ));
    section.push_str(&format!(
        "- **Not Applicable:** {}\n",
        result.not_applicable.len()
    ));
    section.push('\n');

    section
}

fn generate_verdict_section(result: &CompositeResult) -> String {
    let mut section = String::new();

    section.push_str("## Verdict\n\n");
    section.push_str(&format!(
        "{} **{}** with a composite score of **{:.1}** / 100\n\n",
        result.verdict.emoji(),
        result.verdict,
        result.composite_score
    ));

    if result.verdict == Verdict::Uncertain {
        section.push_str("> No agent produced a usable answer for this content.\n\n");
    } else if result.used_fallback() {
        section.push_str(
            "> Some agents answered from a local approximation because their service was unavailable.\n\n",
        );
    }

    section
}

fn generate_agents_table(result: &CompositeResult) -> String {
    if result.evidence_chain.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Agent Results\n\n");
    section.push_str("| Agent | Confidence | Verdict | Source | Weight |\n");
    section.push_str("|-------|-----------:|---------|--------|-------:|\n");

    for entry in &result.evidence_chain {
        let Some(agent) = result.agent_results.get(&entry.agent) else {
            continue;
        };
        section.push_str(&format!(
            "| {} (`{}`) | {:.1} | {:?} | {} | {:.1}% |\n",
            entry.display_name,
            entry.agent,
            agent.confidence,
            agent.verdict,
            source_label(entry.source),
            entry.effective_weight * 100.0
        ));
    }
    section.push('\n');

    section
}

fn generate_evidence_section(result: &CompositeResult) -> String {
    if result.evidence_chain.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Evidence\n\n");
    for entry in &result.evidence_chain {
        section.push_str(&format!("### {}\n\n", entry.display_name));
        for line in &entry.evidence {
            section.push_str(&format!("- {}\n", line));
        }
        section.push('\n');
    }

    section
}

fn generate_coverage_section(result: &CompositeResult) -> String {
    if result.missing_agents.is_empty() && result.not_applicable.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Coverage\n\n");

    if !result.missing_agents.is_empty() {
        section.push_str("**Missing** (weight redistributed to answering agents):\n\n");
        for id in &result.missing_agents {
            match result.abstentions.get(id) {
                Some(reason) => section.push_str(&format!("- `{}`: {}\n", id, reason)),
                None => section.push_str(&format!("- `{}`\n", id)),
            }
        }
        section.push('\n');
    }

    if !result.not_applicable.is_empty() {
        section.push_str(&format!(
            "**Not applicable:** {}\n\n",
            result
                .not_applicable
                .iter()
                .map(|id| format!("`{}`", id))
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    section
}

fn source_label(source: ResultSource) -> &'static str {
    match source {
        ResultSource::Primary => "primary",
        ResultSource::Fallback => "fallback",
    }
}

fn generate_footer() -> String {
    format!(
        "---\n\n*Report generated by veriscore {}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Serialize the result as pretty JSON.
pub fn generate_json_report(result: &CompositeResult) -> Result<String> {
    serde_json::to_string_pretty(result).map_err(Into::into)
}

/// Write a rendered report to a file.
pub fn save_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AbstentionReason, AgentResult, AgentVerdict, EvidenceEntry};
    use std::collections::BTreeMap;

    fn create_test_result() -> CompositeResult {
        let mut fallback = AgentResult::new(
            "bertTransformer",
            62.0,
            AgentVerdict::Suspicious,
            vec!["primary service unavailable; local approximation used".to_string()],
            70.0,
        );
        fallback.source = ResultSource::Fallback;
        let pattern = AgentResult::new(
            "pattern",
            100.0,
            AgentVerdict::Fake,
            vec!["machine self-reference: \"as an ai\"".to_string()],
            115.0,
        );

        CompositeResult {
            composite_score: 77.2,
            verdict: Verdict::HighlyLikelyFake,
            agent_results: BTreeMap::from([
                ("pattern".to_string(), pattern.clone()),
                ("bertTransformer".to_string(), fallback.clone()),
            ]),
            evidence_chain: vec![
                EvidenceEntry {
                    agent: "pattern".to_string(),
                    display_name: "Lexical Pattern Detector".to_string(),
                    effective_weight: 0.4286,
                    source: ResultSource::Primary,
                    evidence: pattern.evidence,
                },
                EvidenceEntry {
                    agent: "bertTransformer".to_string(),
                    display_name: "BERT Generated-Text Classifier".to_string(),
                    effective_weight: 0.5714,
                    source: ResultSource::Fallback,
                    evidence: fallback.evidence,
                },
            ],
            missing_agents: vec!["cofacts".to_string()],
            effective_weights: BTreeMap::from([
                ("pattern".to_string(), 0.4286),
                ("bertTransformer".to_string(), 0.5714),
            ]),
            not_applicable: vec!["urlReputation".to_string()],
            abstentions: BTreeMap::from([("cofacts".to_string(), AbstentionReason::Timeout)]),
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let result = create_test_result();
        let markdown = generate_markdown_report(&result, &ReportMetadata::new("review.json", 412));

        assert!(markdown.contains("# Authenticity Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("review.json"));
        assert!(markdown.contains("412ms"));
        assert!(markdown.contains("Highly Likely Fake"));
        assert!(markdown.contains("77.2"));
        assert!(markdown.contains("| Lexical Pattern Detector (`pattern`) | 100.0 | Fake | primary | 42.9% |"));
        assert!(markdown.contains("local approximation"));
        assert!(markdown.contains("- `cofacts`: timed out"));
        assert!(markdown.contains("`urlReputation`"));
    }

    #[test]
    fn test_evidence_follows_chain_order() {
        let markdown =
            generate_markdown_report(&create_test_result(), &ReportMetadata::new("stdin", 1));
        let pattern = markdown.find("### Lexical Pattern Detector").unwrap();
        let bert = markdown.find("### BERT Generated-Text Classifier").unwrap();
        assert!(pattern < bert);
    }

    #[test]
    fn test_uncertain_report_has_no_agent_table() {
        let result = CompositeResult {
            composite_score: 0.0,
            verdict: Verdict::Uncertain,
            agent_results: BTreeMap::new(),
            evidence_chain: vec![],
            missing_agents: vec![],
            effective_weights: BTreeMap::new(),
            not_applicable: vec![],
            abstentions: BTreeMap::new(),
        };
        let markdown = generate_markdown_report(&result, &ReportMetadata::new("stdin", 0));
        assert!(markdown.contains("No agent produced a usable answer"));
        assert!(!markdown.contains("## Agent Results"));
        assert!(!markdown.contains("## Coverage"));
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&create_test_result()).unwrap();
        assert!(json.contains("\"compositeScore\""));
        assert!(json.contains("\"HIGHLY_LIKELY_FAKE\""));
        assert!(json.contains("\"missingAgents\""));
        assert!(json.contains("\"effectiveWeights\""));
    }

    #[test]
    fn test_save_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        save_report("# hi\n", &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hi\n");
    }
}
