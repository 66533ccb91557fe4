//! BERT generated-text classifier adapter.
//!
//! The service returns a 0-1 "computer generated" probability which is
//! rescaled to 0-100 and split at 0.5.

use super::http::HttpAgentClient;
use super::{fallback_result, probability_result, settle, ExternalAgent};
use crate::error::TransportError;
use crate::heuristics::nlp::{coefficient_of_variation, GENERIC_PHRASES};
use crate::heuristics::pattern::SELF_REFERENCE;
use crate::heuristics::text::{matched_phrases, sentences, truncate_chars, words};
use crate::heuristics::{DetectorLimits, Scorecard};
use crate::models::{AgentResult, AnalysisRequest};
use crate::registry::ids;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default, alias = "cgProbability", alias = "probability")]
    cg_probability: Option<f64>,
    #[serde(default)]
    label: Option<String>,
}

pub struct BertTransformerAgent {
    client: HttpAgentClient,
    limits: DetectorLimits,
}

impl BertTransformerAgent {
    pub fn new(client: HttpAgentClient, limits: DetectorLimits) -> Self {
        Self { client, limits }
    }
}

fn normalize(response: PredictResponse) -> Result<AgentResult, TransportError> {
    let probability = response.cg_probability.ok_or(TransportError::Empty)?;
    let mut evidence = vec![format!("generated-text probability {:.2}", probability)];
    if let Some(label) = response.label.filter(|l| !l.trim().is_empty()) {
        evidence.push(format!("classifier label: {}", label));
    }
    probability_result(ids::BERT_TRANSFORMER, probability, evidence)
}

#[async_trait]
impl ExternalAgent for BertTransformerAgent {
    fn id(&self) -> &'static str {
        ids::BERT_TRANSFORMER
    }

    async fn analyze(
        &self,
        request: &AnalysisRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Option<AgentResult> {
        let text = truncate_chars(request.text()?, self.limits.max_text_chars);
        let outcome = self
            .client
            .post_json::<_, PredictResponse>("/predict", &PredictRequest { text }, timeout, cancel)
            .await
            .and_then(normalize);
        settle(self, request, outcome)
    }

    async fn check_health(&self) -> bool {
        self.client.check_health().await
    }

    /// Machine self-reference, template phrasing and flat sentence rhythm.
    fn fallback(&self, request: &AnalysisRequest) -> Option<AgentResult> {
        let text = truncate_chars(request.text()?, self.limits.max_text_chars);
        let lowered = text.to_lowercase();
        let mut card = Scorecard::default();

        let self_refs = matched_phrases(&lowered, SELF_REFERENCE);
        if !self_refs.is_empty() {
            card.add(60.0, format!("machine self-reference: \"{}\"", self_refs.join("\", \"")));
        }

        let generic = matched_phrases(&lowered, GENERIC_PHRASES);
        if !generic.is_empty() {
            card.add(
                (generic.len() as f64 * 10.0).min(30.0),
                format!("{} template phrases", generic.len()),
            );
        }

        let lengths: Vec<f64> = sentences(text)
            .iter()
            .map(|s| words(s).len() as f64)
            .collect();
        if lengths.len() >= 3 && coefficient_of_variation(&lengths) < 0.25 {
            card.add(25.0, "low burstiness across sentences");
        }

        let (score, mut evidence) = card.into_parts();
        if evidence.is_empty() {
            evidence.push("no generated-text markers".to_string());
        }
        Some(fallback_result(ids::BERT_TRANSFORMER, score, evidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::test_server;
    use crate::models::{AgentVerdict, ResultSource};

    fn agent(addr: std::net::SocketAddr) -> BertTransformerAgent {
        let client =
            HttpAgentClient::new(&format!("http://{}", addr), None, Duration::from_millis(200))
                .unwrap();
        BertTransformerAgent::new(client, DetectorLimits::default())
    }

    #[test]
    fn test_normalize_rescales_probability() {
        let result = normalize(PredictResponse {
            cg_probability: Some(0.87),
            label: Some("CG".to_string()),
        })
        .unwrap();
        assert!((result.confidence - 87.0).abs() < 1e-9);
        assert_eq!(result.verdict, AgentVerdict::Fake);
        assert_eq!(result.raw_score, 0.87);
        assert_eq!(result.evidence.len(), 2);
    }

    #[test]
    fn test_normalize_rejects_missing_probability() {
        let result = normalize(PredictResponse {
            cg_probability: None,
            label: None,
        });
        assert!(matches!(result, Err(TransportError::Empty)));
    }

    #[tokio::test]
    async fn test_primary_answer() {
        let addr = test_server::canned("200 OK", r#"{"cgProbability":0.1}"#.to_string()).await;
        let result = agent(addr)
            .analyze(
                &AnalysisRequest::from_text("Solid notes app."),
                Duration::from_secs(2),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.source, ResultSource::Primary);
        assert_eq!(result.verdict, AgentVerdict::Genuine);
    }

    #[tokio::test]
    async fn test_unreachable_service_falls_back() {
        let addr = test_server::closed().await;
        let result = agent(addr)
            .analyze(
                &AnalysisRequest::from_text("As an AI language model I think this app is great."),
                Duration::from_millis(500),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.source, ResultSource::Fallback);
        assert!(result.confidence <= 80.0 && result.confidence >= 20.0);
        assert!(result.evidence[0].contains("unavailable"));
        assert!(result.evidence.iter().any(|e| e.contains("self-reference")));
    }

    #[tokio::test]
    async fn test_malformed_response_falls_back() {
        let addr = test_server::canned("200 OK", r#"{"unexpected":true}"#.to_string()).await;
        let result = agent(addr)
            .analyze(
                &AnalysisRequest::from_text("Fine."),
                Duration::from_secs(2),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.source, ResultSource::Fallback);
    }
}
