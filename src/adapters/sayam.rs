//! Review classifier trained on labelled app-store reviews.

use super::http::HttpAgentClient;
use super::{fallback_result, probability_result, settle, ExternalAgent};
use crate::error::TransportError;
use crate::heuristics::pattern::{NEGATIVE, POSITIVE};
use crate::heuristics::text::{truncate_chars, words};
use crate::heuristics::{DetectorLimits, Scorecard};
use crate::models::{AgentResult, AnalysisRequest};
use crate::registry::ids;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    review: &'a str,
    rating: f64,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    prediction: String,
    /// Probability of the predicted class.
    score: f64,
}

pub struct SayamAgent {
    client: HttpAgentClient,
    limits: DetectorLimits,
}

impl SayamAgent {
    pub fn new(client: HttpAgentClient, limits: DetectorLimits) -> Self {
        Self { client, limits }
    }
}

fn normalize(response: ClassifyResponse) -> Result<AgentResult, TransportError> {
    let label = response.prediction.trim().to_lowercase();
    let fake_probability = match label.as_str() {
        "fake" | "cg" => response.score,
        "genuine" | "or" | "original" | "real" => 1.0 - response.score,
        other => {
            return Err(TransportError::Decode(format!(
                "unknown prediction label '{}'",
                other
            )))
        }
    };
    probability_result(
        ids::SAYAM_ML,
        fake_probability,
        vec![format!(
            "classifier predicted '{}' with probability {:.2}",
            label, response.score
        )],
    )
}

#[async_trait]
impl ExternalAgent for SayamAgent {
    fn id(&self) -> &'static str {
        ids::SAYAM_ML
    }

    async fn analyze(
        &self,
        request: &AnalysisRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Option<AgentResult> {
        let review = truncate_chars(request.text()?, self.limits.max_text_chars);
        let rating = request.rating()?;
        let outcome = self
            .client
            .post_json::<_, ClassifyResponse>(
                "/classify",
                &ClassifyRequest { review, rating },
                timeout,
                cancel,
            )
            .await
            .and_then(normalize);
        settle(self, request, outcome)
    }

    async fn check_health(&self) -> bool {
        self.client.check_health().await
    }

    /// Mismatch between the star rating and the sentiment of the text.
    fn fallback(&self, request: &AnalysisRequest) -> Option<AgentResult> {
        let text = truncate_chars(request.text()?, self.limits.max_text_chars);
        let rating = request.rating()?;
        let tokens = words(text);
        let positives = tokens.iter().filter(|t| POSITIVE.contains(&t.as_str())).count();
        let negatives = tokens.iter().filter(|t| NEGATIVE.contains(&t.as_str())).count();

        let mut card = Scorecard::default();
        if rating >= 4.0 && negatives > positives + 1 {
            card.add(
                60.0,
                format!("{} star rating on a mostly negative text", rating),
            );
        } else if rating <= 2.0 && positives > negatives + 1 {
            card.add(
                60.0,
                format!("{} star rating on a mostly positive text", rating),
            );
        }
        if tokens.len() < 4 {
            card.add(15.0, "text too short to support the rating");
        }

        let (score, mut evidence) = card.into_parts();
        if evidence.is_empty() {
            evidence.push("rating agrees with the text".to_string());
        }
        Some(fallback_result(ids::SAYAM_ML, score, evidence))
    }
}
