//! Image and video forensics for app listing media.

use super::http::HttpAgentClient;
use super::{settle, ExternalAgent};
use crate::error::TransportError;
use crate::heuristics::detector_verdict;
use crate::models::{AgentResult, AnalysisRequest};
use crate::registry::ids;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Media URLs sent per request.
const MAX_MEDIA: usize = 20;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    media_urls: &'a [String],
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    results: Vec<MediaScore>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaScore {
    url: String,
    #[serde(default)]
    manipulation_score: Option<f64>,
    #[serde(default)]
    ai_generated_score: Option<f64>,
}

impl MediaScore {
    fn worst(&self) -> Option<f64> {
        self.manipulation_score
            .into_iter()
            .chain(self.ai_generated_score)
            .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))))
    }
}

pub struct MediaForensicsAgent {
    client: HttpAgentClient,
}

impl MediaForensicsAgent {
    pub fn new(client: HttpAgentClient) -> Self {
        Self { client }
    }
}

fn normalize(response: AnalyzeResponse) -> Result<AgentResult, TransportError> {
    let mut worst: Option<(f64, &MediaScore)> = None;
    for item in &response.results {
        let Some(score) = item.worst() else { continue };
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(TransportError::Decode(format!(
                "score {} for {} outside 0-1",
                score, item.url
            )));
        }
        if worst.map_or(true, |(w, _)| score > w) {
            worst = Some((score, item));
        }
    }
    let (score, item) = worst.ok_or(TransportError::Empty)?;

    let confidence = score * 100.0;
    let evidence = vec![
        format!("{} media item(s) analysed", response.results.len()),
        format!(
            "highest manipulation/AI-generation score {:.2} on {}",
            score, item.url
        ),
    ];
    Ok(AgentResult::new(
        ids::MEDIA_FORENSICS,
        confidence,
        detector_verdict(confidence),
        evidence,
        score,
    ))
}

#[async_trait]
impl ExternalAgent for MediaForensicsAgent {
    fn id(&self) -> &'static str {
        ids::MEDIA_FORENSICS
    }

    async fn analyze(
        &self,
        request: &AnalysisRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Option<AgentResult> {
        let mut urls = request.app_media()?.media_urls();
        urls.truncate(MAX_MEDIA);
        let outcome = self
            .client
            .post_json::<_, AnalyzeResponse>(
                "/analyze",
                &AnalyzeRequest { media_urls: &urls },
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::test_server;
    use crate::models::{AgentVerdict, AppMedia};

    fn parse(body: &str) -> AnalyzeResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_highest_score_wins() {
        let result = normalize(parse(
            r#"{"results":[
                {"url":"icon.png","manipulationScore":0.1,"aiGeneratedScore":0.2},
                {"url":"shot1.png","manipulationScore":0.85}
            ]}"#,
        ))
        .unwrap();
        assert!((result.confidence - 85.0).abs() < 1e-9);
        assert_eq!(result.verdict, AgentVerdict::Fake);
        assert!(result.evidence[1].contains("shot1.png"));
    }

    #[test]
    fn test_unscored_results_are_empty() {
        let result = normalize(parse(r#"{"results":[{"url":"a.png"}]}"#));
        assert!(matches!(result, Err(TransportError::Empty)));
    }

    #[test]
    fn test_out_of_range_score_is_decode_error() {
        let result = normalize(parse(r#"{"results":[{"url":"a.png","aiGeneratedScore":3.0}]}"#));
        assert!(matches!(result, Err(TransportError::Decode(_))));
    }

    #[tokio::test]
    async fn test_timeout_abstains() {
        let addr = test_server::silent().await;
        let client =
            HttpAgentClient::new(&format!("http://{}", addr), None, Duration::from_millis(200))
                .unwrap();
        let request = AnalysisRequest {
            app_media: Some(AppMedia {
                icon_url: Some("https://cdn.example.com/icon.png".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let result = MediaForensicsAgent::new(client)
            .analyze(&request, Duration::from_millis(200), &CancellationToken::new())
            .await;
        assert!(result.is_none());
    }
}
