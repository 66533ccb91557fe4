//! URL reputation lookup against a multi-engine scanner.

use super::http::HttpAgentClient;
use super::{consensus_verdict, fallback_result, settle, ExternalAgent};
use crate::error::TransportError;
use crate::heuristics::Scorecard;
use crate::models::{AgentResult, AnalysisRequest};
use crate::registry::ids;
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SHORTENERS: &[&str] = &[
    "bit.ly", "tinyurl.com", "t.co", "goo.gl", "ow.ly", "is.gd", "buff.ly", "cutt.ly", "rb.gy",
];

const RISKY_TLDS: &[&str] = &["zip", "xyz", "top", "click", "gq", "tk", "ml"];

/// Engine vote counts returned by the lookup.
#[derive(Debug, Default, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    malicious: u32,
    #[serde(default)]
    suspicious: u32,
    #[serde(default)]
    harmless: u32,
    #[serde(default)]
    undetected: u32,
}

pub struct UrlReputationAgent {
    client: HttpAgentClient,
}

impl UrlReputationAgent {
    pub fn new(client: HttpAgentClient) -> Self {
        Self { client }
    }
}

fn normalize(response: LookupResponse) -> Result<AgentResult, TransportError> {
    let voted = response.malicious + response.suspicious + response.harmless;
    if voted == 0 {
        return Err(TransportError::Empty);
    }
    let ratio =
        (response.malicious as f64 + 0.5 * response.suspicious as f64) / voted as f64;
    let evidence = vec![format!(
        "{} malicious, {} suspicious, {} harmless, {} undetected engine verdicts",
        response.malicious, response.suspicious, response.harmless, response.undetected
    )];
    Ok(AgentResult::new(
        ids::URL_REPUTATION,
        ratio * 100.0,
        consensus_verdict(ratio),
        evidence,
        ratio,
    ))
}

/// Parse with an implied `http://` when the scheme is missing.
fn parse_url(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    Url::parse(raw)
        .ok()
        .or_else(|| Url::parse(&format!("http://{}", raw)).ok())
}

/// Score a URL from its shape alone.
fn url_heuristics(raw: &str) -> (f64, Vec<String>) {
    let mut card = Scorecard::default();
    let Some(url) = parse_url(raw) else {
        card.add(40.0, "source URL does not parse");
        return card.into_parts();
    };
    let host = url.host_str().unwrap_or_default().to_lowercase();

    if host.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>().is_ok() {
        card.add(35.0, format!("raw IP address host {}", host));
    }
    if host.split('.').any(|label| label.starts_with("xn--")) {
        card.add(30.0, format!("punycode host {}", host));
    }
    if SHORTENERS.contains(&host.as_str()) {
        card.add(25.0, format!("link shortener {}", host));
    }
    if let Some(tld) = host.rsplit('.').next() {
        if RISKY_TLDS.contains(&tld) {
            card.add(20.0, format!("high-abuse top-level domain .{}", tld));
        }
    }
    if raw.contains('@') {
        card.add(30.0, "credentials or '@' redirect in URL");
    }
    if host.matches('.').count() > 4 {
        card.add(15.0, "deeply nested subdomains");
    }
    if raw.len() > 120 {
        card.add(10.0, format!("very long URL ({} chars)", raw.len()));
    }
    if url.scheme() != "https" {
        card.add(15.0, "not served over HTTPS");
    }
    card.into_parts()
}

#[async_trait]
impl ExternalAgent for UrlReputationAgent {
    fn id(&self) -> &'static str {
        ids::URL_REPUTATION
    }

    async fn analyze(
        &self,
        request: &AnalysisRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Option<AgentResult> {
        let url = request.source_url()?.trim();
        let outcome = self
            .client
            .get_json::<LookupResponse>("/v1/lookup", &[("url", url)], timeout, cancel)
            .await
            .and_then(normalize);
        settle(self, request, outcome)
    }

    async fn check_health(&self) -> bool {
        self.client.check_health().await
    }

    fn fallback(&self, request: &AnalysisRequest) -> Option<AgentResult> {
        let (score, mut evidence) = url_heuristics(request.source_url()?);
        if evidence.is_empty() {
            evidence.push("URL shape looks ordinary".to_string());
        }
        Some(fallback_result(ids::URL_REPUTATION, score, evidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::test_server;
    use crate::models::{AgentVerdict, ResultSource};

    fn with_url(url: &str) -> AnalysisRequest {
        AnalysisRequest {
            source_url: Some(url.to_string()),
            ..Default::default()
        }
    }

    fn agent(addr: std::net::SocketAddr) -> UrlReputationAgent {
        let client =
            HttpAgentClient::new(&format!("http://{}", addr), None, Duration::from_millis(200))
                .unwrap();
        UrlReputationAgent::new(client)
    }

    #[test]
    fn test_vote_ratio() {
        let result = normalize(LookupResponse {
            malicious: 6,
            suspicious: 2,
            harmless: 2,
            undetected: 60,
        })
        .unwrap();
        assert!((result.raw_score - 0.7).abs() < 1e-9);
        assert_eq!(result.verdict, AgentVerdict::Fake);
    }

    #[test]
    fn test_no_votes_is_empty() {
        let result = normalize(LookupResponse {
            undetected: 12,
            ..Default::default()
        });
        assert!(matches!(result, Err(TransportError::Empty)));
    }

    #[test]
    fn test_heuristics_flag_risky_shapes() {
        let (score, evidence) = url_heuristics("http://192.168.4.20/login");
        assert!(score >= 50.0);
        assert!(evidence.iter().any(|e| e.contains("raw IP")));
        assert!(evidence.iter().any(|e| e.contains("HTTPS")));

        let (score, evidence) = url_heuristics("https://bit.ly/abc");
        assert_eq!(score, 25.0);
        assert!(evidence[0].contains("shortener"));

        let (score, _) = url_heuristics("https://xn--80ak6aa92e.xyz/");
        assert_eq!(score, 50.0);
    }

    #[test]
    fn test_heuristics_quiet_on_ordinary_url() {
        let (score, evidence) = url_heuristics("https://play.google.com/store/apps/details?id=x");
        assert_eq!(score, 0.0);
        assert!(evidence.is_empty());
    }

    #[tokio::test]
    async fn test_primary_lookup() {
        let addr = test_server::canned(
            "200 OK",
            r#"{"malicious":0,"suspicious":0,"harmless":70,"undetected":3}"#.to_string(),
        )
        .await;
        let result = agent(addr)
            .analyze(
                &with_url("https://example.com"),
                Duration::from_secs(2),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.source, ResultSource::Primary);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.verdict, AgentVerdict::Genuine);
    }

    #[tokio::test]
    async fn test_unreachable_lookup_falls_back() {
        let addr = test_server::closed().await;
        let result = agent(addr)
            .analyze(
                &with_url("http://10.0.0.1/free-gems"),
                Duration::from_millis(500),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.source, ResultSource::Fallback);
        assert_eq!(result.confidence, 50.0);
        assert!(result.evidence.iter().any(|e| e.contains("raw IP")));
    }
}
