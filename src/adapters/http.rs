//! Shared HTTP plumbing for external adapters.
//!
//! One attempt plus at most one retry. The retry gets a strictly shorter
//! slice of the budget, and both attempts together never exceed it.

use crate::error::TransportError;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Share of the budget given to the first attempt; the retry gets the rest.
const FIRST_ATTEMPT_SHARE: f64 = 0.6;

/// Longest error body kept in a `TransportError::Status`.
const MAX_ERROR_BODY: usize = 200;

/// Thin wrapper over `reqwest::Client` bound to one service endpoint.
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    health_timeout: Duration,
}

impl HttpAgentClient {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        health_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("veriscore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Other(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            health_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        budget: Duration,
        cancel: &CancellationToken,
    ) -> Result<T, TransportError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        self.call_with_retry(|| self.client.post(&url).json(body), budget, cancel)
            .await
    }

    /// GET with query parameters and decode a JSON response.
    pub async fn get_json<T>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        budget: Duration,
        cancel: &CancellationToken,
    ) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        let url = self.url(path);
        self.call_with_retry(|| self.client.get(&url).query(query), budget, cancel)
            .await
    }

    /// Cheap liveness probe: `GET {endpoint}/health`.
    pub async fn check_health(&self) -> bool {
        let request = self
            .authorize(self.client.get(self.url("/health")))
            .timeout(self.health_timeout);

        match tokio::time::timeout(self.health_timeout, request.send()).await {
            Ok(Ok(response)) => response.status().is_success(),
            Ok(Err(e)) => {
                debug!("Health probe for {} failed: {}", self.endpoint, e);
                false
            }
            Err(_) => {
                debug!("Health probe for {} timed out", self.endpoint);
                false
            }
        }
    }

    async fn call_with_retry<T, F>(
        &self,
        make_request: F,
        budget: Duration,
        cancel: &CancellationToken,
    ) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let (first, second) = split_budget(budget);

        match self.attempt(make_request(), first, cancel).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_retryable() && !cancel.is_cancelled() && !second.is_zero() => {
                debug!(
                    "Retrying {} after {} ({}ms left)",
                    self.endpoint,
                    e,
                    second.as_millis()
                );
                self.attempt(make_request(), second, cancel).await
            }
            Err(e) => Err(e),
        }
    }

    async fn attempt<T>(
        &self,
        request: RequestBuilder,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        let timeout_ms = timeout.as_millis() as u64;
        let request = self.authorize(request).timeout(timeout);

        let call = async {
            let response = request.send().await.map_err(|e| self.classify(e, timeout_ms))?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let mut body = response.text().await.unwrap_or_default();
                body.truncate(floor_char_boundary(&body, MAX_ERROR_BODY));
                return Err(TransportError::Status { status, body });
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| self.classify(e, timeout_ms))?;
            if bytes.iter().all(|b| b.is_ascii_whitespace()) {
                return Err(TransportError::Empty);
            }

            serde_json::from_slice::<T>(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            outcome = tokio::time::timeout(timeout, call) => {
                outcome.unwrap_or(Err(TransportError::Timeout(timeout_ms)))
            }
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn classify(&self, e: reqwest::Error, timeout_ms: u64) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(timeout_ms)
        } else if e.is_connect() {
            TransportError::Connect(self.endpoint.clone())
        } else if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// Split a budget into (first attempt, retry) with retry < first.
pub(crate) fn split_budget(budget: Duration) -> (Duration, Duration) {
    let first = budget.mul_f64(FIRST_ATTEMPT_SHARE);
    (first, budget.saturating_sub(first))
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut idx = max;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
