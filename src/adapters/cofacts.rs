//! Cofacts community fact-check lookup.
//!
//! Finds articles similar to the text and reads the community's replies.
//! Each reply is weighted by its feedback votes; the share of weight calling
//! the article a rumor becomes the consensus ratio.

use super::http::HttpAgentClient;
use super::{consensus_verdict, settle, ExternalAgent};
use crate::error::TransportError;
use crate::heuristics::text::truncate_chars;
use crate::heuristics::DetectorLimits;
use crate::models::{AgentResult, AnalysisRequest};
use crate::registry::ids;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Cofacts' similarity search works on a prefix; longer text adds nothing.
const QUERY_CHARS: usize = 2000;

/// Articles considered per lookup.
const MAX_ARTICLES: u32 = 5;

const LIST_ARTICLES: &str = r#"query ListArticles($text: String!, $first: Int!) {
  ListArticles(filter: { moreLikeThis: { like: $text } }, orderBy: [{ _score: DESC }], first: $first) {
    edges {
      node {
        id
        articleReplies {
          positiveFeedbackCount
          negativeFeedbackCount
          reply { type }
        }
      }
    }
  }
}"#;

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<ListArticlesData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListArticlesData {
    list_articles: Option<ArticleConnection>,
}

#[derive(Debug, Deserialize)]
struct ArticleConnection {
    #[serde(default)]
    edges: Vec<ArticleEdge>,
}

#[derive(Debug, Deserialize)]
struct ArticleEdge {
    node: Article,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    id: String,
    #[serde(default)]
    article_replies: Vec<ArticleReply>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArticleReply {
    #[serde(default)]
    positive_feedback_count: u32,
    #[serde(default)]
    negative_feedback_count: u32,
    reply: Option<Reply>,
}

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(rename = "type")]
    kind: ReplyType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum ReplyType {
    Rumor,
    NotRumor,
    Opinionated,
    NotArticle,
    #[serde(other)]
    Unknown,
}

pub struct CofactsAgent {
    client: HttpAgentClient,
    limits: DetectorLimits,
}

impl CofactsAgent {
    pub fn new(client: HttpAgentClient, limits: DetectorLimits) -> Self {
        Self { client, limits }
    }
}

#[derive(Debug, Default, PartialEq)]
struct Tally {
    rumor: f64,
    not_rumor: f64,
    opinionated: f64,
}

impl Tally {
    fn voted(&self) -> f64 {
        self.rumor + self.not_rumor + self.opinionated
    }

    fn ratio(&self) -> f64 {
        (self.rumor + 0.5 * self.opinionated) / self.voted()
    }
}

/// Each reply counts `1 + positive - negative` votes, never below zero.
fn tally(articles: &[Article]) -> Tally {
    let mut tally = Tally::default();
    for reply in articles.iter().flat_map(|a| a.article_replies.iter()) {
        let Some(kind) = reply.reply.as_ref().map(|r| r.kind) else {
            continue;
        };
        let votes = (1.0 + reply.positive_feedback_count as f64
            - reply.negative_feedback_count as f64)
            .max(0.0);
        match kind {
            ReplyType::Rumor => tally.rumor += votes,
            ReplyType::NotRumor => tally.not_rumor += votes,
            ReplyType::Opinionated => tally.opinionated += votes,
            ReplyType::NotArticle | ReplyType::Unknown => {}
        }
    }
    tally
}

fn normalize(response: GraphQlResponse) -> Result<AgentResult, TransportError> {
    if let Some(error) = response.errors.first() {
        return Err(TransportError::Decode(format!("graphql: {}", error.message)));
    }
    let articles: Vec<Article> = response
        .data
        .and_then(|d| d.list_articles)
        .map(|c| c.edges.into_iter().map(|e| e.node).collect())
        .unwrap_or_default();
    if articles.is_empty() {
        return Err(TransportError::Empty);
    }

    let tally = tally(&articles);
    if tally.voted() <= 0.0 {
        return Err(TransportError::Empty);
    }
    let ratio = tally.ratio();

    let evidence = vec![
        format!(
            "{} similar fact-checked article(s), closest {}",
            articles.len(),
            articles[0].id
        ),
        format!(
            "community votes: {:.0} rumor, {:.0} opinionated, {:.0} not rumor",
            tally.rumor, tally.opinionated, tally.not_rumor
        ),
    ];
    Ok(AgentResult::new(
        ids::COFACTS,
        ratio * 100.0,
        consensus_verdict(ratio),
        evidence,
        ratio,
    ))
}

#[async_trait]
impl ExternalAgent for CofactsAgent {
    fn id(&self) -> &'static str {
        ids::COFACTS
    }

    async fn analyze(
        &self,
        request: &AnalysisRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Option<AgentResult> {
        let text = truncate_chars(
            request.text()?,
            self.limits.max_text_chars.min(QUERY_CHARS),
        );
        let body = GraphQlRequest {
            query: LIST_ARTICLES,
            variables: json!({ "text": text, "first": MAX_ARTICLES }),
        };
        let outcome = self
            .client
            .post_json::<_, GraphQlResponse>("/graphql", &body, timeout, cancel)
            .await
            .and_then(normalize);
        settle(self, request, outcome)
    }

    async fn check_health(&self) -> bool {
        self.client.check_health().await
    }
}
