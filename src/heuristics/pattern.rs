//! Lexical pattern detector.
//!
//! Scores keyword and phrase density: machine self-reference, promotional
//! language, superlative stacking and one-sided praise.

use super::text::{matched_phrases, truncate_chars, words};
use super::{Detector, DetectorLimits, Scorecard};
use crate::error::DetectorError;
use crate::models::{AgentResult, AnalysisRequest};
use crate::registry::ids;

pub(crate) const SELF_REFERENCE: &[&str] = &[
    "as an ai",
    "as an ai language model",
    "as a language model",
    "i am an ai",
    "i'm an ai",
    "i don't have personal",
    "i do not have personal",
    "regenerate response",
];

const PROMOTIONAL: &[&str] = &[
    "highly recommend",
    "must have",
    "must-have",
    "download now",
    "download it now",
    "click here",
    "promo code",
    "use code",
    "best app ever",
    "limited time",
    "check out my",
    "visit my",
    "don't miss",
];

const SUPERLATIVES: &[&str] = &[
    "amazing",
    "perfect",
    "excellent",
    "best",
    "awesome",
    "incredible",
    "outstanding",
    "fantastic",
    "wonderful",
    "brilliant",
    "flawless",
    "phenomenal",
    "superb",
    "extraordinary",
    "unbelievable",
    "greatest",
    "ultimate",
    "exceptional",
];

pub(crate) const NEGATIVE: &[&str] = &[
    "but",
    "however",
    "although",
    "though",
    "except",
    "issue",
    "issues",
    "problem",
    "problems",
    "bug",
    "bugs",
    "crash",
    "crashes",
    "crashed",
    "slow",
    "lag",
    "laggy",
    "drain",
    "bad",
    "worse",
    "worst",
    "annoying",
    "missing",
    "wish",
    "glitch",
    "broken",
    "not",
    "don't",
    "doesn't",
    "didn't",
    "can't",
    "won't",
    "never",
    "hate",
    "disappointed",
    "disappointing",
    "unfortunately",
    "meh",
];

pub(crate) const POSITIVE: &[&str] = &[
    "good", "great", "nice", "love", "like", "useful", "helpful", "works", "fine", "easy",
];

/// Keyword/regex density detector.
pub struct PatternDetector {
    limits: DetectorLimits,
}

impl PatternDetector {
    pub fn new(limits: DetectorLimits) -> Self {
        Self { limits }
    }
}

impl Detector for PatternDetector {
    fn id(&self) -> &'static str {
        ids::PATTERN
    }

    fn detect(&self, request: &AnalysisRequest) -> Result<AgentResult, DetectorError> {
        let text = request
            .text()
            .ok_or(DetectorError::InsufficientSignal("no text"))?;
        let text = truncate_chars(text, self.limits.max_text_chars);
        let lowered = text.to_lowercase();
        let tokens = words(text);

        let mut card = Scorecard::default();

        let self_refs = matched_phrases(&lowered, SELF_REFERENCE);
        if !self_refs.is_empty() {
            let extra = (self_refs.len() - 1) as f64 * 10.0;
            card.add(
                35.0 + extra.min(20.0),
                format!("machine self-reference: \"{}\"", self_refs.join("\", \"")),
            );
        }

        let promo = matched_phrases(&lowered, PROMOTIONAL);
        if !promo.is_empty() {
            card.add(
                (promo.len() as f64 * 10.0).min(30.0),
                format!("promotional phrasing: \"{}\"", promo.join("\", \"")),
            );
        }

        if lowered.contains("http://") || lowered.contains("https://") || lowered.contains("www.") {
            card.add(10.0, "embedded link");
        }

        if !tokens.is_empty() {
            let superlatives = tokens
                .iter()
                .filter(|t| SUPERLATIVES.contains(&t.as_str()))
                .count();
            let density = superlatives as f64 / tokens.len() as f64;
            let points = if density >= 0.25 {
                30.0
            } else if density >= 0.15 {
                20.0
            } else if density >= 0.08 {
                10.0
            } else {
                0.0
            };
            if points > 0.0 {
                card.add(
                    points,
                    format!(
                        "superlative density {:.0}% ({} of {} words)",
                        density * 100.0,
                        superlatives,
                        tokens.len()
                    ),
                );
            }
        }

        let negatives = tokens
            .iter()
            .filter(|t| NEGATIVE.contains(&t.as_str()))
            .count();
        if negatives == 0 && tokens.len() >= 5 {
            card.add(10.0, "no negative or contrastive words");
            if let Some(rating) = request.rating() {
                if rating >= 4.5 {
                    card.add(15.0, format!("maximal rating {} with no counterpoint", rating));
                }
            }
        }
        if let Some(rating) = request.rating() {
            let positives = tokens
                .iter()
                .filter(|t| POSITIVE.contains(&t.as_str()))
                .count();
            if rating <= 1.5 && positives == 0 && negatives >= 3 && tokens.len() >= 5 {
                card.add(10.0, format!("minimal rating {} with one-sided complaints", rating));
            }
        }

        let exclamations = text.chars().filter(|&c| c == '!').count();
        if exclamations >= 3 {
            card.add(10.0, format!("{} exclamation marks", exclamations));
        }

        let shouted = text
            .split_whitespace()
            .filter(|w| {
                w.chars().filter(|c| c.is_alphabetic()).count() >= 3
                    && w.chars().all(|c| !c.is_alphabetic() || c.is_uppercase())
            })
            .count();
        if shouted >= 3 && shouted as f64 / tokens.len().max(1) as f64 >= 0.3 {
            card.add(10.0, format!("{} all-caps words", shouted));
        }

        Ok(card.finish(ids::PATTERN, "no suspicious lexical patterns"))
    }
}
