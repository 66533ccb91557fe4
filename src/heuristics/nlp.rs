//! Linguistic heuristics.
//!
//! Genericity and rhythm: template praise, missing concrete details,
//! uniform sentence lengths and low lexical diversity.

use super::text::{matched_phrases, sentences, truncate_chars, words};
use super::{Detector, DetectorLimits, Scorecard};
use crate::error::DetectorError;
use crate::models::{AgentResult, AnalysisRequest};
use crate::registry::ids;
use std::collections::HashSet;

pub(crate) const GENERIC_PHRASES: &[&str] = &[
    "great app",
    "good app",
    "nice app",
    "love it",
    "love this app",
    "best app",
    "highly recommend",
    "works great",
    "works perfectly",
    "easy to use",
    "user friendly",
    "user-friendly",
    "must have",
    "five stars",
    "5 stars",
    "would recommend",
    "game changer",
    "changed my life",
    "10/10",
];

const DURATION_WORDS: &[&str] = &[
    "minute", "minutes", "hour", "hours", "day", "days", "week", "weeks", "month", "months",
    "year", "years", "yesterday", "today",
];

const FIRST_PERSON: &[&str] = &[
    "i", "i'm", "i've", "i'd", "my", "me", "we", "our", "us", "used", "tried", "using",
];

/// Sentence-rhythm and genericity detector.
pub struct NlpDetector {
    limits: DetectorLimits,
}

impl NlpDetector {
    pub fn new(limits: DetectorLimits) -> Self {
        Self { limits }
    }
}

impl Detector for NlpDetector {
    fn id(&self) -> &'static str {
        ids::NLP
    }

    fn detect(&self, request: &AnalysisRequest) -> Result<AgentResult, DetectorError> {
        let text = request
            .text()
            .ok_or(DetectorError::InsufficientSignal("no text"))?;
        let text = truncate_chars(text, self.limits.max_text_chars);
        let lowered = text.to_lowercase();
        let tokens = words(text);
        let sents = sentences(text);

        let mut card = Scorecard::default();

        if tokens.len() < 5 {
            card.add(15.0, format!("very short text ({} words)", tokens.len()));
        }

        let generic = matched_phrases(&lowered, GENERIC_PHRASES);
        if !generic.is_empty() {
            card.add(
                (generic.len() as f64 * 12.0).min(36.0),
                format!("generic template phrases: \"{}\"", generic.join("\", \"")),
            );
        }

        let has_digits = tokens.iter().any(|t| t.chars().any(|c| c.is_ascii_digit()));
        let has_duration = tokens.iter().any(|t| DURATION_WORDS.contains(&t.as_str()));
        if has_digits || has_duration {
            card.note("mentions concrete details (numbers, versions or durations)");
        } else if tokens.len() >= 5 {
            card.add(15.0, "no concrete details (numbers, versions or durations)");
        }

        let first_person = tokens.iter().any(|t| FIRST_PERSON.contains(&t.as_str()));
        if !first_person && tokens.len() >= 8 {
            card.add(10.0, "no first-person experience");
        }

        if sents.len() >= 3 {
            let lengths: Vec<f64> = sents.iter().map(|s| words(s).len() as f64).collect();
            let cv = coefficient_of_variation(&lengths);
            if cv < 0.2 {
                card.add(
                    20.0,
                    format!("uniform sentence lengths (variation {:.2} over {} sentences)", cv, sents.len()),
                );
            } else if cv < 0.35 {
                card.add(
                    10.0,
                    format!("low sentence-length variation ({:.2})", cv),
                );
            }
        }

        if tokens.len() >= 50 {
            let distinct: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            let ttr = distinct.len() as f64 / tokens.len() as f64;
            if ttr < 0.4 {
                card.add(15.0, format!("low lexical diversity ({:.2} type/token)", ttr));
            }
        }

        Ok(card.finish(ids::NLP, "natural, specific language"))
    }
}

/// Standard deviation over mean; 0.0 for empty or zero-mean input.
pub(crate) fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}
