//! Duplicate-content detector.
//!
//! Compares the text against a reference set (the author's earlier reviews
//! and the app description) using word 3-gram Jaccard similarity, and looks
//! for repetition inside the text itself.

use super::text::{jaccard, sentences, shingles, truncate_chars, words};
use super::{Detector, DetectorLimits, Scorecard};
use crate::error::DetectorError;
use crate::models::{AgentResult, AnalysisRequest};
use crate::registry::ids;
use std::collections::HashSet;

const SHINGLE_SIZE: usize = 3;

/// Minimum similarity worth reporting.
const REPORT_SIMILARITY: f64 = 0.3;

pub struct DuplicateDetector {
    limits: DetectorLimits,
}

impl DuplicateDetector {
    pub fn new(limits: DetectorLimits) -> Self {
        Self { limits }
    }

    fn fingerprint(&self, text: &str) -> HashSet<String> {
        let text = truncate_chars(text, self.limits.max_text_chars);
        shingles(&words(text), SHINGLE_SIZE)
    }
}

impl Detector for DuplicateDetector {
    fn id(&self) -> &'static str {
        ids::DUPLICATE
    }

    fn detect(&self, request: &AnalysisRequest) -> Result<AgentResult, DetectorError> {
        let text = request
            .text()
            .ok_or(DetectorError::InsufficientSignal("no text"))?;
        let text = truncate_chars(text, self.limits.max_text_chars);
        let own = self.fingerprint(text);

        let mut card = Scorecard::default();

        let previous: Vec<&str> = request
            .user_context()
            .map(|c| {
                c.previous_reviews
                    .iter()
                    .map(String::as_str)
                    .filter(|r| !r.trim().is_empty())
                    .take(self.limits.max_reference_texts)
                    .collect()
            })
            .unwrap_or_default();

        let mut best: Option<(f64, String)> = None;
        for (i, reference) in previous.iter().enumerate() {
            let sim = jaccard(&own, &self.fingerprint(reference));
            if best.as_ref().map_or(true, |(b, _)| sim > *b) {
                best = Some((sim, format!("previous review #{}", i + 1)));
            }
        }
        if let Some(description) = request.app_description() {
            let sim = jaccard(&own, &self.fingerprint(description));
            if best.as_ref().map_or(true, |(b, _)| sim > *b) {
                best = Some((sim, "the app description".to_string()));
            }
        }

        match &best {
            Some((sim, what)) if *sim >= REPORT_SIMILARITY => {
                card.add(
                    sim * 100.0,
                    format!("near-duplicate of {} (similarity {:.2})", what, sim),
                );
            }
            Some(_) => card.note("no close match in the reference set"),
            None => card.note("no reference texts supplied; checked internal repetition only"),
        }

        let sents = sentences(text);
        if sents.len() >= 2 {
            let mut seen = HashSet::new();
            let repeated = sents
                .iter()
                .map(|s| words(s).join(" "))
                .filter(|s| !s.is_empty() && !seen.insert(s.clone()))
                .count();
            let fraction = repeated as f64 / sents.len() as f64;
            if fraction >= 0.3 {
                card.add(
                    25.0,
                    format!("{} of {} sentences repeated", repeated, sents.len()),
                );
            }
        }

        let tokens = words(text);
        let stutter = tokens
            .windows(3)
            .any(|w| w[0] == w[1] && w[1] == w[2]);
        if stutter {
            card.add(15.0, "same word repeated three times in a row");
        }

        Ok(card.finish(ids::DUPLICATE, "no duplicate content"))
    }
}
