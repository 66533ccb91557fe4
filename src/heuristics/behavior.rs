//! Reviewer behavior signals.

use super::{Detector, Scorecard};
use crate::error::DetectorError;
use crate::models::{AgentResult, AnalysisRequest};
use crate::registry::ids;

/// Scores reviewer history features from `userContext`.
pub struct BehaviorDetector;

impl Detector for BehaviorDetector {
    fn id(&self) -> &'static str {
        ids::BEHAVIOR
    }

    fn detect(&self, request: &AnalysisRequest) -> Result<AgentResult, DetectorError> {
        let ctx = request
            .user_context()
            .ok_or(DetectorError::InsufficientSignal("no user context"))?;

        if ctx.review_count.is_none()
            && ctx.account_age_days.is_none()
            && ctx.reviews_last_24h.is_none()
            && ctx.average_rating.is_none()
            && ctx.verified_purchase.is_none()
        {
            return Err(DetectorError::InsufficientSignal("no reviewer history fields"));
        }

        let mut card = Scorecard::default();

        match ctx.review_count {
            Some(0) => card.add(25.0, "first review on the account"),
            Some(n @ 1..=2) => card.add(15.0, format!("only {} prior reviews", n)),
            Some(n) if n >= 20 => card.add(-10.0, format!("established reviewer ({} reviews)", n)),
            _ => {}
        }

        match ctx.account_age_days {
            Some(d) if d < 7 => card.add(25.0, format!("account is {} days old", d)),
            Some(d) if d < 30 => card.add(10.0, format!("account is {} days old", d)),
            Some(d) if d >= 365 => card.add(-5.0, format!("account older than a year ({} days)", d)),
            _ => {}
        }

        match ctx.reviews_last_24h {
            Some(n) if n >= 10 => card.add(35.0, format!("{} reviews in the last 24h", n)),
            Some(n) if n >= 5 => card.add(25.0, format!("{} reviews in the last 24h", n)),
            Some(n) if n >= 3 => card.add(10.0, format!("{} reviews in the last 24h", n)),
            _ => {}
        }

        if let (Some(avg), Some(count)) = (valid_rating(ctx.average_rating), ctx.review_count) {
            if count >= 5 && (avg >= 4.9 || avg <= 1.1) {
                card.add(15.0, format!("rates at the extremes (average {:.1})", avg));
            }
        }

        match ctx.verified_purchase {
            Some(false) => card.add(10.0, "purchase not verified"),
            Some(true) => card.add(-5.0, "verified purchase"),
            None => {}
        }

        if let Some(rating) = request.rating() {
            let extreme = rating >= 4.5 || rating <= 1.5;
            if extreme && ctx.account_age_days.is_some_and(|d| d < 30) {
                card.add(10.0, format!("extreme rating {} from a new account", rating));
            }
            if let Some(avg) = valid_rating(ctx.average_rating) {
                if (rating - avg).abs() >= 3.0 {
                    card.add(
                        10.0,
                        format!("rating {} deviates from reviewer norm {:.1}", rating, avg),
                    );
                }
            }
        }

        Ok(card.finish(ids::BEHAVIOR, "reviewer history looks ordinary"))
    }
}

fn valid_rating(value: Option<f64>) -> Option<f64> {
    value.filter(|r| r.is_finite() && (0.0..=5.0).contains(r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentVerdict, UserContext};

    fn request(ctx: UserContext, rating: Option<f64>) -> AnalysisRequest {
        AnalysisRequest {
            rating,
            user_context: Some(ctx),
            ..Default::default()
        }
    }

    #[test]
    fn test_established_reviewer_scores_zero() {
        let req = request(
            UserContext {
                review_count: Some(50),
                ..Default::default()
            },
            Some(3.0),
        );
        let result = BehaviorDetector.detect(&req).unwrap();
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.raw_score, -10.0);
        assert_eq!(result.verdict, AgentVerdict::Genuine);
    }

    #[test]
    fn test_fresh_burst_account_is_fake() {
        let req = request(
            UserContext {
                review_count: Some(0),
                account_age_days: Some(2),
                reviews_last_24h: Some(12),
                verified_purchase: Some(false),
                ..Default::default()
            },
            Some(5.0),
        );
        let result = BehaviorDetector.detect(&req).unwrap();
        assert_eq!(result.verdict, AgentVerdict::Fake);
        assert_eq!(result.confidence, 100.0);
        assert!(result.evidence.iter().any(|e| e.contains("24h")));
    }

    #[test]
    fn test_network_only_context_is_insufficient() {
        let req = request(
            UserContext {
                device_account_count: Some(4),
                ..Default::default()
            },
            None,
        );
        assert!(matches!(
            BehaviorDetector.detect(&req),
            Err(DetectorError::InsufficientSignal(_))
        ));
    }
}
