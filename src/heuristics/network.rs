//! Account network signals: device, IP and payment reuse, review bursts.

use super::{Detector, Scorecard};
use crate::error::DetectorError;
use crate::models::{AgentResult, AnalysisRequest};
use crate::registry::ids;

pub struct NetworkDetector;

impl Detector for NetworkDetector {
    fn id(&self) -> &'static str {
        ids::NETWORK
    }

    fn detect(&self, request: &AnalysisRequest) -> Result<AgentResult, DetectorError> {
        let ctx = request
            .user_context()
            .ok_or(DetectorError::InsufficientSignal("no user context"))?;

        if ctx.device_account_count.is_none()
            && ctx.ip_account_count.is_none()
            && ctx.shared_payment_accounts.is_none()
            && ctx.burst_cluster_size.is_none()
        {
            return Err(DetectorError::InsufficientSignal("no account network fields"));
        }

        let mut card = Scorecard::default();

        match ctx.device_account_count {
            Some(n) if n >= 5 => card.add(40.0, format!("{} accounts share this device", n)),
            Some(n) if n >= 2 => card.add(20.0, format!("{} accounts share this device", n)),
            _ => {}
        }

        match ctx.ip_account_count {
            Some(n) if n >= 10 => card.add(30.0, format!("{} accounts behind the same IP", n)),
            Some(n) if n >= 3 => card.add(15.0, format!("{} accounts behind the same IP", n)),
            _ => {}
        }

        if let Some(n) = ctx.shared_payment_accounts.filter(|&n| n >= 2) {
            card.add(25.0, format!("payment method shared by {} accounts", n));
        }

        match ctx.burst_cluster_size {
            Some(n) if n >= 10 => card.add(30.0, format!("posted inside a burst of {} reviews", n)),
            Some(n) if n >= 5 => card.add(20.0, format!("posted inside a burst of {} reviews", n)),
            _ => {}
        }

        Ok(card.finish(ids::NETWORK, "no shared device, IP or payment signals"))
    }
}
