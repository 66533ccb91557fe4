//! Analysis pipeline: concurrent fan-out and score aggregation.

pub mod aggregator;
pub mod orchestrator;

pub use aggregator::{aggregate, classify_verdict, insufficient_input};
pub use orchestrator::{AgentHealth, Orchestrator, OrchestratorBuilder};
