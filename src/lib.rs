//! Veriscore - composite authenticity scoring engine.
//!
//! An [`Orchestrator`] dispatches one [`AnalysisRequest`] to local heuristic
//! detectors and third-party classification services concurrently, then
//! reduces whatever answered in time into a [`CompositeResult`]: a 0-100
//! score, a verdict and an evidence chain in registry order.
//!
//! ```no_run
//! # async fn run() -> veriscore::EngineResult<()> {
//! use veriscore::{AnalysisRequest, Config, Orchestrator};
//!
//! let orchestrator = Orchestrator::from_config(&Config::default())?;
//! let result = orchestrator
//!     .analyze(&AnalysisRequest::from_text("Great app, five stars!"))
//!     .await?;
//! println!("{} ({:.1})", result.verdict, result.composite_score);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod heuristics;
pub mod models;
pub mod registry;
pub mod report;

pub use analysis::{Orchestrator, OrchestratorBuilder};
pub use config::Config;
pub use error::{EngineError, EngineResult};
pub use models::{AgentResult, AnalysisRequest, CompositeResult, Verdict};
pub use registry::Registry;
