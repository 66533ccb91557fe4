//! The scoring orchestrator.
//!
//! Fans a request out to every applicable agent, collects what comes back
//! before the deadlines, and hands the outcomes to the aggregator.

use super::aggregator::{aggregate, insufficient_input};
use crate::adapters::{default_adapters, ExternalAgent};
use crate::config::Config;
use crate::error::{DetectorError, EngineError, EngineResult};
use crate::heuristics::{default_detectors, Detector, DetectorLimits};
use crate::models::{AbstentionReason, AgentKind, AgentOutcome, AnalysisRequest, CompositeResult};
use crate::registry::Registry;
use futures::future::join_all;
use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Share of the per-agent timeout handed to the adapter itself. The rest
/// leaves room for its fallback before the hard cutoff.
const ADAPTER_BUDGET_SHARE: f64 = 0.9;

type Dialable = (&'static str, Arc<dyn ExternalAgent>);

/// Health of one external agent as reported by its probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentHealth {
    pub id: &'static str,
    pub endpoint_healthy: bool,
}

/// Runs analyses against a fixed registry and agent set.
///
/// Cheap to share behind an `Arc`; `analyze` takes `&self` and keeps no
/// state between calls.
pub struct Orchestrator {
    registry: Arc<Registry>,
    detectors: HashMap<&'static str, Box<dyn Detector>>,
    agents: HashMap<&'static str, Arc<dyn ExternalAgent>>,
    config: Config,
}

impl Orchestrator {
    /// Wire the default detectors and HTTP adapters described by `config`.
    pub fn from_config(config: &Config) -> EngineResult<Self> {
        let limits = DetectorLimits::from(&config.engine);
        let mut builder = Self::builder(config.clone()).detectors(default_detectors(limits));
        for agent in default_adapters(config)? {
            builder = builder.agent(agent);
        }
        builder.build()
    }

    pub fn builder(config: Config) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            registry: None,
            detectors: Vec::new(),
            agents: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Score one request.
    ///
    /// Only fails when the request is unusable: it has validation problems
    /// and no agent can run on what remains.
    pub async fn analyze(&self, request: &AnalysisRequest) -> EngineResult<CompositeResult> {
        let started = Instant::now();
        let deadline = started + self.config.global_deadline();

        let problems = request.validate();
        for problem in &problems {
            warn!("Ignoring invalid request field: {}", problem);
        }

        let applicable = self.registry.applicable_agents(request);
        let not_applicable: Vec<String> = self
            .registry
            .not_applicable(request)
            .iter()
            .map(|d| d.id.to_string())
            .collect();

        if applicable.is_empty() {
            if !problems.is_empty() {
                return Err(EngineError::InvalidRequest(problems.join("; ")));
            }
            info!("No applicable agents for request; returning insufficient-input result");
            return Ok(insufficient_input(&self.registry));
        }

        debug!(
            "Applicable agents: {}",
            applicable.iter().map(|d| d.id).collect::<Vec<_>>().join(", ")
        );

        let mut outcomes: HashMap<&'static str, AgentOutcome> =
            HashMap::with_capacity(applicable.len());
        let (core, external): (Vec<_>, Vec<_>) = applicable
            .into_iter()
            .partition(|d| d.kind == AgentKind::Core);

        let mut to_dial: Vec<Dialable> = Vec::new();
        for descriptor in external {
            match self.agents.get(descriptor.id) {
                Some(agent) => to_dial.push((descriptor.id, Arc::clone(agent))),
                None => {
                    debug!("No adapter registered for {}", descriptor.id);
                    outcomes.insert(descriptor.id, AgentOutcome::Abstained(AbstentionReason::Error));
                }
            }
        }

        if self.config.engine.preflight_health_checks && !to_dial.is_empty() {
            let cutoff = deadline.min(Instant::now() + self.config.health_timeout());
            to_dial = preflight(request, to_dial, cutoff, &mut outcomes).await;
        }

        // Fan out the remote calls first so they are in flight while the
        // detectors run inline.
        let cancel = CancellationToken::new();
        let shared = Arc::new(request.clone());
        let mut tasks = JoinSet::new();
        let mut outstanding: HashSet<&'static str> = HashSet::new();

        for (id, agent) in to_dial {
            let budget = self.config.agent_timeout(id);
            let request = Arc::clone(&shared);
            let cancel = cancel.child_token();
            outstanding.insert(id);
            tasks.spawn(async move {
                let outcome = invoke_external(agent.as_ref(), &request, budget, &cancel).await;
                (id, outcome)
            });
        }

        for descriptor in core {
            let outcome = match self.detectors.get(descriptor.id) {
                Some(detector) => run_detector(detector.as_ref(), request),
                None => {
                    debug!("No detector registered for {}", descriptor.id);
                    AgentOutcome::Abstained(AbstentionReason::Error)
                }
            };
            outcomes.insert(descriptor.id, outcome);
        }

        let mut deadline_hit = false;
        while !outstanding.is_empty() {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((id, outcome)))) => {
                    outstanding.remove(id);
                    outcomes.insert(id, outcome);
                }
                Ok(Some(Err(e))) => warn!("Agent task failed: {}", e),
                Ok(None) => break,
                Err(_) => {
                    let mut late: Vec<_> = outstanding.iter().copied().collect();
                    late.sort_unstable();
                    warn!(
                        "Global deadline of {}ms reached, cancelling: {}",
                        self.config.engine.global_deadline_ms,
                        late.join(", ")
                    );
                    cancel.cancel();
                    tasks.abort_all();
                    deadline_hit = true;
                    break;
                }
            }
        }

        let leftover_reason = if deadline_hit {
            AbstentionReason::Deadline
        } else {
            AbstentionReason::Error
        };
        for id in outstanding {
            outcomes.insert(id, AgentOutcome::Abstained(leftover_reason));
        }

        discard_invalid(&mut outcomes);

        for descriptor in self.registry.descriptors() {
            if let Some(AgentOutcome::Abstained(reason)) = outcomes.get(descriptor.id) {
                debug!("{} abstained: {}", descriptor.id, reason);
            }
        }

        let result = aggregate(&self.registry, &outcomes, not_applicable, &self.config.verdict);
        info!(
            "Composite score {:.1} ({}) from {} agent(s), {} missing, in {}ms",
            result.composite_score,
            result.verdict,
            result.answered_count(),
            result.missing_agents.len(),
            started.elapsed().as_millis()
        );
        Ok(result)
    }

    /// Probe every registered external agent concurrently, in registry order.
    pub async fn check_health(&self) -> Vec<AgentHealth> {
        let agents: Vec<_> = self
            .registry
            .descriptors()
            .iter()
            .filter_map(|d| self.agents.get(d.id).map(|a| (d.id, a)))
            .collect();
        let cutoff = Instant::now() + self.config.health_timeout();
        let checks = join_all(
            agents
                .iter()
                .map(|(_, agent)| bounded_health_check(Arc::as_ref(agent), cutoff)),
        )
        .await;
        agents
            .into_iter()
            .zip(checks)
            .map(|((id, _), endpoint_healthy)| AgentHealth {
                id,
                endpoint_healthy,
            })
            .collect()
    }
}

/// Builder for an [`Orchestrator`] with injected agents.
pub struct OrchestratorBuilder {
    config: Config,
    registry: Option<Registry>,
    detectors: Vec<Box<dyn Detector>>,
    agents: Vec<Arc<dyn ExternalAgent>>,
}

impl OrchestratorBuilder {
    /// Use an explicit registry instead of the one derived from the config.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Add a detector. A later detector with the same id replaces an earlier one.
    pub fn detector(mut self, detector: Box<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn detectors(mut self, detectors: Vec<Box<dyn Detector>>) -> Self {
        self.detectors.extend(detectors);
        self
    }

    /// Add an external agent. A later agent with the same id replaces an earlier one.
    pub fn agent(mut self, agent: Arc<dyn ExternalAgent>) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn build(self) -> EngineResult<Orchestrator> {
        self.config.validate()?;
        let registry = match self.registry {
            Some(registry) => {
                registry.validate()?;
                registry
            }
            None => Registry::from_config(&self.config.agents)?,
        };

        let mut detectors = HashMap::new();
        for detector in self.detectors {
            expect_kind(&registry, detector.id(), AgentKind::Core)?;
            detectors.insert(detector.id(), detector);
        }

        let mut agents = HashMap::new();
        for agent in self.agents {
            expect_kind(&registry, agent.id(), AgentKind::External)?;
            agents.insert(agent.id(), agent);
        }

        Ok(Orchestrator {
            registry: Arc::new(registry),
            detectors,
            agents,
            config: self.config,
        })
    }
}

fn expect_kind(registry: &Registry, id: &str, kind: AgentKind) -> EngineResult<()> {
    match registry.get(id) {
        Some(d) if d.kind == kind => Ok(()),
        Some(d) => Err(EngineError::Configuration(format!(
            "agent '{}' is registered as {:?}, not {:?}",
            id, d.kind, kind
        ))),
        None => Err(EngineError::Configuration(format!(
            "agent '{}' is not in the registry",
            id
        ))),
    }
}

/// Health check that counts as failed if it has not answered by `cutoff`.
async fn bounded_health_check(agent: &dyn ExternalAgent, cutoff: Instant) -> bool {
    match timeout_at(cutoff, agent.check_health()).await {
        Ok(healthy) => healthy,
        Err(_) => {
            debug!("{} health check timed out", agent.id());
            false
        }
    }
}

/// Drop agents whose health check fails or misses `cutoff`. Those with a fallback
/// answer from it.
async fn preflight(
    request: &AnalysisRequest,
    candidates: Vec<Dialable>,
    cutoff: Instant,
    outcomes: &mut HashMap<&'static str, AgentOutcome>,
) -> Vec<Dialable> {
    let health = join_all(
        candidates
            .iter()
            .map(|(_, agent)| bounded_health_check(Arc::as_ref(agent), cutoff)),
    )
    .await;
    let mut healthy = Vec::with_capacity(candidates.len());

    for ((id, agent), ok) in candidates.into_iter().zip(health) {
        if ok {
            healthy.push((id, agent));
            continue;
        }
        let outcome = match agent.fallback(request) {
            Some(result) => {
                info!("{} failed its health check, using local fallback", id);
                AgentOutcome::Answered(result)
            }
            None => {
                info!("{} failed its health check, skipping", id);
                AgentOutcome::Abstained(AbstentionReason::Unhealthy)
            }
        };
        outcomes.insert(id, outcome);
    }

    healthy
}

/// One external call under the orchestrator's own per-agent timeout.
async fn invoke_external(
    agent: &dyn ExternalAgent,
    request: &AnalysisRequest,
    budget: Duration,
    cancel: &CancellationToken,
) -> AgentOutcome {
    let call = AssertUnwindSafe(agent.analyze(request, budget.mul_f64(ADAPTER_BUDGET_SHARE), cancel))
        .catch_unwind();

    match timeout(budget, call).await {
        Ok(Ok(Some(result))) => AgentOutcome::Answered(result),
        Ok(Ok(None)) => AgentOutcome::Abstained(AbstentionReason::Error),
        Ok(Err(_)) => {
            error!("Adapter {} panicked", agent.id());
            AgentOutcome::Abstained(AbstentionReason::Panicked)
        }
        Err(_) => {
            cancel.cancel();
            AgentOutcome::Abstained(AbstentionReason::Timeout)
        }
    }
}

/// Run a detector inline, converting errors and panics into abstentions.
fn run_detector(detector: &dyn Detector, request: &AnalysisRequest) -> AgentOutcome {
    match catch_unwind(AssertUnwindSafe(|| detector.detect(request))) {
        Ok(Ok(result)) => AgentOutcome::Answered(result),
        Ok(Err(DetectorError::InsufficientSignal(why))) => {
            debug!("{} has no signal: {}", detector.id(), why);
            AgentOutcome::Abstained(AbstentionReason::InsufficientSignal)
        }
        Err(_) => {
            error!("Detector {} panicked", detector.id());
            AgentOutcome::Abstained(AbstentionReason::Panicked)
        }
    }
}

/// Replace answers that break the result invariants with abstentions.
fn discard_invalid(outcomes: &mut HashMap<&'static str, AgentOutcome>) {
    for (id, outcome) in outcomes.iter_mut() {
        let AgentOutcome::Answered(result) = outcome else {
            continue;
        };
        let problem = if result.agent_name != *id {
            Some(format!("result is labelled '{}'", result.agent_name))
        } else {
            result.validate().err()
        };
        if let Some(problem) = problem {
            warn!("Discarding result from {}: {}", id, problem);
            *outcome = AgentOutcome::Abstained(AbstentionReason::Invalid);
        }
    }
}
