//! Workflow orchestration: the supervisor state machine.
//!
//! The supervisor inspects the shared [`WorkflowState`] and routes to the next
//! stage based purely on which artifacts are present: no metrics bundle runs
//! the metrics stage, no insights report runs the insights stage, both present
//! terminates the run. An optional advisory planner may suggest the next stage
//! name, but every suggestion is validated against the static stage registry
//! and against the deterministic rule; an invalid suggestion falls back and is
//! never fatal.

use crate::data::DatasetCatalog;
use crate::insights::{InsightsAgent, InsightsReport};
use crate::metrics::assembler::{self, AssemblyError};
use crate::models::MetricsBundle;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const STAGE_METRICS: &str = "metrics";
pub const STAGE_INSIGHTS: &str = "insights";
pub const STAGE_HUMAN: &str = "human";

/// Upper bound on supervisor iterations; the deterministic transition rule
/// converges in three, so hitting this means a stage stopped producing its
/// artifact.
const MAX_ITERATIONS: usize = 16;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("workflow did not terminate within {0} iterations")]
    Livelock(usize),
}

/// Shared mutable state threaded through the workflow.
///
/// Created once per run; each stage contributes its output through a
/// [`StateUpdate`] merged by the controller.
#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    pub user_request: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub metrics_bundle: Option<MetricsBundle>,
    pub insights_report: Option<InsightsReport>,
}

impl WorkflowState {
    pub fn new(
        user_request: impl Into<String>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            user_request: user_request.into(),
            start_date,
            end_date,
            metrics_bundle: None,
            insights_report: None,
        }
    }
}

/// The fields a stage changed; the controller merges them into the state.
#[derive(Debug, Default)]
pub struct StateUpdate {
    pub metrics_bundle: Option<MetricsBundle>,
    pub insights_report: Option<InsightsReport>,
}

impl StateUpdate {
    fn apply(self, state: &mut WorkflowState) {
        if let Some(bundle) = self.metrics_bundle {
            state.metrics_bundle = Some(bundle);
        }
        if let Some(report) = self.insights_report {
            state.insights_report = Some(report);
        }
    }
}

/// Routing outcome of one supervisor visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Run(String),
    Done,
}

/// Statically-known stage registry: name -> description.
///
/// Populated at startup; every routing decision is validated against it, so
/// the workflow can never route to an unknown stage.
#[derive(Debug, Default)]
pub struct StageRegistry {
    stages: BTreeMap<String, String>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the three standard stages.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(
            STAGE_METRICS,
            "Computes ad performance metrics from raw data (no LLM needed)",
        );
        registry.register(
            STAGE_INSIGHTS,
            "Senior Ads Strategist: interprets metrics to produce insights and actions",
        );
        registry.register(STAGE_HUMAN, "Human-in-the-loop escalation placeholder");
        registry
    }

    pub fn register(&mut self, name: &str, description: &str) {
        self.stages.insert(name.to_string(), description.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.stages.keys().cloned().collect()
    }
}

/// Advisory routing strategy consulted before the deterministic rule.
///
/// A planner is a default-equivalent optimization only: its suggestion is
/// discarded unless it names a registered stage whose output is still useful.
pub trait RoutePlanner {
    fn suggest(&self, state: &WorkflowState) -> anyhow::Result<String>;
}

/// Pure deterministic transition function over the workflow state.
pub fn decide(state: &WorkflowState) -> Decision {
    if state.metrics_bundle.is_none() {
        Decision::Run(STAGE_METRICS.to_string())
    } else if state.insights_report.is_none() {
        Decision::Run(STAGE_INSIGHTS.to_string())
    } else {
        Decision::Done
    }
}

/// Whether routing to `stage` can still make progress from `state`.
fn suggestion_is_useful(state: &WorkflowState, stage: &str) -> bool {
    match stage {
        STAGE_METRICS => state.metrics_bundle.is_none(),
        STAGE_INSIGHTS => state.insights_report.is_none(),
        // A human detour is always allowed; it never resolves anything.
        _ => true,
    }
}

/// Routing decision for one supervisor visit: advisory planner first, with
/// the deterministic rule as the guaranteed fallback.
pub fn route(
    state: &WorkflowState,
    registry: &StageRegistry,
    planner: Option<&dyn RoutePlanner>,
) -> Decision {
    let fallback = decide(state);

    if fallback == Decision::Done {
        // Terminal state is never overridden.
        return fallback;
    }

    if let Some(planner) = planner {
        match planner.suggest(state) {
            Ok(name) if registry.contains(&name) && suggestion_is_useful(state, &name) => {
                debug!("[supervisor] advisory planner chose '{}'", name);
                return Decision::Run(name);
            }
            Ok(name) => {
                warn!(
                    "[supervisor] discarding advisory suggestion '{}' (unregistered or \
                     already satisfied); using deterministic rule",
                    name
                );
            }
            Err(err) => {
                warn!(
                    "[supervisor] advisory planner failed: {:#}; using deterministic rule",
                    err
                );
            }
        }
    }

    fallback
}

/// Owns the stage collaborators and drives the supervisor loop.
pub struct WorkflowRunner {
    catalog: DatasetCatalog,
    insights_agent: InsightsAgent,
    registry: StageRegistry,
    planner: Option<Box<dyn RoutePlanner>>,
    top_n: usize,
}

impl WorkflowRunner {
    pub fn new(catalog: DatasetCatalog, insights_agent: InsightsAgent, top_n: usize) -> Self {
        Self {
            catalog,
            insights_agent,
            registry: StageRegistry::standard(),
            planner: None,
            top_n,
        }
    }

    pub fn with_planner(mut self, planner: Box<dyn RoutePlanner>) -> Self {
        self.planner = Some(planner);
        self
    }

    /// Drive the workflow to termination and return the final state.
    pub async fn run(&mut self, mut state: WorkflowState) -> Result<WorkflowState, WorkflowError> {
        for _ in 0..MAX_ITERATIONS {
            let decision = route(&state, &self.registry, self.planner.as_deref());
            match decision {
                Decision::Done => {
                    info!("[supervisor] workflow complete");
                    return Ok(state);
                }
                Decision::Run(stage) => {
                    info!("[supervisor] routing to stage '{}'", stage);
                    let update = self.run_stage(&stage, &state).await?;
                    update.apply(&mut state);
                }
            }
        }

        Err(WorkflowError::Livelock(MAX_ITERATIONS))
    }

    async fn run_stage(&mut self, stage: &str, state: &WorkflowState) -> Result<StateUpdate, WorkflowError> {
        match stage {
            STAGE_METRICS => {
                let dataset_names = self.catalog.dataset_names();
                let bundle = assembler::assemble(
                    &mut self.catalog,
                    &dataset_names,
                    state.start_date,
                    state.end_date,
                    self.top_n,
                )?;
                Ok(StateUpdate {
                    metrics_bundle: Some(bundle),
                    ..Default::default()
                })
            }
            STAGE_INSIGHTS => {
                let Some(bundle) = state.metrics_bundle.as_ref() else {
                    warn!("[insights] no metrics bundle in state; skipping");
                    return Ok(StateUpdate::default());
                };
                let report = self.insights_agent.generate(bundle).await;
                Ok(StateUpdate {
                    insights_report: Some(report),
                    ..Default::default()
                })
            }
            STAGE_HUMAN => {
                info!("[human] human-in-the-loop requested; returning to supervisor");
                Ok(StateUpdate::default())
            }
            other => {
                // Registered but not dispatchable; contained like any other
                // routing error.
                warn!("[supervisor] stage '{}' has no entry point; skipping", other);
                Ok(StateUpdate::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::{fallback_report, InsightsConfig};

    fn state_with_bundle() -> WorkflowState {
        let mut state = WorkflowState::new("report please", None, None);
        state.metrics_bundle = Some(MetricsBundle::default());
        state
    }

    #[test]
    fn test_decision_sequence() {
        let mut state = WorkflowState::new("report please", None, None);
        assert_eq!(decide(&state), Decision::Run(STAGE_METRICS.to_string()));

        state.metrics_bundle = Some(MetricsBundle::default());
        assert_eq!(decide(&state), Decision::Run(STAGE_INSIGHTS.to_string()));

        state.insights_report = Some(fallback_report(state.metrics_bundle.as_ref().unwrap()));
        assert_eq!(decide(&state), Decision::Done);
    }

    #[test]
    fn test_decide_is_idempotent() {
        let state = state_with_bundle();
        assert_eq!(decide(&state), decide(&state));
    }

    #[test]
    fn test_done_is_absorbing() {
        let mut state = state_with_bundle();
        state.insights_report = Some(fallback_report(state.metrics_bundle.as_ref().unwrap()));
        for _ in 0..3 {
            assert_eq!(decide(&state), Decision::Done);
        }
    }

    struct FixedPlanner(anyhow::Result<&'static str>);

    impl RoutePlanner for FixedPlanner {
        fn suggest(&self, _state: &WorkflowState) -> anyhow::Result<String> {
            match &self.0 {
                Ok(name) => Ok(name.to_string()),
                Err(_) => Err(anyhow::anyhow!("planner unavailable")),
            }
        }
    }

    #[test]
    fn test_route_honors_valid_suggestion() {
        let registry = StageRegistry::standard();
        let state = state_with_bundle();
        let planner = FixedPlanner(Ok(STAGE_HUMAN));
        let decision = route(&state, &registry, Some(&planner));
        assert_eq!(decision, Decision::Run(STAGE_HUMAN.to_string()));
    }

    #[test]
    fn test_route_rejects_unregistered_stage() {
        let registry = StageRegistry::standard();
        let state = state_with_bundle();
        let planner = FixedPlanner(Ok("exfiltrate"));
        let decision = route(&state, &registry, Some(&planner));
        assert_eq!(decision, Decision::Run(STAGE_INSIGHTS.to_string()));
    }

    #[test]
    fn test_route_rejects_already_satisfied_stage() {
        let registry = StageRegistry::standard();
        let state = state_with_bundle();
        // Metrics already exist; re-running them cannot make progress.
        let planner = FixedPlanner(Ok(STAGE_METRICS));
        let decision = route(&state, &registry, Some(&planner));
        assert_eq!(decision, Decision::Run(STAGE_INSIGHTS.to_string()));
    }

    #[test]
    fn test_route_falls_back_on_planner_error() {
        let registry = StageRegistry::standard();
        let state = WorkflowState::new("x", None, None);
        let planner = FixedPlanner(Err(anyhow::anyhow!("boom")));
        let decision = route(&state, &registry, Some(&planner));
        assert_eq!(decision, Decision::Run(STAGE_METRICS.to_string()));
    }

    #[test]
    fn test_route_never_overrides_done() {
        let registry = StageRegistry::standard();
        let mut state = state_with_bundle();
        state.insights_report = Some(fallback_report(state.metrics_bundle.as_ref().unwrap()));
        let planner = FixedPlanner(Ok(STAGE_HUMAN));
        assert_eq!(route(&state, &registry, Some(&planner)), Decision::Done);
    }

    #[test]
    fn test_registry_registration() {
        let registry = StageRegistry::standard();
        assert!(registry.contains(STAGE_METRICS));
        assert!(!registry.contains("other"));
        assert_eq!(
            registry.stage_names(),
            vec![
                STAGE_HUMAN.to_string(),
                STAGE_INSIGHTS.to_string(),
                STAGE_METRICS.to_string()
            ]
        );
    }

    fn test_catalog(dir: &tempfile::TempDir) -> DatasetCatalog {
        std::fs::write(
            dir.path().join("sd.csv"),
            "Spend,Sales,Orders,Impressions,Clicks,Campaign ID,ASIN\n10,50,1,100,10,C1,B001\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("sb.csv"),
            "Spend,Sales,Orders,Impressions,Clicks,Customer Search Term\n2,4,1,50,2,shoes\n",
        )
        .unwrap();
        DatasetCatalog::standard(dir.path(), "sd.csv", "sb.csv")
    }

    #[tokio::test]
    async fn test_run_to_completion_in_mock_mode() {
        let dir = tempfile::tempdir().unwrap();
        let agent = InsightsAgent::new(InsightsConfig {
            mock_mode: true,
            ..Default::default()
        });
        let mut runner = WorkflowRunner::new(test_catalog(&dir), agent, 5);

        let final_state = runner
            .run(WorkflowState::new("monthly report", None, None))
            .await
            .unwrap();

        let bundle = final_state.metrics_bundle.unwrap();
        assert_eq!(bundle.account_summary.base.spend, 12.0);
        assert!(final_state.insights_report.is_some());
    }

    #[tokio::test]
    async fn test_reasoning_failure_still_reaches_done() {
        let dir = tempfile::tempdir().unwrap();
        // Unreachable endpoint: the insights stage must fall back, not fail.
        let agent = InsightsAgent::new(InsightsConfig {
            ollama_url: "http://127.0.0.1:1".to_string(),
            timeout_seconds: 1,
            ..Default::default()
        });
        let mut runner = WorkflowRunner::new(test_catalog(&dir), agent, 5);

        let final_state = runner
            .run(WorkflowState::new("monthly report", None, None))
            .await
            .unwrap();

        let report = final_state.insights_report.unwrap();
        assert!(report.natural_language_summary.contains("FALLBACK"));
    }

    #[tokio::test]
    async fn test_human_detour_returns_to_supervisor() {
        struct HumanOnce(std::cell::Cell<bool>);
        impl RoutePlanner for HumanOnce {
            fn suggest(&self, _state: &WorkflowState) -> anyhow::Result<String> {
                if self.0.replace(false) {
                    Ok(STAGE_HUMAN.to_string())
                } else {
                    Err(anyhow::anyhow!("no further advice"))
                }
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let agent = InsightsAgent::new(InsightsConfig {
            mock_mode: true,
            ..Default::default()
        });
        let mut runner = WorkflowRunner::new(test_catalog(&dir), agent, 5)
            .with_planner(Box::new(HumanOnce(std::cell::Cell::new(true))));

        let final_state = runner
            .run(WorkflowState::new("check with a human first", None, None))
            .await
            .unwrap();
        assert!(final_state.metrics_bundle.is_some());
        assert!(final_state.insights_report.is_some());
    }
}
