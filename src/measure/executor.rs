//! Measurement executor
//!
//! Drives (parameter point x case x repeat) against an adapter. Units for
//! distinct `(case, point)` pairs run as concurrent tasks behind a
//! semaphore; repeats inside a unit are strictly sequential so the
//! collection policy always decides on completed results. Adapter and
//! scoring failures are converted to observation status at the recording
//! boundary and never abort the sweep.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::adapter::{Adapter, AdapterError};
use crate::dataset::{Case, Dataset};
use crate::error::{Error, Result};
use crate::score::{ScoreContext, ScoreValue, ScoringRegistry};
use crate::store::{Observation, ObservationStatus, ResultStore};
use crate::sweep::ParameterPoint;

use super::{CollectionPolicy, Measurement, RunningStats};

/// Executor tuning knobs.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Upper bound on one adapter invocation; a timeout is recorded as
    /// `AdapterFailure`.
    pub invoke_timeout: Duration,
    /// Maximum `(case, point)` units in flight at once.
    pub concurrency: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            invoke_timeout: Duration::from_secs(60),
            concurrency: 8,
        }
    }
}

/// Cooperative cancellation handle for an in-flight run.
///
/// Units check it between repeats; an in-flight invocation is allowed to
/// finish or is abandoned, but no partially-written observation ever
/// becomes visible.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// New, un-cancelled handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// True once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Terminal status of one parameter point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointStatus {
    /// All scheduled units ran to their policy-decided end.
    Completed,
    /// The failure fraction exceeded the policy tolerance; remaining
    /// planned repeats were skipped.
    Abandoned,
    /// The run was cancelled before this point completed.
    Cancelled,
}

/// Terminal record for one parameter point of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    /// The parameter point
    pub point: ParameterPoint,
    /// Terminal status
    pub status: PointStatus,
    /// Invocation attempts made at this point
    pub attempts: u32,
    /// Adapter failures (incl. timeouts) at this point
    pub adapter_failures: u32,
}

/// Overall health of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunHealth {
    /// Every attempt succeeded and every point completed.
    Complete,
    /// Some failures, abandonment, or cancellation; evidence was still
    /// collected.
    Degraded,
    /// Not a single successful observation. Verdicts will all be
    /// Inconclusive; absence of evidence stays visible.
    Abandoned,
}

/// Lifecycle record of one executor run, consumed by reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Measurement name
    pub measurement: String,
    /// Adapter identity string
    pub adapter: String,
    /// Run start time
    pub started_at: DateTime<Utc>,
    /// Run end time
    pub ended_at: DateTime<Utc>,
    /// Terminal record per parameter point, in sweep order
    pub points: Vec<PointRecord>,
    /// Total invocation attempts
    pub attempts: u32,
    /// Observations recorded with `Success` status
    pub successes: u32,
    /// Overall run health
    pub health: RunHealth,
}

#[derive(Debug, Default)]
struct PointState {
    attempts: AtomicU32,
    failures: AtomicU32,
    completed_units: AtomicU32,
    abandoned: AtomicBool,
}

#[derive(Debug, Default, Clone, Copy)]
struct UnitTally {
    attempts: u32,
    successes: u32,
}

struct SharedCtx {
    adapter: Arc<dyn Adapter>,
    registry: ScoringRegistry,
    measurement: String,
    metric_names: Vec<String>,
    primary_metric: String,
    policy: CollectionPolicy,
    store: Arc<ResultStore>,
    cancel: CancelHandle,
    invoke_timeout: Duration,
    semaphore: Arc<Semaphore>,
}

/// Drives measurements against a dataset through one adapter.
pub struct Executor {
    adapter: Arc<dyn Adapter>,
    registry: ScoringRegistry,
    config: ExecutorConfig,
}

impl Executor {
    /// Create an executor with the default configuration.
    #[must_use]
    pub fn new(adapter: Arc<dyn Adapter>, registry: ScoringRegistry) -> Self {
        Self {
            adapter,
            registry,
            config: ExecutorConfig::default(),
        }
    }

    /// Override the configuration (builder-style).
    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Run a measurement to completion.
    ///
    /// # Errors
    ///
    /// Fatal conditions only: invalid measurement/sweep configuration,
    /// a duplicate observation key (integrity fault), a panicked worker,
    /// or every parameter point abandoned by the policy. Per-observation
    /// adapter and scoring failures are recorded, not raised.
    pub async fn run(
        &self,
        measurement: &Measurement,
        dataset: &Dataset,
        store: &Arc<ResultStore>,
    ) -> Result<RunSummary> {
        self.run_with_cancel(measurement, dataset, store, &CancelHandle::new())
            .await
    }

    /// Run a measurement with a caller-held cancellation handle.
    ///
    /// # Errors
    ///
    /// See [`Executor::run`].
    pub async fn run_with_cancel(
        &self,
        measurement: &Measurement,
        dataset: &Dataset,
        store: &Arc<ResultStore>,
        cancel: &CancelHandle,
    ) -> Result<RunSummary> {
        for (metric, _) in measurement.metrics() {
            if self.registry.get(metric).is_none() {
                return Err(Error::InvalidMeasurement(format!(
                    "metric '{metric}' is not registered"
                )));
            }
        }
        let points = measurement.sweep().points()?;
        let started_at = Utc::now();
        info!(
            measurement = measurement.name(),
            adapter = %self.adapter.identity(),
            points = points.len(),
            cases = dataset.len(),
            "starting measurement run"
        );

        let shared = Arc::new(SharedCtx {
            adapter: Arc::clone(&self.adapter),
            registry: self.registry.clone(),
            measurement: measurement.name().to_string(),
            metric_names: measurement.metrics().map(|(n, _)| n.to_string()).collect(),
            primary_metric: measurement.primary_metric().to_string(),
            policy: measurement.policy().clone(),
            store: Arc::clone(store),
            cancel: cancel.clone(),
            invoke_timeout: self.config.invoke_timeout,
            semaphore: Arc::new(Semaphore::new(self.config.concurrency.max(1))),
        });

        let point_states: Vec<Arc<PointState>> =
            points.iter().map(|_| Arc::new(PointState::default())).collect();

        let mut units: JoinSet<Result<UnitTally>> = JoinSet::new();
        for (point, state) in points.iter().zip(&point_states) {
            for case in dataset.cases() {
                units.spawn(run_unit(
                    Arc::clone(&shared),
                    case.clone(),
                    point.clone(),
                    Arc::clone(state),
                ));
            }
        }

        let mut attempts: u32 = 0;
        let mut successes: u32 = 0;
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(Ok(tally)) => {
                    attempts += tally.attempts;
                    successes += tally.successes;
                }
                Ok(Err(err)) => {
                    units.abort_all();
                    return Err(err);
                }
                Err(join_err) => {
                    units.abort_all();
                    return Err(Error::TaskFailed(join_err.to_string()));
                }
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let units_per_point = dataset.len() as u32;
        let mut abandoned = 0usize;
        let point_records: Vec<PointRecord> = points
            .iter()
            .zip(&point_states)
            .map(|(point, state)| {
                // Completion is per point: a point whose every unit ran to
                // its policy-decided end stays Completed even when the run
                // was cancelled afterwards.
                let status = if state.abandoned.load(Ordering::Acquire) {
                    abandoned += 1;
                    PointStatus::Abandoned
                } else if state.completed_units.load(Ordering::Acquire) == units_per_point {
                    PointStatus::Completed
                } else {
                    PointStatus::Cancelled
                };
                PointRecord {
                    point: point.clone(),
                    status,
                    attempts: state.attempts.load(Ordering::Acquire),
                    adapter_failures: state.failures.load(Ordering::Acquire),
                }
            })
            .collect();

        if abandoned == point_records.len() {
            return Err(Error::SweepAbandoned { points: abandoned });
        }

        let health = if successes == 0 {
            RunHealth::Abandoned
        } else if abandoned > 0 || successes < attempts || cancel.is_cancelled() {
            RunHealth::Degraded
        } else {
            RunHealth::Complete
        };
        info!(
            measurement = measurement.name(),
            attempts,
            successes,
            abandoned_points = abandoned,
            health = ?health,
            "measurement run finished"
        );

        Ok(RunSummary {
            measurement: measurement.name().to_string(),
            adapter: self.adapter.identity(),
            started_at,
            ended_at: Utc::now(),
            points: point_records,
            attempts,
            successes,
            health,
        })
    }
}

/// One `(case, point)` unit: sequential repeats under the policy.
async fn run_unit(
    shared: Arc<SharedCtx>,
    case: Case,
    point: ParameterPoint,
    point_state: Arc<PointState>,
) -> Result<UnitTally> {
    let _permit = shared
        .semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| Error::TaskFailed("executor semaphore closed".into()))?;

    let mut stats = RunningStats::new();
    let mut tally = UnitTally::default();
    let mut repeat: u32 = 0;
    let mut finished = false;
    loop {
        if point_state.abandoned.load(Ordering::Acquire) {
            break;
        }
        // Policy before cancellation: a unit whose repeats are already
        // done has finished, whenever cancel was requested.
        if !shared.policy.should_continue(&stats, repeat) {
            finished = true;
            break;
        }
        if shared.cancel.is_cancelled() {
            break;
        }

        let invocation = invoke_with_timeout(&shared, &case, &point).await;
        tally.attempts += 1;
        point_state.attempts.fetch_add(1, Ordering::AcqRel);

        let observation = match invocation {
            Ok(output) => {
                let (scores, score_errors) = score_output(&shared, &case, &point, &output);
                let primary = scores
                    .get(&shared.primary_metric)
                    .copied()
                    .map(ScoreValue::as_f64);
                stats.record_success(primary);
                Observation::success(
                    &shared.measurement,
                    case.id(),
                    point.clone(),
                    repeat,
                    output,
                    scores,
                    score_errors,
                )
            }
            Err(err) => {
                point_state.failures.fetch_add(1, Ordering::AcqRel);
                stats.record_failure();
                Observation::adapter_failure(
                    &shared.measurement,
                    case.id(),
                    point.clone(),
                    repeat,
                    err.to_string(),
                )
            }
        };
        if observation.status() == ObservationStatus::Success {
            tally.successes += 1;
        }
        debug!(
            case = case.id(),
            point = %point,
            repeat,
            status = ?observation.status(),
            "recorded observation"
        );
        shared.store.record(observation)?;
        repeat += 1;

        let failures = point_state.failures.load(Ordering::Acquire);
        let point_attempts = point_state.attempts.load(Ordering::Acquire);
        if shared.policy.should_abandon(failures, point_attempts) {
            if !point_state.abandoned.swap(true, Ordering::AcqRel) {
                warn!(
                    point = %point,
                    failures,
                    attempts = point_attempts,
                    "parameter point abandoned"
                );
            }
            break;
        }
    }
    if finished {
        point_state.completed_units.fetch_add(1, Ordering::AcqRel);
    }
    Ok(tally)
}

/// Invoke the adapter on a blocking worker, bounded by the configured
/// timeout. On timeout the invocation is abandoned and its eventual
/// result discarded.
async fn invoke_with_timeout(
    shared: &SharedCtx,
    case: &Case,
    point: &ParameterPoint,
) -> std::result::Result<Value, AdapterError> {
    let adapter = Arc::clone(&shared.adapter);
    let input = case.input().clone();
    let owned_point = point.clone();
    let handle = tokio::task::spawn_blocking(move || adapter.invoke(&input, &owned_point));
    match tokio::time::timeout(shared.invoke_timeout, handle).await {
        Err(_elapsed) => {
            #[allow(clippy::cast_possible_truncation)]
            let ms = shared.invoke_timeout.as_millis() as u64;
            Err(AdapterError::Timeout(ms))
        }
        Ok(Err(join_err)) => Err(AdapterError::Failed(format!("adapter panicked: {join_err}"))),
        Ok(Ok(result)) => result,
    }
}

/// Apply every declared metric; failures are recorded per metric and do
/// not block the other metrics.
fn score_output(
    shared: &SharedCtx,
    case: &Case,
    point: &ParameterPoint,
    output: &Value,
) -> (BTreeMap<String, ScoreValue>, BTreeMap<String, String>) {
    let ctx = ScoreContext { case, point };
    let mut scores = BTreeMap::new();
    let mut errors = BTreeMap::new();
    for metric in &shared.metric_names {
        // Registration was checked before the run started.
        let Some(func) = shared.registry.get(metric) else {
            continue;
        };
        match func(output, case.expected(), &ctx) {
            Ok(value) => {
                scores.insert(metric.clone(), value);
            }
            Err(err) => {
                errors.insert(metric.clone(), err.to_string());
            }
        }
    }
    (scores, errors)
}
