//! Observation records and the append-only result store
//!
//! The store is the single mutable shared structure of a run. Writers
//! append under the map's internal sharded locking; logical keys are
//! unique per writer by construction, so a duplicate key is an integrity
//! fault, not a race.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::score::ScoreValue;
use crate::sweep::ParameterPoint;

/// Terminal status of one recorded invocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservationStatus {
    /// Adapter succeeded and at least one declared metric scored.
    Success,
    /// Adapter invocation failed (includes timeouts); nothing was scored.
    AdapterFailure,
    /// Adapter succeeded but every declared metric failed to score.
    ScoringFailure,
}

/// Ledger key: `(measurement, case, parameter point, repeat)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObservationKey {
    /// Measurement name
    pub measurement: String,
    /// Case id within the dataset
    pub case_id: String,
    /// Canonical parameter-point key ([`ParameterPoint::key`])
    pub point_key: String,
    /// Repeat index, dense from 0 per `(case, point)`
    pub repeat_index: u32,
}

impl fmt::Display for ObservationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}#{}",
            self.measurement, self.case_id, self.point_key, self.repeat_index
        )
    }
}

/// One recorded invocation attempt. Created exactly once by the executor,
/// immutable afterwards; the store owns it once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    measurement: String,
    case_id: String,
    point: ParameterPoint,
    repeat_index: u32,
    status: ObservationStatus,
    raw_output: Option<Value>,
    scores: BTreeMap<String, ScoreValue>,
    score_errors: BTreeMap<String, String>,
    error: Option<String>,
    timestamp: DateTime<Utc>,
}

impl Observation {
    /// Record a successful invocation. `scores` may be partial when some
    /// metrics failed; their failures go in `score_errors`. Status is
    /// `Success` while at least one score landed, `ScoringFailure` when
    /// every metric failed.
    #[must_use]
    pub fn success(
        measurement: impl Into<String>,
        case_id: impl Into<String>,
        point: ParameterPoint,
        repeat_index: u32,
        raw_output: Value,
        scores: BTreeMap<String, ScoreValue>,
        score_errors: BTreeMap<String, String>,
    ) -> Self {
        let status = if scores.is_empty() {
            ObservationStatus::ScoringFailure
        } else {
            ObservationStatus::Success
        };
        Self {
            measurement: measurement.into(),
            case_id: case_id.into(),
            point,
            repeat_index,
            status,
            raw_output: Some(raw_output),
            scores,
            score_errors,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Record a failed invocation (adapter error or timeout).
    #[must_use]
    pub fn adapter_failure(
        measurement: impl Into<String>,
        case_id: impl Into<String>,
        point: ParameterPoint,
        repeat_index: u32,
        error: impl Into<String>,
    ) -> Self {
        Self {
            measurement: measurement.into(),
            case_id: case_id.into(),
            point,
            repeat_index,
            status: ObservationStatus::AdapterFailure,
            raw_output: None,
            scores: BTreeMap::new(),
            score_errors: BTreeMap::new(),
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }

    /// The ledger key for this observation.
    #[must_use]
    pub fn key(&self) -> ObservationKey {
        ObservationKey {
            measurement: self.measurement.clone(),
            case_id: self.case_id.clone(),
            point_key: self.point.key(),
            repeat_index: self.repeat_index,
        }
    }

    /// Measurement name.
    #[must_use]
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// Case id.
    #[must_use]
    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    /// Parameter point.
    #[must_use]
    pub const fn point(&self) -> &ParameterPoint {
        &self.point
    }

    /// Repeat index within its `(case, point)` unit.
    #[must_use]
    pub const fn repeat_index(&self) -> u32 {
        self.repeat_index
    }

    /// Terminal status.
    #[must_use]
    pub const fn status(&self) -> ObservationStatus {
        self.status
    }

    /// Raw model output, absent on adapter failure.
    #[must_use]
    pub const fn raw_output(&self) -> Option<&Value> {
        self.raw_output.as_ref()
    }

    /// Scores by metric name (partial when some metrics failed).
    #[must_use]
    pub const fn scores(&self) -> &BTreeMap<String, ScoreValue> {
        &self.scores
    }

    /// One score by metric name.
    #[must_use]
    pub fn score(&self, metric: &str) -> Option<ScoreValue> {
        self.scores.get(metric).copied()
    }

    /// Per-metric scoring failures.
    #[must_use]
    pub const fn score_errors(&self) -> &BTreeMap<String, String> {
        &self.score_errors
    }

    /// Failure detail for `AdapterFailure` observations.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Wall-clock recording time. Informational only; never enters
    /// verdict math.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Key-subset filter for ledger iteration.
///
/// # Example
///
/// ```rust
/// use veredicto::store::ObservationFilter;
///
/// let filter = ObservationFilter::new()
///     .measurement("accuracy-sweep")
///     .point_key("temperature=0.0");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ObservationFilter {
    measurement: Option<String>,
    case_id: Option<String>,
    point_key: Option<String>,
    repeat_index: Option<u32>,
}

impl ObservationFilter {
    /// Match everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one measurement.
    #[must_use]
    pub fn measurement(mut self, name: impl Into<String>) -> Self {
        self.measurement = Some(name.into());
        self
    }

    /// Restrict to one case.
    #[must_use]
    pub fn case_id(mut self, id: impl Into<String>) -> Self {
        self.case_id = Some(id.into());
        self
    }

    /// Restrict to one parameter point by canonical key.
    #[must_use]
    pub fn point_key(mut self, key: impl Into<String>) -> Self {
        self.point_key = Some(key.into());
        self
    }

    /// Restrict to one repeat index.
    #[must_use]
    pub const fn repeat_index(mut self, index: u32) -> Self {
        self.repeat_index = Some(index);
        self
    }

    fn matches(&self, key: &ObservationKey) -> bool {
        self.measurement.as_ref().map_or(true, |m| *m == key.measurement)
            && self.case_id.as_ref().map_or(true, |c| *c == key.case_id)
            && self.point_key.as_ref().map_or(true, |p| *p == key.point_key)
            && self.repeat_index.map_or(true, |r| r == key.repeat_index)
    }
}

/// Append-only observation ledger.
///
/// Concurrent writers append through a sharded concurrent map; an
/// observation is recorded atomically or not at all. Existing keys are
/// never overwritten.
#[derive(Debug, Default)]
pub struct ResultStore {
    index: DashMap<ObservationKey, Observation>,
}

impl ResultStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one observation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateObservation`] if the key is already
    /// present; the store is left unchanged.
    pub fn record(&self, observation: Observation) -> Result<()> {
        let key = observation.key();
        match self.index.entry(key) {
            Entry::Occupied(occupied) => {
                Err(Error::DuplicateObservation(occupied.key().to_string()))
            }
            Entry::Vacant(vacant) => {
                vacant.insert(observation);
                Ok(())
            }
        }
    }

    /// Number of recorded observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Owned snapshot of every observation, ordered by key.
    ///
    /// Repeat order within a `(case, point)` unit follows `repeat_index`
    /// (authoritative), not insertion time.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Observation> {
        self.select(&ObservationFilter::new())
    }

    /// Owned snapshot of observations matching `filter`, ordered by key.
    #[must_use]
    pub fn select(&self, filter: &ObservationFilter) -> Vec<Observation> {
        let mut rows: Vec<Observation> = self
            .index
            .iter()
            .filter(|entry| filter.matches(entry.key()))
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(Observation::key);
        rows
    }

    /// Count observations with `Success` status matching `filter`.
    #[must_use]
    pub fn success_count(&self, filter: &ObservationFilter) -> usize {
        self.index
            .iter()
            .filter(|entry| {
                filter.matches(entry.key()) && entry.value().status() == ObservationStatus::Success
            })
            .count()
    }
}
