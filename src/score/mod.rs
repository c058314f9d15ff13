//! Scoring functions and the metric registry
//!
//! A scoring function reduces one model output against its expected value
//! to a single [`ScoreValue`]. Functions are pure and stateless; the
//! registry is an explicit name-to-function map built once at
//! configuration time and passed into the executor by value - no global
//! mutable registry.

mod builtin;

pub use builtin::{absolute_error, exact_match, squared_error, within_tolerance};

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::dataset::Case;
use crate::sweep::ParameterPoint;

/// One metric score for one observation.
///
/// Numeric scores aggregate as means; boolean scores aggregate as
/// proportions. The verdict engine branches on the variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreValue {
    /// Continuous score (error, latency, log-likelihood)
    Numeric(f64),
    /// Binary score (correct / incorrect)
    Boolean(bool),
}

impl ScoreValue {
    /// Numeric view; booleans map to 1.0 / 0.0.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Numeric(v) => v,
            Self::Boolean(true) => 1.0,
            Self::Boolean(false) => 0.0,
        }
    }

    /// True for the boolean variant.
    #[must_use]
    pub const fn is_boolean(self) -> bool {
        matches!(self, Self::Boolean(_))
    }
}

impl fmt::Display for ScoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "{v}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Failure raised by a scoring function.
///
/// Recorded per metric on the observation as `ScoringFailure`; other
/// metrics for the same observation still run.
#[derive(Debug, Error)]
#[error("scoring failed: {0}")]
pub struct ScoringError(pub String);

impl ScoringError {
    /// Convenience constructor.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Read-only context handed to scoring functions alongside the payloads.
#[derive(Debug, Clone, Copy)]
pub struct ScoreContext<'a> {
    /// The case being scored.
    pub case: &'a Case,
    /// The parameter point the output was produced at.
    pub point: &'a ParameterPoint,
}

/// A pure scoring function: `(actual, expected, context) -> ScoreValue`.
pub type ScoreFn =
    Arc<dyn Fn(&Value, &Value, &ScoreContext<'_>) -> Result<ScoreValue, ScoringError> + Send + Sync>;

/// Explicit metric-name-to-function map.
///
/// Metric declaration order is significant: the first registered metric is
/// the "primary" metric whose running statistics feed the collection
/// policy.
#[derive(Clone, Default)]
pub struct ScoringRegistry {
    metrics: Vec<(String, ScoreFn)>,
}

impl fmt::Debug for ScoringRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoringRegistry")
            .field("metrics", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl ScoringRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a metric (builder-style). Re-registering a name replaces
    /// the function but keeps the original position.
    #[must_use]
    pub fn register<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value, &Value, &ScoreContext<'_>) -> Result<ScoreValue, ScoringError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        let func: ScoreFn = Arc::new(func);
        if let Some(slot) = self.metrics.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = func;
        } else {
            self.metrics.push((name, func));
        }
        self
    }

    /// Look up a metric function by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ScoreFn> {
        self.metrics.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// Metric names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.metrics.iter().map(|(n, _)| n.as_str())
    }

    /// Number of registered metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// True if no metrics are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}
