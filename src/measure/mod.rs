//! Measurement definitions and execution
//!
//! A measurement binds a name, one or more metrics with acceptance
//! criteria, a parameter sweep, and a collection policy. The executor in
//! this module drives it against a dataset through an adapter.

mod executor;
mod policy;

pub use executor::{
    CancelHandle, Executor, ExecutorConfig, PointRecord, PointStatus, RunHealth, RunSummary,
};
pub use policy::{CollectionPolicy, EarlyStopRule, RunningStats, SemBelow};

use crate::error::{Error, Result};
use crate::sweep::SweepDefinition;
use crate::verdict::AcceptanceCriterion;

/// A named, parameterized evaluation procedure.
///
/// # Example
///
/// ```rust
/// use veredicto::measure::{CollectionPolicy, Measurement};
/// use veredicto::sweep::SweepDefinition;
/// use veredicto::verdict::{AcceptanceCriterion, Direction};
///
/// let measurement = Measurement::builder("temperature-robustness")
///     .metric("accuracy", AcceptanceCriterion::proportion(Direction::AtLeast, 0.75))
///     .sweep(SweepDefinition::new().axis("temperature", [0.0.into(), 1.0.into()]))
///     .policy(CollectionPolicy::repeats(2, 2))
///     .build()?;
/// assert_eq!(measurement.primary_metric(), "accuracy");
/// # Ok::<(), veredicto::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Measurement {
    name: String,
    metrics: Vec<(String, AcceptanceCriterion)>,
    sweep: SweepDefinition,
    policy: CollectionPolicy,
}

impl Measurement {
    /// Start building a measurement.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> MeasurementBuilder {
        MeasurementBuilder {
            name: name.into(),
            metrics: Vec::new(),
            sweep: SweepDefinition::new(),
            policy: CollectionPolicy::default(),
        }
    }

    /// Measurement name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared metrics with their criteria, in declaration order.
    pub fn metrics(&self) -> impl Iterator<Item = (&str, &AcceptanceCriterion)> {
        self.metrics.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// Number of declared metrics.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    /// The first declared metric; its running statistics feed the
    /// collection policy.
    #[must_use]
    pub fn primary_metric(&self) -> &str {
        &self.metrics[0].0
    }

    /// The acceptance criterion declared for a metric.
    #[must_use]
    pub fn criterion(&self, metric: &str) -> Option<&AcceptanceCriterion> {
        self.metrics.iter().find(|(n, _)| n == metric).map(|(_, c)| c)
    }

    /// The parameter sweep.
    #[must_use]
    pub const fn sweep(&self) -> &SweepDefinition {
        &self.sweep
    }

    /// The collection policy.
    #[must_use]
    pub const fn policy(&self) -> &CollectionPolicy {
        &self.policy
    }
}

/// Builder for [`Measurement`].
#[derive(Debug)]
pub struct MeasurementBuilder {
    name: String,
    metrics: Vec<(String, AcceptanceCriterion)>,
    sweep: SweepDefinition,
    policy: CollectionPolicy,
}

impl MeasurementBuilder {
    /// Declare a metric with its acceptance criterion. Declaration order
    /// is significant: the first metric is primary.
    #[must_use]
    pub fn metric(mut self, name: impl Into<String>, criterion: AcceptanceCriterion) -> Self {
        self.metrics.push((name.into(), criterion));
        self
    }

    /// Set the parameter sweep (default: the single empty point).
    #[must_use]
    pub fn sweep(mut self, sweep: SweepDefinition) -> Self {
        self.sweep = sweep;
        self
    }

    /// Set the collection policy (default: one repeat, never abandon).
    #[must_use]
    pub fn policy(mut self, policy: CollectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMeasurement`] for an empty name, no
    /// metrics, or a duplicate metric; sweep and policy validation errors
    /// propagate.
    pub fn build(self) -> Result<Measurement> {
        if self.name.is_empty() {
            return Err(Error::InvalidMeasurement("measurement name is empty".into()));
        }
        if self.metrics.is_empty() {
            return Err(Error::InvalidMeasurement(format!(
                "measurement '{}' declares no metrics",
                self.name
            )));
        }
        for (i, (name, _)) in self.metrics.iter().enumerate() {
            if self.metrics[..i].iter().any(|(n, _)| n == name) {
                return Err(Error::InvalidMeasurement(format!(
                    "metric '{name}' declared twice in measurement '{}'",
                    self.name
                )));
            }
        }
        self.sweep.validate()?;
        self.policy.validate()?;
        Ok(Measurement {
            name: self.name,
            metrics: self.metrics,
            sweep: self.sweep,
            policy: self.policy,
        })
    }
}
