//! Verdict engine - statistical reduction of observations
//!
//! Reduces the Success observations sharing a `(measurement, metric,
//! optional point)` key into a point estimate, a dispersion on the
//! standard-error scale, and a categorical outcome against a declared
//! acceptance criterion. Pure and reproducible: identical observation
//! sets and criterion always yield an identical verdict.

use serde::{Deserialize, Serialize};

use crate::measure::Measurement;
use crate::score::ScoreValue;
use crate::store::{Observation, ObservationFilter, ObservationStatus, ResultStore};
use crate::sweep::ParameterPoint;

/// Categorical outcome of a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Acceptance criterion met.
    Pass,
    /// Acceptance criterion not met.
    Fail,
    /// Not enough evidence to judge (zero successes, or below the
    /// criterion's minimum sample size).
    Inconclusive,
}

/// Which side of the threshold is acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Estimate must meet or exceed the threshold (error-like metrics
    /// declare `AtMost` instead).
    AtLeast,
    /// Estimate must not exceed the threshold.
    AtMost,
}

/// Declared acceptance rule for one metric.
///
/// Ties at exactly the threshold count as Pass (closed interval) unless
/// `open_boundary` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AcceptanceCriterion {
    /// Compare the mean of a numeric metric against a threshold.
    ThresholdOnMean {
        /// Acceptance threshold
        threshold: f64,
        /// Acceptable side
        direction: Direction,
        /// Exclude exact ties (open interval)
        #[serde(default)]
        open_boundary: bool,
    },
    /// Compare the truthy proportion of a boolean metric against a threshold.
    ThresholdOnProportion {
        /// Acceptance threshold
        threshold: f64,
        /// Acceptable side
        direction: Direction,
        /// Exclude exact ties (open interval)
        #[serde(default)]
        open_boundary: bool,
    },
    /// Pass when the confidence interval `estimate ± z · dispersion`
    /// excludes an undesired value.
    ConfidenceIntervalExcludes {
        /// The value the interval must exclude
        undesired: f64,
        /// Normal quantile used to widen the interval
        z: f64,
        /// Below this sample size the outcome is Inconclusive
        min_samples: u32,
    },
}

impl AcceptanceCriterion {
    /// `ThresholdOnMean` with the closed-boundary default.
    #[must_use]
    pub const fn mean(direction: Direction, threshold: f64) -> Self {
        Self::ThresholdOnMean {
            threshold,
            direction,
            open_boundary: false,
        }
    }

    /// `ThresholdOnProportion` with the closed-boundary default.
    #[must_use]
    pub const fn proportion(direction: Direction, threshold: f64) -> Self {
        Self::ThresholdOnProportion {
            threshold,
            direction,
            open_boundary: false,
        }
    }
}

/// Interval strategy for proportion dispersion.
///
/// The exact small-sample formula is deliberately configurable; both
/// strategies report on the standard-error scale so
/// `estimate ± z · dispersion` is the interval a criterion sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalMethod {
    /// Normal approximation: `sqrt(p(1-p)/n)`.
    #[default]
    NormalApprox,
    /// Wilson score interval half-width, rescaled by z.
    Wilson,
}

/// A statistically reduced judgment for one `(metric, optional point)`.
///
/// Derived and recomputable from the observation set it covers; the
/// observations, not the verdict, are the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Measurement name
    pub measurement: String,
    /// Parameter point, or `None` for the sweep-wide aggregate
    pub point: Option<ParameterPoint>,
    /// Metric name
    pub metric: String,
    /// Point estimate (mean or proportion); `None` with zero successes
    pub estimate: Option<f64>,
    /// Dispersion on the standard-error scale; `None` with zero successes
    pub dispersion: Option<f64>,
    /// Count of Success observations aggregated
    pub sample_size: u32,
    /// Categorical outcome
    pub outcome: Outcome,
    /// The acceptance rule that was applied
    pub criterion: AcceptanceCriterion,
}

/// Configuration for verdict computation.
#[derive(Debug, Clone, Copy)]
pub struct VerdictEngine {
    interval: IntervalMethod,
    /// z used to compute Wilson half-widths (not the criterion's z).
    wilson_z: f64,
}

impl Default for VerdictEngine {
    fn default() -> Self {
        Self {
            interval: IntervalMethod::NormalApprox,
            wilson_z: 1.96,
        }
    }
}

impl VerdictEngine {
    /// Engine with the default normal-approximation interval.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the proportion interval strategy.
    #[must_use]
    pub const fn interval_method(mut self, method: IntervalMethod) -> Self {
        self.interval = method;
        self
    }

    /// Sweep-wide verdicts: one per declared metric, in declaration order.
    #[must_use]
    pub fn judge(&self, store: &ResultStore, measurement: &Measurement) -> Vec<Verdict> {
        let rows = store.select(&ObservationFilter::new().measurement(measurement.name()));
        measurement
            .metrics()
            .map(|(metric, criterion)| {
                self.reduce(measurement.name(), None, metric, criterion, &rows)
            })
            .collect()
    }

    /// Per-point verdicts in sweep order: one per `(point, metric)`.
    #[must_use]
    pub fn judge_by_point(
        &self,
        store: &ResultStore,
        measurement: &Measurement,
        points: &[ParameterPoint],
    ) -> Vec<Verdict> {
        let mut verdicts = Vec::with_capacity(points.len() * measurement.metric_count());
        for point in points {
            let rows = store.select(
                &ObservationFilter::new()
                    .measurement(measurement.name())
                    .point_key(point.key()),
            );
            for (metric, criterion) in measurement.metrics() {
                verdicts.push(self.reduce(
                    measurement.name(),
                    Some(point.clone()),
                    metric,
                    criterion,
                    &rows,
                ));
            }
        }
        verdicts
    }

    /// Reduce one observation subset for one metric.
    fn reduce(
        &self,
        measurement: &str,
        point: Option<ParameterPoint>,
        metric: &str,
        criterion: &AcceptanceCriterion,
        rows: &[Observation],
    ) -> Verdict {
        // Success observations carrying a score for this metric, already
        // in deterministic key order from the store.
        let values: Vec<ScoreValue> = rows
            .iter()
            .filter(|o| o.status() == ObservationStatus::Success)
            .filter_map(|o| o.score(metric))
            .collect();

        #[allow(clippy::cast_possible_truncation)]
        let sample_size = values.len() as u32;
        if values.is_empty() {
            return Verdict {
                measurement: measurement.to_string(),
                point,
                metric: metric.to_string(),
                estimate: None,
                dispersion: None,
                sample_size: 0,
                outcome: Outcome::Inconclusive,
                criterion: criterion.clone(),
            };
        }

        let boolean_metric = values.iter().all(|v| v.is_boolean());
        let n = f64::from(sample_size);
        let estimate = values.iter().map(|v| v.as_f64()).sum::<f64>() / n;
        let dispersion = if boolean_metric {
            self.proportion_dispersion(estimate, n)
        } else {
            numeric_sem(&values, estimate, sample_size)
        };

        let outcome = apply_criterion(criterion, estimate, dispersion, sample_size);
        Verdict {
            measurement: measurement.to_string(),
            point,
            metric: metric.to_string(),
            estimate: Some(estimate),
            dispersion: Some(dispersion),
            sample_size,
            outcome,
            criterion: criterion.clone(),
        }
    }

    fn proportion_dispersion(&self, p: f64, n: f64) -> f64 {
        match self.interval {
            IntervalMethod::NormalApprox => (p * (1.0 - p) / n).sqrt(),
            IntervalMethod::Wilson => {
                let z = self.wilson_z;
                let z2 = z * z;
                let half_width =
                    z * ((p * (1.0 - p) / n) + z2 / (4.0 * n * n)).sqrt() / (1.0 + z2 / n);
                half_width / z
            }
        }
    }
}

/// Standard error of the mean over numeric scores: population variance
/// over the sample size, zero for fewer than two samples.
fn numeric_sem(values: &[ScoreValue], mean: f64, sample_size: u32) -> f64 {
    if sample_size < 2 {
        return 0.0;
    }
    let n = f64::from(sample_size);
    let variance = values
        .iter()
        .map(|v| {
            let d = v.as_f64() - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (variance / n).sqrt()
}

fn threshold_outcome(
    estimate: f64,
    threshold: f64,
    direction: Direction,
    open_boundary: bool,
) -> Outcome {
    let pass = match (direction, open_boundary) {
        (Direction::AtLeast, false) => estimate >= threshold,
        (Direction::AtLeast, true) => estimate > threshold,
        (Direction::AtMost, false) => estimate <= threshold,
        (Direction::AtMost, true) => estimate < threshold,
    };
    if pass {
        Outcome::Pass
    } else {
        Outcome::Fail
    }
}

fn apply_criterion(
    criterion: &AcceptanceCriterion,
    estimate: f64,
    dispersion: f64,
    sample_size: u32,
) -> Outcome {
    match criterion {
        AcceptanceCriterion::ThresholdOnMean {
            threshold,
            direction,
            open_boundary,
        }
        | AcceptanceCriterion::ThresholdOnProportion {
            threshold,
            direction,
            open_boundary,
        } => threshold_outcome(estimate, *threshold, *direction, *open_boundary),
        AcceptanceCriterion::ConfidenceIntervalExcludes {
            undesired,
            z,
            min_samples,
        } => {
            if sample_size < *min_samples {
                return Outcome::Inconclusive;
            }
            let lo = estimate - z * dispersion;
            let hi = estimate + z * dispersion;
            // A value sitting exactly on the interval edge is contained.
            if *undesired < lo || *undesired > hi {
                Outcome::Pass
            } else {
                Outcome::Fail
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Observation;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn success_obs(case: &str, repeat: u32, metric: &str, score: ScoreValue) -> Observation {
        let mut scores = BTreeMap::new();
        scores.insert(metric.to_string(), score);
        Observation::success(
            "m",
            case,
            ParameterPoint::empty(),
            repeat,
            json!(null),
            scores,
            BTreeMap::new(),
        )
    }

    fn engine() -> VerdictEngine {
        VerdictEngine::new()
    }

    fn criterion_p75() -> AcceptanceCriterion {
        AcceptanceCriterion::proportion(Direction::AtLeast, 0.75)
    }

    #[test]
    fn test_proportion_boundary_is_pass() {
        // 3 of 4 truthy: estimate exactly 0.75 against >= 0.75.
        let rows: Vec<Observation> = [true, true, true, false]
            .iter()
            .enumerate()
            .map(|(i, &b)| {
                #[allow(clippy::cast_possible_truncation)]
                let repeat = i as u32;
                success_obs("c", repeat, "accuracy", ScoreValue::Boolean(b))
            })
            .collect();
        let verdict = engine().reduce("m", None, "accuracy", &criterion_p75(), &rows);
        assert_eq!(verdict.estimate, Some(0.75));
        assert_eq!(verdict.sample_size, 4);
        assert_eq!(verdict.outcome, Outcome::Pass);
    }

    #[test]
    fn test_open_boundary_fails_exact_tie() {
        let criterion = AcceptanceCriterion::ThresholdOnProportion {
            threshold: 0.75,
            direction: Direction::AtLeast,
            open_boundary: true,
        };
        let rows: Vec<Observation> = [true, true, true, false]
            .iter()
            .enumerate()
            .map(|(i, &b)| {
                #[allow(clippy::cast_possible_truncation)]
                let repeat = i as u32;
                success_obs("c", repeat, "accuracy", ScoreValue::Boolean(b))
            })
            .collect();
        let verdict = engine().reduce("m", None, "accuracy", &criterion, &rows);
        assert_eq!(verdict.outcome, Outcome::Fail);
    }

    #[test]
    fn test_zero_successes_forced_inconclusive() {
        let rows = vec![Observation::adapter_failure(
            "m",
            "c",
            ParameterPoint::empty(),
            0,
            "connection refused",
        )];
        let verdict = engine().reduce("m", None, "accuracy", &criterion_p75(), &rows);
        assert_eq!(verdict.outcome, Outcome::Inconclusive);
        assert_eq!(verdict.sample_size, 0);
        assert_eq!(verdict.estimate, None);
        assert_eq!(verdict.dispersion, None);
    }

    #[test]
    fn test_numeric_mean_and_sem() {
        let scores = [1.0, 2.0, 3.0, 4.0];
        let rows: Vec<Observation> = scores
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                #[allow(clippy::cast_possible_truncation)]
                let repeat = i as u32;
                success_obs("c", repeat, "abs_error", ScoreValue::Numeric(v))
            })
            .collect();
        let criterion = AcceptanceCriterion::mean(Direction::AtMost, 2.5);
        let verdict = engine().reduce("m", None, "abs_error", &criterion, &rows);
        assert_eq!(verdict.estimate, Some(2.5));
        // Population variance 1.25, SEM = sqrt(1.25/4).
        let expected_sem = (1.25f64 / 4.0).sqrt();
        assert!((verdict.dispersion.unwrap() - expected_sem).abs() < 1e-12);
        // Tie at the threshold under AtMost: Pass (closed interval).
        assert_eq!(verdict.outcome, Outcome::Pass);
    }

    #[test]
    fn test_single_sample_zero_dispersion() {
        let rows = vec![success_obs("c", 0, "abs_error", ScoreValue::Numeric(3.0))];
        let criterion = AcceptanceCriterion::mean(Direction::AtMost, 5.0);
        let verdict = engine().reduce("m", None, "abs_error", &criterion, &rows);
        assert_eq!(verdict.dispersion, Some(0.0));
        assert_eq!(verdict.outcome, Outcome::Pass);
    }

    #[test]
    fn test_ci_excludes_pass_fail_and_inconclusive() {
        let criterion = AcceptanceCriterion::ConfidenceIntervalExcludes {
            undesired: 0.0,
            z: 2.0,
            min_samples: 3,
        };
        // Tight cluster far from zero: interval excludes it.
        let rows: Vec<Observation> = [10.0, 10.1, 9.9, 10.0]
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                #[allow(clippy::cast_possible_truncation)]
                let repeat = i as u32;
                success_obs("c", repeat, "skill", ScoreValue::Numeric(v))
            })
            .collect();
        let verdict = engine().reduce("m", None, "skill", &criterion, &rows);
        assert_eq!(verdict.outcome, Outcome::Pass);

        // Wide cluster straddling zero: interval contains it.
        let rows: Vec<Observation> = [-5.0, 5.0, -4.0, 4.0]
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                #[allow(clippy::cast_possible_truncation)]
                let repeat = i as u32;
                success_obs("c", repeat, "skill", ScoreValue::Numeric(v))
            })
            .collect();
        let verdict = engine().reduce("m", None, "skill", &criterion, &rows);
        assert_eq!(verdict.outcome, Outcome::Fail);

        // Below the minimum sample size: Inconclusive.
        let rows = vec![success_obs("c", 0, "skill", ScoreValue::Numeric(10.0))];
        let verdict = engine().reduce("m", None, "skill", &criterion, &rows);
        assert_eq!(verdict.outcome, Outcome::Inconclusive);
    }

    #[test]
    fn test_wilson_dispersion_narrower_than_normal_at_extremes() {
        let rows: Vec<Observation> = (0..10)
            .map(|i| success_obs("c", i, "accuracy", ScoreValue::Boolean(true)))
            .collect();
        let normal = engine().reduce("m", None, "accuracy", &criterion_p75(), &rows);
        let wilson = engine()
            .interval_method(IntervalMethod::Wilson)
            .reduce("m", None, "accuracy", &criterion_p75(), &rows);
        // p = 1.0: normal approximation collapses to zero width, Wilson does not.
        assert_eq!(normal.dispersion, Some(0.0));
        assert!(wilson.dispersion.unwrap() > 0.0);
    }

    #[test]
    fn test_reduction_is_idempotent() {
        let rows: Vec<Observation> = [0.4, 0.6, 0.5]
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                #[allow(clippy::cast_possible_truncation)]
                let repeat = i as u32;
                success_obs("c", repeat, "abs_error", ScoreValue::Numeric(v))
            })
            .collect();
        let criterion = AcceptanceCriterion::mean(Direction::AtMost, 1.0);
        let a = engine().reduce("m", None, "abs_error", &criterion, &rows);
        let b = engine().reduce("m", None, "abs_error", &criterion, &rows);
        assert_eq!(a, b);
        assert_eq!(a.estimate.map(f64::to_bits), b.estimate.map(f64::to_bits));
        assert_eq!(a.dispersion.map(f64::to_bits), b.dispersion.map(f64::to_bits));
    }
}
