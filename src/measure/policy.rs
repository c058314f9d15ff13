//! Collection policy - how many repeats to take and when to give up
//!
//! Pure policy math, no I/O. The executor consults the policy after every
//! completed repeat of a `(case, point)` unit, so decisions always see
//! finished results.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Running statistics for one `(case, point)` unit.
///
/// Carries attempt/failure counters plus a Welford accumulator over the
/// primary metric's scores, giving the policy mean, count, and dispersion
/// so far without storing samples.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    attempts: u32,
    adapter_failures: u32,
    samples: u32,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    /// Fresh accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful invocation; `primary_score` is the primary
    /// metric's numeric score if that metric produced one.
    pub fn record_success(&mut self, primary_score: Option<f64>) {
        self.attempts += 1;
        if let Some(value) = primary_score {
            self.samples += 1;
            let delta = value - self.mean;
            self.mean += delta / f64::from(self.samples);
            self.m2 += delta * (value - self.mean);
        }
    }

    /// Record a failed invocation (adapter failure or timeout).
    pub fn record_failure(&mut self) {
        self.attempts += 1;
        self.adapter_failures += 1;
    }

    /// Invocation attempts so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Adapter failures so far.
    #[must_use]
    pub const fn adapter_failures(&self) -> u32 {
        self.adapter_failures
    }

    /// Successful invocations so far.
    #[must_use]
    pub const fn successes(&self) -> u32 {
        self.attempts - self.adapter_failures
    }

    /// Number of primary-metric samples.
    #[must_use]
    pub const fn samples(&self) -> u32 {
        self.samples
    }

    /// Running mean of the primary metric.
    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance of the primary metric (0 for fewer than two samples).
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.samples < 2 {
            0.0
        } else {
            self.m2 / f64::from(self.samples)
        }
    }

    /// Standard error of the running mean (0 for fewer than two samples).
    #[must_use]
    pub fn sem(&self) -> f64 {
        if self.samples < 2 {
            0.0
        } else {
            (self.variance() / f64::from(self.samples)).sqrt()
        }
    }
}

/// Early-stop strategy consulted once `min_repeats` is reached.
pub trait EarlyStopRule: Send + Sync {
    /// True when the running statistics show sufficient precision.
    fn satisfied(&self, stats: &RunningStats) -> bool;
}

/// Stop once the running standard error drops to the target or below.
#[derive(Debug, Clone, Copy)]
pub struct SemBelow(pub f64);

impl EarlyStopRule for SemBelow {
    fn satisfied(&self, stats: &RunningStats) -> bool {
        stats.samples() >= 2 && stats.sem() <= self.0
    }
}

/// Repeat and abandonment policy for one measurement.
///
/// Defaults: one repeat per `(case, point)`, no early stop, and
/// `failure_tolerance = 1.0` (never abandon a point), so total adapter
/// failure yields Inconclusive verdicts rather than a fault.
#[derive(Clone)]
pub struct CollectionPolicy {
    min_repeats: u32,
    max_repeats: u32,
    failure_tolerance: f64,
    early_stop: Option<Arc<dyn EarlyStopRule>>,
}

impl fmt::Debug for CollectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionPolicy")
            .field("min_repeats", &self.min_repeats)
            .field("max_repeats", &self.max_repeats)
            .field("failure_tolerance", &self.failure_tolerance)
            .field("early_stop", &self.early_stop.is_some())
            .finish()
    }
}

impl Default for CollectionPolicy {
    fn default() -> Self {
        Self {
            min_repeats: 1,
            max_repeats: 1,
            failure_tolerance: 1.0,
            early_stop: None,
        }
    }
}

impl CollectionPolicy {
    /// Policy with a fixed repeat window and the default tolerance.
    #[must_use]
    pub fn repeats(min_repeats: u32, max_repeats: u32) -> Self {
        Self {
            min_repeats,
            max_repeats,
            ..Self::default()
        }
    }

    /// Set the maximum tolerated `AdapterFailure` fraction per point;
    /// exceeding it abandons the point.
    #[must_use]
    pub const fn failure_tolerance(mut self, tolerance: f64) -> Self {
        self.failure_tolerance = tolerance;
        self
    }

    /// Install an early-stop rule.
    #[must_use]
    pub fn early_stop(mut self, rule: impl EarlyStopRule + 'static) -> Self {
        self.early_stop = Some(Arc::new(rule));
        self
    }

    /// Minimum repeats per `(case, point)`.
    #[must_use]
    pub const fn min_repeats(&self) -> u32 {
        self.min_repeats
    }

    /// Maximum repeats per `(case, point)`.
    #[must_use]
    pub const fn max_repeats(&self) -> u32 {
        self.max_repeats
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMeasurement`] for a zero or inverted repeat
    /// window or a tolerance outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.min_repeats == 0 {
            return Err(Error::InvalidMeasurement("min_repeats must be at least 1".into()));
        }
        if self.max_repeats < self.min_repeats {
            return Err(Error::InvalidMeasurement(format!(
                "max_repeats ({}) below min_repeats ({})",
                self.max_repeats, self.min_repeats
            )));
        }
        if !(0.0..=1.0).contains(&self.failure_tolerance) {
            return Err(Error::InvalidMeasurement(format!(
                "failure_tolerance {} outside [0, 1]",
                self.failure_tolerance
            )));
        }
        Ok(())
    }

    /// Decide whether to take another repeat for this unit.
    ///
    /// Continues until `min_repeats`, then while below `max_repeats` and
    /// the early-stop rule (if any) has not signaled sufficient precision.
    #[must_use]
    pub fn should_continue(&self, stats: &RunningStats, repeats_so_far: u32) -> bool {
        if repeats_so_far < self.min_repeats {
            return true;
        }
        if repeats_so_far >= self.max_repeats {
            return false;
        }
        match &self.early_stop {
            Some(rule) => !rule.satisfied(stats),
            None => true,
        }
    }

    /// Decide whether a point's failure fraction exceeds the tolerance.
    #[must_use]
    pub fn should_abandon(&self, failure_count: u32, attempts: u32) -> bool {
        if attempts == 0 {
            return false;
        }
        f64::from(failure_count) / f64::from(attempts) > self.failure_tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welford_matches_direct_computation() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut stats = RunningStats::new();
        for v in values {
            stats.record_success(Some(v));
        }
        assert!((stats.mean() - 5.0).abs() < 1e-12);
        assert!((stats.variance() - 4.0).abs() < 1e-12);
        assert!((stats.sem() - (4.0f64 / 8.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_dispersion_zero_below_two_samples() {
        let mut stats = RunningStats::new();
        stats.record_success(Some(3.0));
        assert_eq!(stats.variance(), 0.0);
        assert_eq!(stats.sem(), 0.0);
    }

    #[test]
    fn test_continue_until_min_then_stop_at_max() {
        let policy = CollectionPolicy::repeats(2, 4);
        let stats = RunningStats::new();
        assert!(policy.should_continue(&stats, 0));
        assert!(policy.should_continue(&stats, 1));
        assert!(policy.should_continue(&stats, 2));
        assert!(policy.should_continue(&stats, 3));
        assert!(!policy.should_continue(&stats, 4));
    }

    #[test]
    fn test_early_stop_after_min_repeats() {
        let policy = CollectionPolicy::repeats(2, 100).early_stop(SemBelow(10.0));
        let mut stats = RunningStats::new();
        stats.record_success(Some(1.0));
        // Below min: rule not consulted even though SEM is 0.
        assert!(policy.should_continue(&stats, 1));
        stats.record_success(Some(1.1));
        assert!(!policy.should_continue(&stats, 2));
    }

    #[test]
    fn test_default_tolerance_never_abandons() {
        let policy = CollectionPolicy::default();
        assert!(!policy.should_abandon(10, 10));
    }

    #[test]
    fn test_abandon_strictly_above_tolerance() {
        let policy = CollectionPolicy::default().failure_tolerance(0.5);
        assert!(!policy.should_abandon(0, 0));
        assert!(!policy.should_abandon(1, 2)); // exactly at tolerance
        assert!(policy.should_abandon(2, 3));
    }

    #[test]
    fn test_validate_rejects_bad_windows() {
        assert!(CollectionPolicy::repeats(0, 1).validate().is_err());
        assert!(CollectionPolicy::repeats(3, 2).validate().is_err());
        assert!(CollectionPolicy::repeats(1, 1)
            .failure_tolerance(1.5)
            .validate()
            .is_err());
    }
}
