//! Snapshot export for the document builder
//!
//! A read-only, ordered view of one run: the lifecycle summary, every
//! recorded observation, and the computed verdict set. Row-oriented and
//! serde-serializable; the wire format is the consumer's concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::measure::RunSummary;
use crate::store::{Observation, ObservationFilter, ResultStore};
use crate::verdict::Verdict;

/// Frozen export of one measurement run.
///
/// Observations are ordered by ledger key, so repeats for a unit appear
/// densely in repeat order; verdicts keep engine order (sweep-wide per
/// metric first if the caller concatenates them that way).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// When the snapshot was taken
    pub generated_at: DateTime<Utc>,
    /// Run lifecycle record
    pub summary: RunSummary,
    /// Every observation of the measurement, in ledger-key order
    pub observations: Vec<Observation>,
    /// Computed verdicts
    pub verdicts: Vec<Verdict>,
}

impl RunSnapshot {
    /// Snapshot one measurement's run from the store.
    #[must_use]
    pub fn capture(store: &ResultStore, summary: RunSummary, verdicts: Vec<Verdict>) -> Self {
        let observations =
            store.select(&ObservationFilter::new().measurement(summary.measurement.clone()));
        Self {
            generated_at: Utc::now(),
            summary,
            observations,
            verdicts,
        }
    }
}
