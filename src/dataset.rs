//! Case and Dataset - the labeled evaluation units a measurement runs over

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// One labeled evaluation unit: an opaque input, the expected answer, and
/// free-form tags for stratified reporting.
///
/// Immutable after dataset construction. The engine never inspects `input`
/// or `expected`; adapters and scoring functions own their interpretation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Case {
    id: String,
    input: Value,
    expected: Value,
    tags: BTreeSet<String>,
}

impl Case {
    /// Create a new case with no tags.
    #[must_use]
    pub fn new(id: impl Into<String>, input: Value, expected: Value) -> Self {
        Self {
            id: id.into(),
            input,
            expected,
            tags: BTreeSet::new(),
        }
    }

    /// Attach a tag (builder-style).
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Get the case id (unique within its dataset).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the opaque input payload.
    #[must_use]
    pub const fn input(&self) -> &Value {
        &self.input
    }

    /// Get the opaque expected payload.
    #[must_use]
    pub const fn expected(&self) -> &Value {
        &self.expected
    }

    /// Get the tag set.
    #[must_use]
    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Check whether the case carries a given tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// An ordered, immutable collection of cases with unique ids.
///
/// Case order is significant: the executor visits cases in dataset order,
/// so a fixed dataset yields a fixed schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dataset {
    name: String,
    cases: Vec<Case>,
}

impl Dataset {
    /// Build a dataset from an ordered list of cases.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDataset`] if the list is empty or two cases
    /// share an id.
    pub fn new(name: impl Into<String>, cases: Vec<Case>) -> Result<Self> {
        let name = name.into();
        if cases.is_empty() {
            return Err(Error::InvalidDataset(format!("dataset '{name}' has no cases")));
        }
        let mut seen = BTreeSet::new();
        for case in &cases {
            if !seen.insert(case.id()) {
                return Err(Error::InvalidDataset(format!(
                    "dataset '{name}' has duplicate case id '{}'",
                    case.id()
                )));
            }
        }
        Ok(Self { name, cases })
    }

    /// Get the dataset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of cases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// True if the dataset holds no cases (unreachable after `new`, but
    /// kept for deserialized data).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Iterate cases in dataset order.
    pub fn cases(&self) -> impl Iterator<Item = &Case> {
        self.cases.iter()
    }

    /// Look up a case by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Case> {
        self.cases.iter().find(|c| c.id() == id)
    }
}
