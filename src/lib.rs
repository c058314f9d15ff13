//! # Veredicto: Measurement & Verdict Engine
//!
//! Veredicto is a model-agnostic validation harness core: it runs a model
//! (behind a uniform adapter) against a labeled dataset across a parameter
//! sweep, records every invocation as an append-only observation, and
//! reduces the observations into statistically defensible pass / fail /
//! inconclusive verdicts.
//!
//! ## Design Principles
//!
//! - **Deterministic semantics**: sweep generation and verdict reduction
//!   are reproducible bit for bit; timestamps are informational only
//! - **Failure isolation**: adapter and scoring failures become
//!   observation status, never process faults
//! - **Jidoka**: absence of evidence stays visible - zero successes means
//!   an Inconclusive verdict, not a silently omitted row
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use veredicto::adapter::FnAdapter;
//! use veredicto::dataset::{Case, Dataset};
//! use veredicto::measure::{CollectionPolicy, Executor, Measurement};
//! use veredicto::score::{exact_match, ScoringRegistry};
//! use veredicto::store::ResultStore;
//! use veredicto::sweep::SweepDefinition;
//! use veredicto::verdict::{AcceptanceCriterion, Direction, VerdictEngine};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> veredicto::Result<()> {
//! let dataset = Dataset::new(
//!     "smoke",
//!     vec![Case::new("double-2", json!(2), json!(4))],
//! )?;
//! let measurement = Measurement::builder("doubling")
//!     .metric("accuracy", AcceptanceCriterion::proportion(Direction::AtLeast, 0.75))
//!     .sweep(SweepDefinition::new().axis("temperature", [0.0.into(), 1.0.into()]))
//!     .policy(CollectionPolicy::repeats(2, 2))
//!     .build()?;
//!
//! let adapter = Arc::new(FnAdapter::new("doubler", |input, _point| {
//!     Ok(json!(input.as_i64().unwrap_or(0) * 2))
//! }));
//! let registry = ScoringRegistry::new().register("accuracy", exact_match);
//!
//! let store = Arc::new(ResultStore::new());
//! let executor = Executor::new(adapter, registry);
//! let summary = executor.run(&measurement, &dataset, &store).await?;
//!
//! let verdicts = VerdictEngine::new().judge(&store, &measurement);
//! assert_eq!(summary.attempts, 4); // 2 points x 1 case x 2 repeats
//! assert_eq!(verdicts.len(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod adapter;
pub mod dataset;
pub mod error;
pub mod export;
pub mod measure;
pub mod score;
pub mod store;
pub mod sweep;
pub mod verdict;

pub use error::{Error, Result};
