//! Property-based tests for the measurement engine
//!
//! Invariants under test:
//! - Sweep generation is deterministic and sized by the axis product
//! - Repeat indices are dense per (case, point) after any run
//! - Verdict reduction is idempotent (bit-identical on recomputation)

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;
use veredicto::adapter::FnAdapter;
use veredicto::dataset::{Case, Dataset};
use veredicto::measure::{CollectionPolicy, Executor, Measurement};
use veredicto::score::{exact_match, ScoreValue, ScoringRegistry};
use veredicto::store::{Observation, ObservationFilter, ResultStore};
use veredicto::sweep::{AxisValue, ParameterPoint, SweepDefinition};
use veredicto::verdict::{AcceptanceCriterion, Direction, VerdictEngine};

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Generate a sweep with 1..=3 axes of 1..=4 integer candidates each.
fn arb_sweep() -> impl Strategy<Value = SweepDefinition> {
    proptest::collection::vec(1usize..=4, 1..=3).prop_map(|axis_sizes| {
        let mut sweep = SweepDefinition::new();
        for (axis_index, size) in axis_sizes.into_iter().enumerate() {
            #[allow(clippy::cast_possible_wrap)]
            let values: Vec<AxisValue> = (0..size).map(|v| AxisValue::Int(v as i64)).collect();
            sweep = sweep.axis(format!("axis{axis_index}"), values);
        }
        sweep
    })
}

/// Generate a vector of boolean scores for verdict reduction.
fn arb_bool_scores() -> impl Strategy<Value = Vec<bool>> {
    proptest::collection::vec(any::<bool>(), 1..32)
}

// ============================================================================
// Sweep Generation Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: regenerating a sweep yields an identical point sequence.
    #[test]
    fn prop_sweep_generation_deterministic(sweep in arb_sweep()) {
        let first = sweep.points().unwrap();
        let second = sweep.points().unwrap();
        prop_assert_eq!(&first, &second);
        // Lazy iteration agrees with materialization.
        let lazy: Vec<_> = sweep.iter().unwrap().collect();
        prop_assert_eq!(&first, &lazy);
    }

    /// Property: unfiltered sweep size is the product of axis sizes, and
    /// every point is distinct by canonical key.
    #[test]
    fn prop_sweep_size_is_axis_product(sweep in arb_sweep()) {
        let expected: usize = sweep.axes().iter().map(|a| a.values().len()).product();
        let points = sweep.points().unwrap();
        prop_assert_eq!(points.len(), expected);
        let mut keys: Vec<String> = points.iter().map(ParameterPoint::key).collect();
        keys.sort();
        keys.dedup();
        prop_assert_eq!(keys.len(), expected);
    }
}

// ============================================================================
// Executor Completeness Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: after a run with no abandonment, every (case, point) unit
    /// holds exactly `repeats` observations with dense indices 0..n-1.
    #[test]
    fn prop_repeat_indices_dense(
        axis_size in 1usize..=3,
        case_count in 1usize..=3,
        repeats in 1u32..=3,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        runtime.block_on(async {
            let cases = (0..case_count)
                .map(|i| Case::new(format!("case-{i}"), json!(i), json!(i)))
                .collect();
            let dataset = Dataset::new("prop", cases).unwrap();
            #[allow(clippy::cast_possible_wrap)]
            let values: Vec<AxisValue> =
                (0..axis_size).map(|v| AxisValue::Int(v as i64)).collect();
            let measurement = Measurement::builder("density")
                .metric("accuracy", AcceptanceCriterion::proportion(Direction::AtLeast, 0.5))
                .sweep(SweepDefinition::new().axis("k", values))
                .policy(CollectionPolicy::repeats(repeats, repeats))
                .build()
                .unwrap();

            let adapter = Arc::new(FnAdapter::new("echo", |input, _| Ok(input.clone())));
            let registry = ScoringRegistry::new().register("accuracy", exact_match);
            let store = Arc::new(ResultStore::new());
            let executor = Executor::new(adapter, registry);
            let summary = executor.run(&measurement, &dataset, &store).await.unwrap();

            #[allow(clippy::cast_possible_truncation)]
            let expected = (axis_size * case_count * repeats as usize) as u32;
            assert_eq!(summary.attempts, expected);
            assert_eq!(store.len(), expected as usize);

            for point in measurement.sweep().points().unwrap() {
                for case in dataset.cases() {
                    let rows = store.select(
                        &ObservationFilter::new()
                            .case_id(case.id())
                            .point_key(point.key()),
                    );
                    let indices: Vec<u32> =
                        rows.iter().map(Observation::repeat_index).collect();
                    let dense: Vec<u32> = (0..repeats).collect();
                    assert_eq!(indices, dense);
                }
            }
        });
    }
}

// ============================================================================
// Verdict Reduction Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: recomputing a verdict from the same observation set is
    /// bit-identical, and the proportion estimate equals the truthy share.
    #[test]
    fn prop_verdict_idempotent_and_exact(scores in arb_bool_scores()) {
        let store = ResultStore::new();
        for (i, &truthy) in scores.iter().enumerate() {
            let mut map = BTreeMap::new();
            map.insert("accuracy".to_string(), ScoreValue::Boolean(truthy));
            #[allow(clippy::cast_possible_truncation)]
            let repeat = i as u32;
            store
                .record(Observation::success(
                    "prop",
                    "case-0",
                    ParameterPoint::empty(),
                    repeat,
                    json!(null),
                    map,
                    BTreeMap::new(),
                ))
                .unwrap();
        }
        let measurement = Measurement::builder("prop")
            .metric("accuracy", AcceptanceCriterion::proportion(Direction::AtLeast, 0.5))
            .build()
            .unwrap();

        let engine = VerdictEngine::new();
        let first = engine.judge(&store, &measurement);
        let second = engine.judge(&store, &measurement);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(
            first[0].estimate.map(f64::to_bits),
            second[0].estimate.map(f64::to_bits)
        );
        prop_assert_eq!(
            first[0].dispersion.map(f64::to_bits),
            second[0].dispersion.map(f64::to_bits)
        );

        #[allow(clippy::cast_precision_loss)]
        let expected =
            scores.iter().filter(|&&b| b).count() as f64 / scores.len() as f64;
        prop_assert_eq!(first[0].estimate, Some(expected));
        #[allow(clippy::cast_possible_truncation)]
        let n = scores.len() as u32;
        prop_assert_eq!(first[0].sample_size, n);
    }
}
