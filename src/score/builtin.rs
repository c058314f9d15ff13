//! Stock scoring functions
//!
//! Per-case reductions whose aggregates recover the classical verification
//! metrics: the mean of `squared_error` is MSE, the mean of
//! `absolute_error` is MAE, the proportion of `exact_match` is accuracy.

use serde_json::Value;

use super::{ScoreContext, ScoreValue, ScoringError};

fn numeric(value: &Value, role: &str) -> Result<f64, ScoringError> {
    value
        .as_f64()
        .ok_or_else(|| ScoringError::new(format!("{role} payload is not numeric: {value}")))
}

/// Boolean metric: exact JSON equality of output and expected.
///
/// # Errors
///
/// Never fails; any pair of payloads compares.
#[allow(clippy::unnecessary_wraps)]
pub fn exact_match(
    actual: &Value,
    expected: &Value,
    _ctx: &ScoreContext<'_>,
) -> Result<ScoreValue, ScoringError> {
    Ok(ScoreValue::Boolean(actual == expected))
}

/// Numeric metric: `|actual - expected|` over numeric payloads.
///
/// # Errors
///
/// Fails with [`ScoringError`] if either payload is non-numeric.
pub fn absolute_error(
    actual: &Value,
    expected: &Value,
    _ctx: &ScoreContext<'_>,
) -> Result<ScoreValue, ScoringError> {
    Ok(ScoreValue::Numeric(
        (numeric(actual, "actual")? - numeric(expected, "expected")?).abs(),
    ))
}

/// Numeric metric: `(actual - expected)^2` over numeric payloads.
///
/// # Errors
///
/// Fails with [`ScoringError`] if either payload is non-numeric.
pub fn squared_error(
    actual: &Value,
    expected: &Value,
    _ctx: &ScoreContext<'_>,
) -> Result<ScoreValue, ScoringError> {
    let diff = numeric(actual, "actual")? - numeric(expected, "expected")?;
    Ok(ScoreValue::Numeric(diff * diff))
}

/// Boolean metric factory: `|actual - expected| <= tolerance`.
#[must_use]
pub fn within_tolerance(
    tolerance: f64,
) -> impl Fn(&Value, &Value, &ScoreContext<'_>) -> Result<ScoreValue, ScoringError> {
    move |actual, expected, _ctx| {
        let diff = (numeric(actual, "actual")? - numeric(expected, "expected")?).abs();
        Ok(ScoreValue::Boolean(diff <= tolerance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Case;
    use crate::sweep::ParameterPoint;
    use serde_json::json;

    fn ctx_fixture() -> (Case, ParameterPoint) {
        (Case::new("c", json!(null), json!(null)), ParameterPoint::empty())
    }

    #[test]
    fn test_exact_match_on_structured_payloads() {
        let (case, point) = ctx_fixture();
        let ctx = ScoreContext { case: &case, point: &point };
        let score = exact_match(&json!({"a": 1}), &json!({"a": 1}), &ctx).unwrap();
        assert_eq!(score, ScoreValue::Boolean(true));
        let score = exact_match(&json!({"a": 1}), &json!({"a": 2}), &ctx).unwrap();
        assert_eq!(score, ScoreValue::Boolean(false));
    }

    #[test]
    fn test_squared_error() {
        let (case, point) = ctx_fixture();
        let ctx = ScoreContext { case: &case, point: &point };
        let score = squared_error(&json!(3.0), &json!(1.0), &ctx).unwrap();
        assert_eq!(score, ScoreValue::Numeric(4.0));
    }

    #[test]
    fn test_non_numeric_payload_is_scoring_error() {
        let (case, point) = ctx_fixture();
        let ctx = ScoreContext { case: &case, point: &point };
        let err = absolute_error(&json!("oops"), &json!(1.0), &ctx).unwrap_err();
        assert!(err.to_string().contains("not numeric"));
    }

    #[test]
    fn test_within_tolerance_boundary_is_inclusive() {
        let (case, point) = ctx_fixture();
        let ctx = ScoreContext { case: &case, point: &point };
        let f = within_tolerance(0.5);
        assert_eq!(f(&json!(1.5), &json!(1.0), &ctx).unwrap(), ScoreValue::Boolean(true));
        assert_eq!(f(&json!(1.6), &json!(1.0), &ctx).unwrap(), ScoreValue::Boolean(false));
    }
}
