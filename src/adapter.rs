//! Adapter contract - the capability interface the engine invokes models through
//!
//! An adapter wraps one concrete model (an LLM endpoint, a weather model, a
//! simulation) behind a uniform `invoke`. Auth, API shape, and retries live
//! inside the adapter; the engine only sees success or [`AdapterError`].
//!
//! Adapters are expected to block on network I/O. The executor drives them
//! through `spawn_blocking` with a timeout, so implementations stay plain
//! synchronous code.

use serde_json::Value;
use thiserror::Error;

use crate::sweep::ParameterPoint;

/// Failure reported by an adapter invocation.
///
/// Recorded on the observation as `AdapterFailure`; never aborts a sweep.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The invocation exceeded the caller-supplied timeout.
    #[error("invocation timed out after {0} ms")]
    Timeout(u64),

    /// The model (or its transport) failed, with a cause description.
    #[error("invocation failed: {0}")]
    Failed(String),
}

/// Uniform invocation wrapper around a concrete model.
///
/// Implementations must be thread-safe: the executor calls `invoke` from
/// worker tasks for different cases and parameter points concurrently.
pub trait Adapter: Send + Sync {
    /// Invoke the model on one case input at one parameter point.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] on any invocation failure; the executor
    /// records it and moves on.
    fn invoke(&self, input: &Value, point: &ParameterPoint) -> Result<Value, AdapterError>;

    /// Stable identifier for reporting (model name, endpoint, version).
    fn identity(&self) -> String;

    /// Optional cost estimate for one invocation, in adapter-defined units
    /// (tokens, CPU-seconds). Informational; the engine never schedules on it.
    fn cost_estimate(&self, _input: &Value, _point: &ParameterPoint) -> Option<f64> {
        None
    }
}

/// Adapter built from a closure. Convenient for tests and in-process models.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use veredicto::adapter::{Adapter, FnAdapter};
/// use veredicto::sweep::ParameterPoint;
///
/// let echo = FnAdapter::new("echo", |input, _point| Ok(input.clone()));
/// let out = echo.invoke(&json!("hi"), &ParameterPoint::empty()).unwrap();
/// assert_eq!(out, json!("hi"));
/// ```
pub struct FnAdapter<F> {
    name: String,
    func: F,
}

impl<F> FnAdapter<F>
where
    F: Fn(&Value, &ParameterPoint) -> Result<Value, AdapterError> + Send + Sync,
{
    /// Wrap a closure as an adapter.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Adapter for FnAdapter<F>
where
    F: Fn(&Value, &ParameterPoint) -> Result<Value, AdapterError> + Send + Sync,
{
    fn invoke(&self, input: &Value, point: &ParameterPoint) -> Result<Value, AdapterError> {
        (self.func)(input, point)
    }

    fn identity(&self) -> String {
        self.name.clone()
    }
}
