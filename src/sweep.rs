//! Parameter sweep generation
//!
//! A sweep enumerates the Cartesian product of declared axes in a fixed
//! "odometer" order: axes iterate in declaration order and the last
//! declared axis varies fastest. Generation is deterministic, so a sweep
//! definition doubles as a replay key for audit.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One coordinate value on a sweep axis.
///
/// Heterogeneous axis types (temperature floats, mode strings, feature
/// flags) are represented as a tagged value so sweep generation stays
/// type-safe without reflection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisValue {
    /// Integer coordinate
    Int(i64),
    /// Floating-point coordinate
    Float(f64),
    /// Boolean coordinate
    Bool(bool),
    /// String coordinate
    Text(String),
}

impl AxisValue {
    /// Numeric view: integers and floats as `f64`, others `None`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(_) | Self::Text(_) => None,
        }
    }

    /// Boolean view.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// String view.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Canonical rendering used in [`ParameterPoint::key`].
    ///
    /// Injective across variants: floats always carry a decimal point or
    /// exponent, so `Int(1)` renders `1` while `Float(1.0)` renders `1.0`,
    /// and `\`, `,`, `=` in text values are backslash-escaped so they never
    /// alias the key separators.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::Int(i) => i.to_string(),
            Self::Float(v) => format!("{v:?}"),
            Self::Bool(b) => b.to_string(),
            Self::Text(s) => {
                let mut out = String::with_capacity(s.len());
                for c in s.chars() {
                    if matches!(c, '\\' | ',' | '=') {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out
            }
        }
    }
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for AxisValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for AxisValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for AxisValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for AxisValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for AxisValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// One sweep axis: a name and its ordered candidate values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    name: String,
    values: Vec<AxisValue>,
}

impl Axis {
    /// Create an axis from ordered candidate values.
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<AxisValue>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Get the axis name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the ordered candidate values.
    #[must_use]
    pub fn values(&self) -> &[AxisValue] {
        &self.values
    }
}

/// One point in the sweep: a full coordinate assignment, one value per
/// axis, in axis declaration order.
///
/// Equality is by coordinate values. [`ParameterPoint::key`] gives the
/// canonical string form used in observation keys and reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterPoint {
    coordinates: Vec<(String, AxisValue)>,
}

impl ParameterPoint {
    /// The point with no coordinates (the single point of an axis-less sweep).
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            coordinates: Vec::new(),
        }
    }

    /// Build a point from explicit coordinates (mainly for tests and replay).
    #[must_use]
    pub fn new(coordinates: Vec<(String, AxisValue)>) -> Self {
        Self { coordinates }
    }

    /// Coordinates in axis declaration order.
    #[must_use]
    pub fn coordinates(&self) -> &[(String, AxisValue)] {
        &self.coordinates
    }

    /// Look up one coordinate by axis name.
    #[must_use]
    pub fn coordinate(&self, axis: &str) -> Option<&AxisValue> {
        self.coordinates
            .iter()
            .find(|(name, _)| name == axis)
            .map(|(_, v)| v)
    }

    /// Canonical string form, e.g. `temperature=0.5,mode=fast`.
    ///
    /// Stable across runs for a fixed sweep definition and injective over
    /// the points of a validated sweep: distinct points always produce
    /// distinct keys (see [`AxisValue::canonical`]). The empty point
    /// renders as `default`.
    #[must_use]
    pub fn key(&self) -> String {
        if self.coordinates.is_empty() {
            return "default".to_string();
        }
        self.coordinates
            .iter()
            .map(|(name, value)| format!("{name}={}", value.canonical()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for ParameterPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Filter predicate over full coordinate assignments.
pub type SweepFilter = Arc<dyn Fn(&ParameterPoint) -> bool + Send + Sync>;

/// A sweep definition: ordered axes plus an optional constraint predicate.
///
/// # Example
///
/// ```rust
/// use veredicto::sweep::SweepDefinition;
///
/// let sweep = SweepDefinition::new()
///     .axis("temperature", [0.0.into(), 1.0.into()])
///     .axis("mode", ["fast".into(), "thorough".into()]);
/// let points = sweep.points()?;
/// assert_eq!(points.len(), 4);
/// // Last-declared axis varies fastest.
/// assert_eq!(points[0].key(), "temperature=0.0,mode=fast");
/// assert_eq!(points[1].key(), "temperature=0.0,mode=thorough");
/// # Ok::<(), veredicto::Error>(())
/// ```
#[derive(Clone, Default)]
pub struct SweepDefinition {
    axes: Vec<Axis>,
    filter: Option<SweepFilter>,
}

impl fmt::Debug for SweepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SweepDefinition")
            .field("axes", &self.axes)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

impl SweepDefinition {
    /// Create an empty sweep definition (yields exactly one empty point).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an axis (builder-style). Declaration order is generation order.
    #[must_use]
    pub fn axis(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = AxisValue>,
    ) -> Self {
        self.axes.push(Axis::new(name, values.into_iter().collect()));
        self
    }

    /// Constrain the sweep to points accepted by `filter`.
    #[must_use]
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&ParameterPoint) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Declared axes in declaration order.
    #[must_use]
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Validate the axis declarations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSweep`] if any axis has zero candidates,
    /// two axes share a name, an axis name contains a key separator
    /// (`=`, `,`, `\`), or two values on one axis share a canonical
    /// rendering. The last check keeps [`ParameterPoint::key`] injective,
    /// so it rejects both exact duplicates like `[Int(1), Int(1)]` and
    /// ambiguous mixes like `[Int(1), Text("1")]`.
    pub fn validate(&self) -> Result<()> {
        for axis in &self.axes {
            if axis.values().is_empty() {
                return Err(Error::InvalidSweep(format!(
                    "axis '{}' has zero candidate values",
                    axis.name()
                )));
            }
            if axis.name().contains(['=', ',', '\\']) {
                return Err(Error::InvalidSweep(format!(
                    "axis name '{}' contains a key separator",
                    axis.name()
                )));
            }
            let renderings: Vec<String> = axis.values().iter().map(AxisValue::canonical).collect();
            for (i, rendering) in renderings.iter().enumerate() {
                if renderings[..i].contains(rendering) {
                    return Err(Error::InvalidSweep(format!(
                        "axis '{}' has duplicate or ambiguous value '{rendering}'",
                        axis.name()
                    )));
                }
            }
        }
        for (i, axis) in self.axes.iter().enumerate() {
            if self.axes[..i].iter().any(|a| a.name() == axis.name()) {
                return Err(Error::InvalidSweep(format!(
                    "axis '{}' declared twice",
                    axis.name()
                )));
            }
        }
        Ok(())
    }

    /// Lazily iterate points in odometer order, applying the filter.
    ///
    /// Restartable: every call yields an identical sequence. Callers that
    /// need the degenerate-sweep check should use [`Self::points`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSweep`] on invalid axis declarations.
    pub fn iter(&self) -> Result<SweepIter> {
        self.validate()?;
        Ok(SweepIter {
            axes: self.axes.clone(),
            filter: self.filter.clone(),
            odometer: vec![0; self.axes.len()],
            done: false,
        })
    }

    /// Materialize the full point sequence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSweep`] on invalid axes or when the filter
    /// rejects every point (degenerate sweep).
    pub fn points(&self) -> Result<Vec<ParameterPoint>> {
        let points: Vec<ParameterPoint> = self.iter()?.collect();
        if points.is_empty() {
            return Err(Error::InvalidSweep(
                "filter rejects every parameter point".to_string(),
            ));
        }
        Ok(points)
    }
}

/// Lazy odometer iterator over sweep points. Obtained from
/// [`SweepDefinition::iter`].
#[derive(Clone)]
pub struct SweepIter {
    axes: Vec<Axis>,
    filter: Option<SweepFilter>,
    odometer: Vec<usize>,
    done: bool,
}

impl SweepIter {
    fn current(&self) -> ParameterPoint {
        let coordinates = self
            .axes
            .iter()
            .zip(&self.odometer)
            .map(|(axis, &i)| (axis.name().to_string(), axis.values()[i].clone()))
            .collect();
        ParameterPoint::new(coordinates)
    }

    /// Advance the odometer; last-declared axis varies fastest.
    fn advance(&mut self) {
        for pos in (0..self.axes.len()).rev() {
            self.odometer[pos] += 1;
            if self.odometer[pos] < self.axes[pos].values().len() {
                return;
            }
            self.odometer[pos] = 0;
        }
        self.done = true;
    }
}

impl Iterator for SweepIter {
    type Item = ParameterPoint;

    fn next(&mut self) -> Option<ParameterPoint> {
        loop {
            if self.done {
                return None;
            }
            let point = self.current();
            if self.axes.is_empty() {
                self.done = true;
            } else {
                self.advance();
            }
            let accepted = self.filter.as_ref().map_or(true, |f| f(&point));
            if accepted {
                return Some(point);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sweep_yields_single_empty_point() {
        let points = SweepDefinition::new().points().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0], ParameterPoint::empty());
        assert_eq!(points[0].key(), "default");
    }

    #[test]
    fn test_odometer_order_last_axis_fastest() {
        let sweep = SweepDefinition::new()
            .axis("a", [1i64.into(), 2i64.into()])
            .axis("b", ["x".into(), "y".into(), "z".into()]);
        let keys: Vec<String> = sweep.points().unwrap().iter().map(ParameterPoint::key).collect();
        assert_eq!(
            keys,
            [
                "a=1,b=x", "a=1,b=y", "a=1,b=z", "a=2,b=x", "a=2,b=y", "a=2,b=z",
            ]
        );
    }

    #[test]
    fn test_generation_is_deterministic() {
        let sweep = SweepDefinition::new()
            .axis("t", [0.0.into(), 0.5.into(), 1.0.into()])
            .axis("flag", [true.into(), false.into()]);
        let first = sweep.points().unwrap();
        let second = sweep.points().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_candidate_axis_rejected() {
        let sweep = SweepDefinition::new().axis("t", []);
        assert!(matches!(sweep.points(), Err(Error::InvalidSweep(_))));
    }

    #[test]
    fn test_duplicate_axis_rejected() {
        let sweep = SweepDefinition::new()
            .axis("t", [1i64.into()])
            .axis("t", [2i64.into()]);
        assert!(matches!(sweep.points(), Err(Error::InvalidSweep(_))));
    }

    #[test]
    fn test_filter_constrains_points() {
        let sweep = SweepDefinition::new()
            .axis("a", [1i64.into(), 2i64.into()])
            .axis("b", [1i64.into(), 2i64.into()])
            .filter(|p| p.coordinate("a") != p.coordinate("b"));
        let keys: Vec<String> = sweep.points().unwrap().iter().map(ParameterPoint::key).collect();
        assert_eq!(keys, ["a=1,b=2", "a=2,b=1"]);
    }

    #[test]
    fn test_filter_rejecting_everything_is_degenerate() {
        let sweep = SweepDefinition::new()
            .axis("a", [1i64.into()])
            .filter(|_| false);
        assert!(matches!(sweep.points(), Err(Error::InvalidSweep(_))));
        // The lazy iterator itself stays usable (just empty).
        assert_eq!(sweep.iter().unwrap().count(), 0);
    }

    #[test]
    fn test_int_and_float_coordinates_get_distinct_keys() {
        let points = SweepDefinition::new()
            .axis("t", [AxisValue::Int(1), AxisValue::Float(1.0)])
            .points()
            .unwrap();
        assert_ne!(points[0], points[1]);
        assert_eq!(points[0].key(), "t=1");
        assert_eq!(points[1].key(), "t=1.0");
    }

    #[test]
    fn test_duplicate_axis_value_rejected() {
        let sweep = SweepDefinition::new().axis("t", [1i64.into(), 1i64.into()]);
        assert!(matches!(sweep.points(), Err(Error::InvalidSweep(_))));
    }

    #[test]
    fn test_ambiguous_axis_values_rejected() {
        // Int(1) and Text("1") would render the same coordinate key.
        let sweep = SweepDefinition::new().axis("t", [1i64.into(), "1".into()]);
        assert!(matches!(sweep.points(), Err(Error::InvalidSweep(_))));
    }

    #[test]
    fn test_axis_name_with_key_separator_rejected() {
        let sweep = SweepDefinition::new().axis("a=b", [1i64.into()]);
        assert!(matches!(sweep.points(), Err(Error::InvalidSweep(_))));
    }

    #[test]
    fn test_text_separators_escaped_in_key() {
        let p = ParameterPoint::new(vec![("mode".into(), AxisValue::Text("a=b,c".into()))]);
        assert_eq!(p.key(), "mode=a\\=b\\,c");
    }

    #[test]
    fn test_point_equality_by_coordinates() {
        let a = ParameterPoint::new(vec![("t".into(), AxisValue::Float(0.5))]);
        let b = ParameterPoint::new(vec![("t".into(), AxisValue::Float(0.5))]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_point_serialization_roundtrip() {
        let p = ParameterPoint::new(vec![
            ("t".into(), AxisValue::Float(0.5)),
            ("mode".into(), AxisValue::Text("fast".into())),
        ]);
        let json = serde_json::to_string(&p).unwrap();
        let back: ParameterPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
