//! Parameter grid definitions and lazy cartesian-product enumeration.

use mg_types::{validation_error, MgResult, ParamValue, Params};
use serde::{Deserialize, Serialize};

/// A single named axis of the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Parameter name as models see it (e.g. "parameter", "alpha").
    pub name: String,
    /// How the axis values are produced.
    pub kind: ParameterKind,
}

/// Describes the candidate values of one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Explicit candidate list, used as given.
    Values { values: Vec<ParamValue> },
    /// Integer range [low, high] inclusive.
    IntRange { low: i64, high: i64 },
    /// `steps` evenly spaced floats from `low` to `high` inclusive. Zero
    /// steps is an empty axis, one step is just `low`.
    FloatRange { low: f64, high: f64, steps: usize },
    /// `steps` log-spaced floats from `low` to `high` inclusive. Both bounds
    /// must be positive.
    LogUniform { low: f64, high: f64, steps: usize },
}

impl ParameterKind {
    /// Number of values on the axis. Computed in `u128` so that any `i64`
    /// range fits.
    fn axis_len(&self) -> u128 {
        match self {
            Self::Values { values } => values.len() as u128,
            Self::IntRange { low, high } => {
                if high < low {
                    0
                } else {
                    (i128::from(*high) - i128::from(*low)) as u128 + 1
                }
            }
            Self::FloatRange { steps, .. } | Self::LogUniform { steps, .. } => *steps as u128,
        }
    }

    /// Number of values on the axis, `None` if it does not fit in `usize`.
    pub fn len(&self) -> Option<usize> {
        usize::try_from(self.axis_len()).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.axis_len() == 0
    }

    /// The `idx`-th value of the axis, computed on demand. `idx` must be
    /// below the axis length.
    fn value_at(&self, idx: u128) -> ParamValue {
        match self {
            Self::Values { values } => values[idx as usize].clone(),
            Self::IntRange { low, .. } => ParamValue::Int((i128::from(*low) + idx as i128) as i64),
            Self::FloatRange { low, high, steps } => {
                ParamValue::Float(low + fraction(idx, *steps) * (high - low))
            }
            Self::LogUniform { low, high, steps } => {
                let (log_low, log_high) = (low.ln(), high.ln());
                ParamValue::Float((log_low + fraction(idx, *steps) * (log_high - log_low)).exp())
            }
        }
    }

    fn validate(&self, name: &str) -> MgResult<()> {
        match self {
            Self::FloatRange { low, high, .. } if !(low.is_finite() && high.is_finite()) => Err(
                validation_error!("float axis `{}` needs finite bounds, got [{}, {}]", name, low, high),
            ),
            Self::LogUniform { low, high, .. } if !(*low > 0.0 && *high > 0.0 && low.is_finite() && high.is_finite()) => {
                Err(validation_error!(
                    "log-uniform axis `{}` needs positive finite bounds, got [{}, {}]",
                    name,
                    low,
                    high
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Position of `idx` along `steps` evenly spaced points in [0, 1]. A single
/// step sits at the low end.
fn fraction(idx: u128, steps: usize) -> f64 {
    if steps <= 1 {
        0.0
    } else {
        idx as f64 / (steps - 1) as f64
    }
}

/// Ordered set of axes. Enumeration follows declaration order with the last
/// axis varying fastest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub parameters: Vec<ParameterDef>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an axis; redefining a name replaces the earlier axis in place.
    pub fn add(mut self, name: impl Into<String>, kind: ParameterKind) -> Self {
        let name = name.into();
        match self.parameters.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.kind = kind,
            None => self.parameters.push(ParameterDef { name, kind }),
        }
        self
    }

    pub fn add_values<V: Into<ParamValue>>(self, name: impl Into<String>, values: Vec<V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.add(name, ParameterKind::Values { values })
    }

    pub fn add_int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(name, ParameterKind::IntRange { low, high })
    }

    pub fn add_float(self, name: impl Into<String>, low: f64, high: f64, steps: usize) -> Self {
        self.add(name, ParameterKind::FloatRange { low, high, steps })
    }

    pub fn add_log_uniform(self, name: impl Into<String>, low: f64, high: f64, steps: usize) -> Self {
        self.add(name, ParameterKind::LogUniform { low, high, steps })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.name.as_str())
    }

    /// Number of grid points; `None` on overflow. A grid without axes has
    /// no points.
    pub fn grid_size(&self) -> Option<usize> {
        if self.parameters.is_empty() {
            return Some(0);
        }
        let mut total: usize = 1;
        for param in &self.parameters {
            total = total.checked_mul(param.kind.len()?)?;
        }
        Some(total)
    }

    /// Reject axes whose values would not be finite numbers.
    pub fn validate(&self) -> MgResult<()> {
        self.parameters
            .iter()
            .try_for_each(|param| param.kind.validate(&param.name))
    }

    pub fn iter(&self) -> GridIter {
        GridIter::new(self)
    }
}

impl<'a> IntoIterator for &'a ParamGrid {
    type Item = Params;
    type IntoIter = GridIter;

    fn into_iter(self) -> GridIter {
        self.iter()
    }
}

/// Lazy cartesian product over a [`ParamGrid`]. Axis values are computed
/// from the cursor, never materialized.
#[derive(Debug, Clone)]
pub struct GridIter {
    names: Vec<String>,
    axes: Vec<ParameterKind>,
    lens: Vec<u128>,
    cursor: Vec<u128>,
    exhausted: bool,
}

impl GridIter {
    fn new(grid: &ParamGrid) -> Self {
        let names: Vec<String> = grid.parameters.iter().map(|p| p.name.clone()).collect();
        let axes: Vec<ParameterKind> = grid.parameters.iter().map(|p| p.kind.clone()).collect();
        let lens: Vec<u128> = axes.iter().map(ParameterKind::axis_len).collect();
        let exhausted = lens.is_empty() || lens.contains(&0);
        Self {
            cursor: vec![0; axes.len()],
            names,
            axes,
            lens,
            exhausted,
        }
    }

    /// Advance the odometer; the last axis turns fastest.
    fn advance(&mut self) {
        for axis in (0..self.lens.len()).rev() {
            self.cursor[axis] += 1;
            if self.cursor[axis] < self.lens[axis] {
                return;
            }
            self.cursor[axis] = 0;
        }
        self.exhausted = true;
    }
}

impl Iterator for GridIter {
    type Item = Params;

    fn next(&mut self) -> Option<Params> {
        if self.exhausted {
            return None;
        }
        let point = self
            .names
            .iter()
            .zip(&self.axes)
            .zip(&self.cursor)
            .map(|((name, axis), &idx)| (name.clone(), axis.value_at(idx)))
            .collect();
        self.advance();
        Some(point)
    }
}
