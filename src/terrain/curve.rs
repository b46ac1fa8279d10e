use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Piecewise-linear response curve over t in [0, 1].
///
/// The engine-agnostic stand-in for editor animation curves: a sorted list
/// of (t, value) keys, linearly interpolated, clamped at both ends. Used
/// for the falloff profile and the height response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseCurve {
    keys: Vec<CurveKey>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CurveKey {
    pub t: f32,
    pub value: f32,
}

impl ResponseCurve {
    pub fn new(keys: Vec<CurveKey>) -> Self {
        ResponseCurve { keys }
    }

    /// Identity curve: output equals input.
    pub fn linear() -> Self {
        ResponseCurve {
            keys: vec![
                CurveKey { t: 0.0, value: 0.0 },
                CurveKey { t: 1.0, value: 1.0 },
            ],
        }
    }

    pub fn constant(value: f32) -> Self {
        ResponseCurve {
            keys: vec![CurveKey { t: 0.0, value }],
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keys.is_empty() {
            return Err(ConfigError::InvalidCurve("curve has no keys".into()));
        }
        for (i, key) in self.keys.iter().enumerate() {
            if !key.t.is_finite() || !key.value.is_finite() {
                return Err(ConfigError::InvalidCurve(format!(
                    "key {i} is not finite"
                )));
            }
            if i > 0 && key.t <= self.keys[i - 1].t {
                return Err(ConfigError::InvalidCurve(format!(
                    "key times must be strictly ascending (key {i})"
                )));
            }
        }
        Ok(())
    }

    /// Sample the curve. Input is clamped to the keyed range.
    pub fn evaluate(&self, t: f32) -> f32 {
        let first = self.keys[0];
        let last = self.keys[self.keys.len() - 1];
        if t <= first.t {
            return first.value;
        }
        if t >= last.t {
            return last.value;
        }
        // Keys are sorted; find the enclosing segment.
        for pair in self.keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.t {
                let span = b.t - a.t;
                let alpha = (t - a.t) / span;
                return a.value + (b.value - a.value) * alpha;
            }
        }
        last.value
    }
}
