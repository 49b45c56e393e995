//! Keyframe curves: an ordered, frame-unique key sequence plus evaluation.
//!
//! Evaluation rules:
//! - empty curve, or right-bound frame 0 -> 0.0
//! - one key -> its value for any input
//! - input at/left of the first key -> first value; at/right of the last -> last value
//! - otherwise a single Lagrange polynomial through every key, with
//!   t = frame / right_frame (one smooth degree-(N-1) curve, not a spline)
//!
//! `set` keeps the sequence sorted and unique by frame; two keys on the same
//! frame would produce a zero denominator in the Lagrange basis.

use serde::{Deserialize, Serialize};

/// Which side(s) of a key use weighted tangents. Editor curve math only;
/// `evaluate` reads frame/value.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum WeightedMode {
    #[default]
    None,
    In,
    Out,
    Both,
}

/// A single immutable keyframe. Tangents and weights ride along for the
/// editor and persistence; the runtime evaluator ignores them.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct KeyFrame {
    pub frame: u32,
    pub value: f32,
    #[serde(default)]
    pub in_tangent: f32,
    #[serde(default)]
    pub out_tangent: f32,
    #[serde(default = "default_weight")]
    pub in_weight: f32,
    #[serde(default = "default_weight")]
    pub out_weight: f32,
    #[serde(default)]
    pub weighted_mode: WeightedMode,
}

fn default_weight() -> f32 {
    1.0 / 3.0
}

impl KeyFrame {
    pub fn new(frame: u32, value: f32) -> Self {
        Self {
            frame,
            value,
            in_tangent: 0.0,
            out_tangent: 0.0,
            in_weight: default_weight(),
            out_weight: default_weight(),
            weighted_mode: WeightedMode::None,
        }
    }
}

/// Ordered, frame-unique keyframe sequence.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Curve {
    keys: Vec<KeyFrame>,
}

impl Curve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: &[(u32, f32)]) -> Self {
        let mut c = Self::new();
        for (frame, value) in points {
            c.set(*frame, *value);
        }
        c
    }

    /// Insert-or-overwrite a key, preserving sort order and frame uniqueness.
    pub fn set(&mut self, frame: u32, value: f32) {
        match self.keys.binary_search_by_key(&frame, |k| k.frame) {
            Ok(i) => self.keys[i].value = value,
            Err(i) => self.keys.insert(i, KeyFrame::new(frame, value)),
        }
    }

    /// Insert-or-overwrite a fully specified key (tangents/weights included).
    pub fn set_key(&mut self, key: KeyFrame) {
        match self.keys.binary_search_by_key(&key.frame, |k| k.frame) {
            Ok(i) => self.keys[i] = key,
            Err(i) => self.keys.insert(i, key),
        }
    }

    /// Remove the key at `frame`; returns whether one existed.
    pub fn remove(&mut self, frame: u32) -> bool {
        match self.keys.binary_search_by_key(&frame, |k| k.frame) {
            Ok(i) => {
                self.keys.remove(i);
                true
            }
            Err(_) => false,
        }
    }

    pub fn keys(&self) -> &[KeyFrame] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Evaluate the curve at an arbitrary frame (scrub inputs may be negative).
    pub fn evaluate(&self, frame: i32) -> f32 {
        let Some(last) = self.keys.last() else {
            return 0.0;
        };
        if last.frame == 0 {
            return 0.0;
        }
        if self.keys.len() == 1 {
            return last.value;
        }
        let first = &self.keys[0];
        if frame <= first.frame as i32 {
            return first.value;
        }
        if frame >= last.frame as i32 {
            return last.value;
        }

        // Lagrange basis over all keys, abscissae normalized by the right bound.
        let right = last.frame as f32;
        let t = frame as f32 / right;
        let mut acc = 0.0f32;
        for (i, ki) in self.keys.iter().enumerate() {
            let ti = ki.frame as f32 / right;
            let mut basis = 1.0f32;
            for (j, kj) in self.keys.iter().enumerate() {
                if i == j {
                    continue;
                }
                let tj = kj.frame as f32 / right;
                basis *= (t - tj) / (ti - tj);
            }
            acc += ki.value * basis;
        }
        acc
    }
}
