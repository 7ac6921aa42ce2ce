//! Exploration schedule and sampling weights

use serde::{Deserialize, Serialize};

/// Multiplicative ε decay with a floor.
///
/// Decays once per completed decision step and never resets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpsilonSchedule {
    /// Current value
    pub value: f64,
    /// Factor applied on each decay
    pub decay_rate: f64,
    /// Minimum value
    pub min_value: f64,
    /// Number of decays applied so far
    pub steps: u64,
}

impl EpsilonSchedule {
    /// Create a new schedule starting at `start`
    #[must_use]
    pub fn new(start: f64, decay_rate: f64, min_value: f64) -> Self {
        Self {
            value: start,
            decay_rate,
            min_value,
            steps: 0,
        }
    }

    /// Current ε
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Apply one decay step and return the new ε
    pub fn decay(&mut self) -> f64 {
        self.value = (self.value * self.decay_rate).max(self.min_value);
        self.steps += 1;
        self.value
    }
}

/// Softmax weights of `values` at `temperature`.
///
/// Values are shifted by their maximum first so large rewards cannot overflow.
#[must_use]
pub fn softmax(values: &[f64], temperature: f64) -> Vec<f64> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values
        .iter()
        .map(|v| ((v - max) / temperature).exp())
        .collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Value-proportional weights, with `bonus` applied where `favoured` is set
#[must_use]
pub fn proportional(values: &[f64], favoured: &[bool], bonus: f64) -> Vec<f64> {
    values
        .iter()
        .zip(favoured)
        .map(|(&v, &fav)| if fav { v * bonus } else { v })
        .collect()
}
