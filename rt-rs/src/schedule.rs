use serde::{Deserialize, Serialize};

use crate::error::EpiError;

/// A time-varying transmission rate. The generator and the integrator are
/// both driven through this trait so a single schedule can feed both.
pub trait TransmissionRate {
    /// Transmission rate (per infectious person per day) at time `t` (days).
    fn rate(&self, t: f64) -> f64;
}

impl<F: Fn(f64) -> f64> TransmissionRate for F {
    fn rate(&self, t: f64) -> f64 {
        self(t)
    }
}

/// A step change in the transmission rate: from `time` on, the baseline is
/// scaled by `multiplier` (until the next breakpoint).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub time: f64,
    pub multiplier: f64,
}

/// Piecewise-constant transmission rate: a baseline scaled by the multiplier
/// of the latest breakpoint at or before `t` (1.0 before the first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransmissionSchedule {
    baseline: f64,
    breakpoints: Vec<Breakpoint>,
}

impl TransmissionSchedule {
    pub fn new(baseline: f64, breakpoints: Vec<Breakpoint>) -> Result<Self, EpiError> {
        if baseline <= 0.0 || !baseline.is_finite() {
            return Err(EpiError::invalid("baseline_rate", "must be > 0"));
        }
        for pair in breakpoints.windows(2) {
            if pair[1].time <= pair[0].time {
                return Err(EpiError::invalid(
                    "breakpoints",
                    "times must be strictly increasing",
                ));
            }
        }
        for bp in &breakpoints {
            if bp.multiplier <= 0.0 || !bp.multiplier.is_finite() {
                return Err(EpiError::invalid(
                    "breakpoints",
                    format!("multiplier at t = {} must be > 0", bp.time),
                ));
            }
        }
        Ok(TransmissionSchedule {
            baseline,
            breakpoints,
        })
    }

    pub fn constant(baseline: f64) -> Result<Self, EpiError> {
        Self::new(baseline, Vec::new())
    }

    pub fn baseline(&self) -> f64 {
        self.baseline
    }
}

impl TransmissionRate for TransmissionSchedule {
    fn rate(&self, t: f64) -> f64 {
        let multiplier = self
            .breakpoints
            .iter()
            .rev()
            .find(|bp| bp.time <= t)
            .map(|bp| bp.multiplier)
            .unwrap_or(1.0);
        self.baseline * multiplier
    }
}
