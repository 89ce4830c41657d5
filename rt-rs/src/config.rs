use serde::{Deserialize, Serialize};

use crate::error::EpiError;
use crate::serial_interval::SerialIntervalModel;

/// Which step a window's estimate is assigned to, relative to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowAlignment {
    Start,
    Middle,
    End,
}

/// A fixed-width estimation window. The window never extends before step 0;
/// steps where it would are ineligible rather than clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimationWindow {
    pub width: usize,
    pub alignment: WindowAlignment,
}

impl EstimationWindow {
    pub fn new(width: usize, alignment: WindowAlignment) -> Result<Self, EpiError> {
        if width < 1 {
            return Err(EpiError::invalid("window_width", "must be >= 1"));
        }
        Ok(EstimationWindow { width, alignment })
    }

    /// Inclusive (start, end) step range of the window assigned to `step`,
    /// or `None` when the window would start before step 0.
    pub fn span(&self, step: usize) -> Option<(usize, usize)> {
        let start = match self.alignment {
            WindowAlignment::Start => step,
            WindowAlignment::Middle => step.checked_sub(self.width / 2)?,
            WindowAlignment::End => (step + 1).checked_sub(self.width)?,
        };
        Some((start, start + self.width - 1))
    }
}

fn default_confidence() -> f64 {
    0.95
}

fn default_resamples() -> usize {
    500
}

/// Immutable estimator configuration, passed into each component call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    pub window_width: usize,
    pub window_alignment: WindowAlignment,
    pub serial_interval_mean: f64,
    pub serial_interval_sd: f64,
    #[serde(default = "default_confidence")]
    pub confidence_level: f64,
    #[serde(default = "default_resamples")]
    pub resample_count: usize,
    #[serde(default)]
    pub random_seed: u64,
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<(), EpiError> {
        if self.window_width < 1 {
            return Err(EpiError::invalid("window_width", "must be >= 1"));
        }
        if self.serial_interval_mean <= 0.0 {
            return Err(EpiError::invalid("serial_interval_mean", "must be > 0"));
        }
        if self.serial_interval_sd <= 0.0 {
            return Err(EpiError::invalid("serial_interval_sd", "must be > 0"));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(EpiError::invalid("confidence_level", "must be in (0, 1)"));
        }
        if self.resample_count < 1 {
            return Err(EpiError::invalid("resample_count", "must be >= 1"));
        }
        Ok(())
    }

    pub fn window(&self) -> Result<EstimationWindow, EpiError> {
        EstimationWindow::new(self.window_width, self.window_alignment)
    }

    pub fn serial_interval(&self) -> Result<SerialIntervalModel, EpiError> {
        SerialIntervalModel::discretized(self.serial_interval_mean, self.serial_interval_sd)
    }
}
