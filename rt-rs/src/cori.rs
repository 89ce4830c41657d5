use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Gamma};
use statrs::function::erf;

use crate::config::EstimationWindow;
use crate::error::EpiError;
use crate::estimate::{Credible, Method, RtEstimate};
use crate::serial_interval::SerialIntervalModel;

/// Conjugate Gamma prior on Rt. The conventional default is shape 1,
/// scale 5 (prior mean 5, weakly informative).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GammaPrior {
    pub shape: f64,
    pub scale: f64,
}

impl Default for GammaPrior {
    fn default() -> Self {
        GammaPrior {
            shape: 1.0,
            scale: 5.0,
        }
    }
}

/// Sliding-window Rt estimator under a Poisson renewal likelihood.
///
/// Within each window Rt is held constant; the Gamma posterior has
/// shape = prior_shape + sum of window incidence and
/// rate = 1/prior_scale + sum of window force of infection. Steps without
/// a full window or a full serial-interval horizon of history report a
/// missing value.
pub struct SlidingWindowEstimator {
    window: EstimationWindow,
    prior: GammaPrior,
    confidence_level: f64,
}

impl SlidingWindowEstimator {
    pub fn new(
        window: EstimationWindow,
        prior: GammaPrior,
        confidence_level: f64,
    ) -> Result<Self, EpiError> {
        if prior.shape <= 0.0 || prior.scale <= 0.0 {
            return Err(EpiError::invalid("prior", "shape and scale must be > 0"));
        }
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(EpiError::invalid("confidence_level", "must be in (0, 1)"));
        }
        Ok(SlidingWindowEstimator {
            window,
            prior,
            confidence_level,
        })
    }

    pub fn estimate(
        &self,
        incidence: &[u64],
        si: &SerialIntervalModel,
    ) -> Result<Vec<RtEstimate>, EpiError> {
        if incidence.len() < self.window.width {
            return Err(EpiError::InsufficientHistory {
                method: Method::SlidingWindow,
                required: self.window.width,
                available: incidence.len(),
            });
        }
        let estimates = (0..incidence.len())
            .map(|step| RtEstimate {
                step,
                method: Method::SlidingWindow,
                value: self.at(step, incidence, si),
            })
            .collect();
        Ok(estimates)
    }

    fn at(&self, step: usize, incidence: &[u64], si: &SerialIntervalModel) -> Option<Credible> {
        // One full serial-interval horizon and one full window of history.
        if step < usize::max(self.window.width, si.max_lag()) {
            return None;
        }
        let (start, end) = self.window.span(step)?;
        if end >= incidence.len() {
            return None;
        }

        let mut case_sum = 0.0;
        let mut force_sum = 0.0;
        for s in start..=end {
            case_sum += incidence[s] as f64;
            force_sum += si.force_of_infection(incidence, s);
        }

        let (shape, rate) = if force_sum > 0.0 {
            (self.prior.shape + case_sum, 1.0 / self.prior.scale + force_sum)
        } else {
            // No plausible prior cases in the window: report the prior itself.
            (self.prior.shape, 1.0 / self.prior.scale)
        };
        Some(gamma_summary(shape, rate, self.confidence_level))
    }
}

/// Mean and equal-tailed interval of a Gamma(shape, rate) distribution.
///
/// The quantile routine loses precision at large shapes (window case sums
/// in the hundreds of thousands) and can return NaN or infinity; those
/// bounds must never reach output, so any non-finite or disordered result
/// falls back to the normal limit of the Gamma, mean +- z * sqrt(shape)/rate,
/// which is essentially exact at the shapes where the routine fails.
fn gamma_summary(shape: f64, rate: f64, confidence_level: f64) -> Credible {
    let mean = shape / rate;
    let tail = (1.0 - confidence_level) / 2.0;
    if let Ok(dist) = Gamma::new(shape, rate) {
        let lower = dist.inverse_cdf(tail);
        let upper = dist.inverse_cdf(1.0 - tail);
        if lower.is_finite() && upper.is_finite() && lower <= mean && mean <= upper {
            return Credible { mean, lower, upper };
        }
    }
    let z = std::f64::consts::SQRT_2 * erf::erf_inv(confidence_level);
    let sd = shape.sqrt() / rate;
    Credible {
        mean,
        lower: (mean - z * sd).max(0.0),
        upper: mean + z * sd,
    }
}
