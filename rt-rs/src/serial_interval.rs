use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Gamma};

use crate::error::EpiError;

/// Cumulative mass the discretized PMF must reach before truncation.
const TRUNCATION_MASS: f64 = 0.999;

/// A generation-interval distribution discretized to integer lags 1..=max_lag.
///
/// The continuous distribution is a Gamma with the given mean and standard
/// deviation; mass for lag k is the Gamma mass on (k - 0.5, k + 0.5], with
/// the sub-half-day mass folded into lag 1. After truncation the PMF is
/// renormalized so it sums to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialIntervalModel {
    mean: f64,
    sd: f64,
    pmf: Vec<f64>,
}

impl SerialIntervalModel {
    pub fn discretized(mean: f64, sd: f64) -> Result<Self, EpiError> {
        if mean <= 0.0 || !mean.is_finite() {
            return Err(EpiError::invalid("serial_interval_mean", "must be > 0"));
        }
        if sd <= 0.0 || !sd.is_finite() {
            return Err(EpiError::invalid("serial_interval_sd", "must be > 0"));
        }
        let shape = (mean / sd) * (mean / sd);
        let rate = mean / (sd * sd);
        let dist = Gamma::new(shape, rate)
            .map_err(|e| EpiError::invalid("serial_interval", e.to_string()))?;

        let mut pmf = Vec::new();
        let mut upper_cdf;
        let mut lag = 1usize;
        loop {
            let lower = if lag == 1 { 0.0 } else { dist.cdf(lag as f64 - 0.5) };
            upper_cdf = dist.cdf(lag as f64 + 0.5);
            pmf.push((upper_cdf - lower).max(0.0));
            if upper_cdf >= TRUNCATION_MASS {
                break;
            }
            lag += 1;
        }
        let total: f64 = pmf.iter().sum();
        for mass in &mut pmf {
            *mass /= total;
        }
        Ok(SerialIntervalModel { mean, sd, pmf })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn sd(&self) -> f64 {
        self.sd
    }

    /// Largest lag with nonzero mass.
    pub fn max_lag(&self) -> usize {
        self.pmf.len()
    }

    /// Mass at integer lag (1-based); zero outside 1..=max_lag.
    pub fn pmf(&self, lag: usize) -> f64 {
        if lag >= 1 && lag <= self.pmf.len() {
            self.pmf[lag - 1]
        } else {
            0.0
        }
    }

    /// Serial-interval-weighted sum of past incidence at `step`: the
    /// transmission pressure from existing cases. Boundary-aware: lags
    /// reaching before step 0 contribute nothing.
    pub fn force_of_infection(&self, incidence: &[u64], step: usize) -> f64 {
        let mut force = 0.0;
        for lag in 1..=usize::min(step, self.pmf.len()) {
            force += incidence[step - lag] as f64 * self.pmf[lag - 1];
        }
        force
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pmf_normalized_and_nonnegative() {
        let si = SerialIntervalModel::discretized(7.0, 5.0).unwrap();
        let total: f64 = (1..=si.max_lag()).map(|lag| si.pmf(lag)).sum();
        assert!(f64::abs(total - 1.0) < 1e-12);
        assert!((1..=si.max_lag()).all(|lag| si.pmf(lag) >= 0.0));
        assert_eq!(si.pmf(0), 0.0);
        assert_eq!(si.pmf(si.max_lag() + 1), 0.0);
    }

    #[test]
    fn test_discretized_mean_close_to_target() {
        let si = SerialIntervalModel::discretized(7.0, 5.0).unwrap();
        let mean: f64 = (1..=si.max_lag()).map(|lag| lag as f64 * si.pmf(lag)).sum();
        assert!(f64::abs(mean - 7.0) < 0.5);
    }

    #[test]
    fn test_force_of_infection_boundaries() {
        let si = SerialIntervalModel::discretized(3.0, 1.0).unwrap();
        let incidence = vec![10, 20, 30, 40];
        assert_eq!(si.force_of_infection(&incidence, 0), 0.0);
        let f3 = si.force_of_infection(&incidence, 3);
        // Weighted sum of incidence at steps 0..=2.
        let expected: f64 = (1..=3).map(|lag| incidence[3 - lag] as f64 * si.pmf(lag)).sum();
        assert!(f64::abs(f3 - expected) < 1e-12);
        assert!(f3 > 0.0);
    }

    #[test]
    fn test_rejects_nonpositive_parameters() {
        assert!(SerialIntervalModel::discretized(0.0, 1.0).is_err());
        assert!(SerialIntervalModel::discretized(5.0, -1.0).is_err());
    }
}
