use rand::{SeedableRng, distr::Distribution, rngs::StdRng};
use rand_distr::Poisson;
use rayon::prelude::*;

use crate::error::EpiError;
use crate::estimate::{Credible, Method, RtEstimate};
use crate::serial_interval::SerialIntervalModel;

/// Serial-interval mass that must still fit inside the observed horizon for
/// a step's cohort estimate to be considered stable. Tail steps below this
/// coverage are reported missing rather than as a shrinking underestimate.
const TAIL_COVERAGE: f64 = 0.95;

/// Backward cohort (case) Rt estimator.
///
/// Each later case is apportioned backward across its plausible infection
/// times in proportion to the relative force of infection each past step
/// contributed; the cohort Rt at step t is the expected number of
/// descendants per case at t. Uncertainty comes from Poisson-resampling the
/// incidence series `resample_count` times and taking empirical percentiles
/// across replicates; there is no closed-form variance.
pub struct BackwardCohortEstimator {
    resample_count: usize,
    confidence_level: f64,
    seed: u64,
}

impl BackwardCohortEstimator {
    pub fn new(resample_count: usize, confidence_level: f64, seed: u64) -> Result<Self, EpiError> {
        if resample_count < 1 {
            return Err(EpiError::invalid("resample_count", "must be >= 1"));
        }
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(EpiError::invalid("confidence_level", "must be in (0, 1)"));
        }
        Ok(BackwardCohortEstimator {
            resample_count,
            confidence_level,
            seed,
        })
    }

    /// Cohort point estimate per step, without resampling. `None` marks
    /// tail steps whose remaining horizon covers too little serial-interval
    /// mass to attribute from.
    pub fn point_estimate(
        &self,
        incidence: &[u64],
        si: &SerialIntervalModel,
    ) -> Result<Vec<Option<f64>>, EpiError> {
        if incidence.len() < 2 || incidence.iter().skip(1).all(|&c| c == 0) {
            return Err(EpiError::EmptyFutureWindow {
                method: Method::BackwardCohort,
                step: 0,
            });
        }
        Ok(cohort_curve(incidence, si))
    }

    pub fn estimate(
        &self,
        incidence: &[u64],
        si: &SerialIntervalModel,
    ) -> Result<Vec<RtEstimate>, EpiError> {
        let point = self.point_estimate(incidence, si)?;

        // Independent replicates with replicate-local generators; indexed
        // collection keeps the aggregation order deterministic under rayon.
        let replicates: Vec<Vec<Option<f64>>> = (0..self.resample_count)
            .into_par_iter()
            .map(|replicate| {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(replicate as u64));
                let resampled = resample_poisson(incidence, &mut rng);
                cohort_curve(&resampled, si)
            })
            .collect();

        let tail = (1.0 - self.confidence_level) / 2.0;
        let estimates = (0..incidence.len())
            .map(|step| {
                let value = point[step].map(|_| {
                    let mut draws: Vec<f64> = replicates
                        .iter()
                        .filter_map(|r| r[step])
                        .collect();
                    let mean = draws.iter().sum::<f64>() / draws.len() as f64;
                    draws.sort_by(f64::total_cmp);
                    Credible {
                        mean,
                        lower: percentile(&draws, tail),
                        upper: percentile(&draws, 1.0 - tail),
                    }
                });
                RtEstimate {
                    step,
                    method: Method::BackwardCohort,
                    value,
                }
            })
            .collect();
        Ok(estimates)
    }
}

/// The renewal-equation backward attribution. Each step u > t receives
/// incidence(u) * pmf(u - t) / force(u) descendants per case at t; steps u
/// with zero force carry unattributable cases and contribute nothing.
fn cohort_curve(incidence: &[u64], si: &SerialIntervalModel) -> Vec<Option<f64>> {
    let len = incidence.len();
    let force: Vec<f64> = (0..len).map(|u| si.force_of_infection(incidence, u)).collect();
    (0..len)
        .map(|t| {
            let available: f64 = (1..=usize::min(si.max_lag(), len - 1 - t))
                .map(|lag| si.pmf(lag))
                .sum();
            if available < TAIL_COVERAGE {
                return None;
            }
            let mut r = 0.0;
            for u in (t + 1)..usize::min(len, t + si.max_lag() + 1) {
                if incidence[u] > 0 && force[u] > 0.0 {
                    r += incidence[u] as f64 * si.pmf(u - t) / force[u];
                }
            }
            Some(r)
        })
        .collect()
}

fn resample_poisson(incidence: &[u64], rng: &mut StdRng) -> Vec<u64> {
    incidence
        .iter()
        .map(|&mean| {
            if mean == 0 {
                0
            } else {
                Poisson::new(mean as f64).unwrap().sample(rng) as u64
            }
        })
        .collect()
}

/// Nearest-rank percentile of an ascending-sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[idx]
}
