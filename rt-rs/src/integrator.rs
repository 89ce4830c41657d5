use nalgebra::Vector4;

use crate::error::EpiError;
use crate::estimate::{Credible, Method, RtEstimate};
use crate::generator::SeirParams;
use crate::schedule::TransmissionRate;

/// SEIR state ordered (S, E, I, R).
pub(crate) type SeirState = Vector4<f64>;

pub(crate) fn seir_derivative(
    rate: f64,
    sigma: f64,
    gamma: f64,
    population: f64,
    y: &SeirState,
) -> SeirState {
    let infection_flux = rate * y[0] * y[2] / population;
    Vector4::new(
        -infection_flux,
        infection_flux - sigma * y[1],
        sigma * y[1] - gamma * y[2],
        gamma * y[2],
    )
}

/// One classical RK4 step of the SEIR system.
pub(crate) fn rk4_step<R: TransmissionRate + ?Sized>(
    rate_fn: &R,
    sigma: f64,
    gamma: f64,
    population: f64,
    t: f64,
    y: &SeirState,
    dt: f64,
) -> SeirState {
    let k1 = seir_derivative(rate_fn.rate(t), sigma, gamma, population, y);
    let y2 = y + k1 * (dt / 2.0);
    let k2 = seir_derivative(rate_fn.rate(t + dt / 2.0), sigma, gamma, population, &y2);
    let y3 = y + k2 * (dt / 2.0);
    let k3 = seir_derivative(rate_fn.rate(t + dt / 2.0), sigma, gamma, population, &y3);
    let y4 = y + k3 * dt;
    let k4 = seir_derivative(rate_fn.rate(t + dt), sigma, gamma, population, &y4);
    y + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
}

pub(crate) fn check_state(t: f64, population: f64, y: &SeirState) -> Result<(), EpiError> {
    if y.iter().any(|v| !v.is_finite()) {
        return Err(EpiError::IntegrationInstability {
            t,
            reason: "compartment value is not finite".to_string(),
        });
    }
    if y.min() < -1e-6 * population {
        return Err(EpiError::IntegrationInstability {
            t,
            reason: format!("compartment went negative ({:.3e})", y.min()),
        });
    }
    Ok(())
}

/// Deterministic reference Rt by forward integration of the SEIR ODEs.
///
/// Integrates at a fine fixed step and samples the case reproduction number
/// rate(t) x infectious_period x S(t)/N once per day, on the same time base
/// as the generator's output. Consumes only the rate function and the
/// compartmental parameters, never observed incidence.
pub struct CaseReproductionIntegrator<'a, R: TransmissionRate + ?Sized> {
    rate_fn: &'a R,
    params: SeirParams,
    horizon: usize,
    substeps_per_day: usize,
}

impl<'a, R: TransmissionRate + ?Sized> CaseReproductionIntegrator<'a, R> {
    /// `dt` is the integration step in days; it is rounded down to an exact
    /// integer division of one day so that samples land on day boundaries.
    pub fn new(
        rate_fn: &'a R,
        params: SeirParams,
        horizon: usize,
        dt: f64,
    ) -> Result<Self, EpiError> {
        params.validate()?;
        if !(dt > 0.0 && dt <= 1.0) {
            return Err(EpiError::invalid("integration_dt", "must be in (0, 1]"));
        }
        if horizon == 0 {
            return Err(EpiError::invalid("horizon", "must be >= 1"));
        }
        Ok(CaseReproductionIntegrator {
            rate_fn,
            params,
            horizon,
            substeps_per_day: (1.0 / dt).ceil() as usize,
        })
    }

    pub fn run(&self) -> Result<Vec<RtEstimate>, EpiError> {
        let p = &self.params;
        let n = p.population as f64;
        let sigma = 1.0 / p.latent_period;
        let gamma = 1.0 / p.infectious_period;
        let dt = 1.0 / self.substeps_per_day as f64;

        let mut y = p.initial_state();
        let mut out = Vec::with_capacity(self.horizon);
        for day in 0..self.horizon {
            let t = day as f64;
            let rc = self.rate_fn.rate(t) * p.infectious_period * y[0] / n;
            out.push(RtEstimate {
                step: day,
                method: Method::CaseReproduction,
                value: Some(Credible::point(rc)),
            });
            for sub in 0..self.substeps_per_day {
                let ts = t + sub as f64 * dt;
                y = rk4_step(self.rate_fn, sigma, gamma, n, ts, &y, dt);
                check_state(ts + dt, n, &y)?;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::TransmissionSchedule;

    fn params() -> SeirParams {
        SeirParams {
            population: 1_000_000,
            initial_exposed: 100,
            initial_infectious: 100,
            latent_period: 3.0,
            infectious_period: 4.0,
        }
    }

    fn final_rc(dt: f64) -> f64 {
        let schedule = TransmissionSchedule::constant(0.375).unwrap();
        let integrator = CaseReproductionIntegrator::new(&schedule, params(), 60, dt).unwrap();
        let out = integrator.run().unwrap();
        out.last().unwrap().value.unwrap().mean
    }

    #[test]
    fn test_converges_under_step_refinement() {
        // Three halvings from dt = 0.2; RK4 should be far inside 1e-4.
        let reference = final_rc(0.025);
        let mut dt = 0.2;
        for _ in 0..3 {
            dt /= 2.0;
        }
        let refined = final_rc(dt);
        assert!(f64::abs(refined - reference) / reference < 1e-4);
        let coarse = final_rc(0.2);
        assert!(f64::abs(coarse - reference) / reference < 1e-3);
    }

    #[test]
    fn test_initial_rc_matches_r0_scaled_by_susceptibles() {
        let schedule = TransmissionSchedule::constant(0.375).unwrap();
        let integrator = CaseReproductionIntegrator::new(&schedule, params(), 10, 0.05).unwrap();
        let out = integrator.run().unwrap();
        let p = params();
        let s0 = (p.population - p.initial_exposed - p.initial_infectious) as f64;
        let expected = 0.375 * p.infectious_period * s0 / p.population as f64;
        assert!(f64::abs(out[0].value.unwrap().mean - expected) < 1e-12);
    }

    #[test]
    fn test_rejects_bad_step() {
        let schedule = TransmissionSchedule::constant(0.375).unwrap();
        assert!(CaseReproductionIntegrator::new(&schedule, params(), 60, 0.0).is_err());
        assert!(CaseReproductionIntegrator::new(&schedule, params(), 60, 2.0).is_err());
        assert!(CaseReproductionIntegrator::new(&schedule, params(), 0, 0.1).is_err());
    }

    #[test]
    fn test_divergent_rate_reported_as_instability() {
        // A wildly negative rate drives S above N and E negative.
        let bad = |_t: f64| -50.0;
        let integrator = CaseReproductionIntegrator::new(&bad, params(), 60, 0.5).unwrap();
        match integrator.run() {
            Err(EpiError::IntegrationInstability { .. }) => {}
            other => panic!("expected IntegrationInstability, got {other:?}"),
        }
    }
}
