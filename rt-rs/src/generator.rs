use nalgebra::Vector4;
use rand::{SeedableRng, distr::Distribution, rngs::StdRng};
use rand_distr::Binomial;
use serde::{Deserialize, Serialize};

use crate::error::EpiError;
use crate::integrator::{SeirState, check_state, rk4_step};
use crate::schedule::{TransmissionRate, TransmissionSchedule};

/// Internal integration resolution of the deterministic mode.
const SUBSTEPS_PER_DAY: usize = 20;

/// Compartmental parameters of the SEIR system.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeirParams {
    pub population: u64,
    pub initial_exposed: u64,
    pub initial_infectious: u64,
    /// Mean latent duration in days (1/sigma).
    pub latent_period: f64,
    /// Mean infectious duration in days (1/gamma).
    pub infectious_period: f64,
}

impl SeirParams {
    pub fn validate(&self) -> Result<(), EpiError> {
        if self.population == 0 {
            return Err(EpiError::invalid("population", "must be > 0"));
        }
        if self.latent_period <= 0.0 || !self.latent_period.is_finite() {
            return Err(EpiError::invalid("latent_period", "must be > 0"));
        }
        if self.infectious_period <= 0.0 || !self.infectious_period.is_finite() {
            return Err(EpiError::invalid("infectious_period", "must be > 0"));
        }
        if self.initial_exposed + self.initial_infectious > self.population {
            return Err(EpiError::invalid(
                "initial_exposed",
                "initial compartments exceed the population",
            ));
        }
        Ok(())
    }

    pub(crate) fn initial_state(&self) -> SeirState {
        let e0 = self.initial_exposed as f64;
        let i0 = self.initial_infectious as f64;
        Vector4::new(self.population as f64 - e0 - i0, e0, i0, 0.0)
    }
}

/// How true infections become observed case counts: thinned by the
/// reporting probability and delayed by a fixed infection-to-report PMF
/// over lags 0..delay_pmf.len().
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationModel {
    pub report_probability: f64,
    pub delay_pmf: Vec<f64>,
}

impl ObservationModel {
    /// Everything reported, on the day of infection.
    pub fn complete() -> Self {
        ObservationModel {
            report_probability: 1.0,
            delay_pmf: vec![1.0],
        }
    }

    pub fn validate(&self) -> Result<(), EpiError> {
        if !(self.report_probability > 0.0 && self.report_probability <= 1.0) {
            return Err(EpiError::invalid("report_probability", "must be in (0, 1]"));
        }
        if self.delay_pmf.is_empty() || self.delay_pmf.iter().any(|&m| m < 0.0) {
            return Err(EpiError::invalid("delay_pmf", "must be non-empty and non-negative"));
        }
        let total: f64 = self.delay_pmf.iter().sum();
        if f64::abs(total - 1.0) > 1e-6 {
            return Err(EpiError::invalid("delay_pmf", format!("sums to {total}, not 1")));
        }
        Ok(())
    }
}

/// One reporting step of a simulation run. Compartments are the state at
/// the start of the day; incidence counts infections during the day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StateStep {
    pub step: usize,
    pub susceptible: f64,
    pub exposed: f64,
    pub infectious: f64,
    pub removed: f64,
    pub incidence: u64,
    pub observed: u64,
    pub true_rt: f64,
    pub cumulative_force: f64,
}

/// A completed simulation run: one step per day, immutable once produced.
/// Estimators take the incidence column as a read-only view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationState {
    steps: Vec<StateStep>,
}

impl SimulationState {
    pub fn steps(&self) -> &[StateStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn incidence(&self) -> Vec<u64> {
        self.steps.iter().map(|s| s.incidence).collect()
    }

    pub fn observed(&self) -> Vec<u64> {
        self.steps.iter().map(|s| s.observed).collect()
    }

    pub fn true_rt(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.true_rt).collect()
    }
}

/// Simulates an SEIR epidemic under a transmission schedule and emits
/// incidence, observed cases, and the analytic true Rt per day.
pub struct EpidemicGenerator {
    params: SeirParams,
    schedule: TransmissionSchedule,
    observation: ObservationModel,
    horizon: usize,
}

impl EpidemicGenerator {
    pub fn new(
        params: SeirParams,
        schedule: TransmissionSchedule,
        observation: ObservationModel,
        horizon: usize,
    ) -> Result<Self, EpiError> {
        params.validate()?;
        observation.validate()?;
        if horizon == 0 {
            return Err(EpiError::invalid("horizon", "must be >= 1"));
        }
        Ok(EpidemicGenerator {
            params,
            schedule,
            observation,
            horizon,
        })
    }

    fn true_rt(&self, t: f64, susceptible: f64) -> f64 {
        self.schedule.rate(t) * self.params.infectious_period * susceptible
            / self.params.population as f64
    }

    /// Continuous-time SEIR integrated on a fine internal step; incidence is
    /// the accumulated S->E flux per day, rounded to whole cases.
    pub fn run_deterministic(&self) -> Result<SimulationState, EpiError> {
        let p = &self.params;
        let n = p.population as f64;
        let sigma = 1.0 / p.latent_period;
        let gamma = 1.0 / p.infectious_period;
        let dt = 1.0 / SUBSTEPS_PER_DAY as f64;

        let mut y = p.initial_state();
        let mut cumulative_force = 0.0;
        let mut steps = Vec::with_capacity(self.horizon);
        let mut incidence = Vec::with_capacity(self.horizon);
        for day in 0..self.horizon {
            let t = day as f64;
            let day_start = y;
            for sub in 0..SUBSTEPS_PER_DAY {
                let ts = t + sub as f64 * dt;
                // Midpoint force of infection for the cumulative diagnostic.
                cumulative_force +=
                    self.schedule.rate(ts + dt / 2.0) * y[2] / n * dt;
                y = rk4_step(&self.schedule, sigma, gamma, n, ts, &y, dt);
                check_state(ts + dt, n, &y)?;
            }
            // New infections over the day equal the drop in susceptibles.
            let new_infections = (day_start[0] - y[0]).max(0.0).round() as u64;
            incidence.push(new_infections);
            steps.push(StateStep {
                step: day,
                susceptible: day_start[0],
                exposed: day_start[1],
                infectious: day_start[2],
                removed: day_start[3],
                incidence: new_infections,
                observed: 0,
                true_rt: self.true_rt(t, day_start[0]),
                cumulative_force,
            });
        }
        let observed = self.observe_deterministic(&incidence);
        for (step, obs) in steps.iter_mut().zip(observed) {
            step.observed = obs;
        }
        Ok(SimulationState { steps })
    }

    /// Discrete-time chain-binomial SEIR, reproducible from the seed.
    ///
    /// Transitions are drawn per sub-daily step on the same internal
    /// resolution as the deterministic mode; one-day geometric waiting
    /// times would stretch the realized latent/infectious durations well
    /// past the nominal 1/sigma and 1/gamma and bias the dynamics away
    /// from the reported true Rt.
    pub fn run_stochastic(&self, seed: u64) -> Result<SimulationState, EpiError> {
        let p = &self.params;
        let n = p.population as f64;
        let sigma = 1.0 / p.latent_period;
        let gamma = 1.0 / p.infectious_period;
        let dt = 1.0 / SUBSTEPS_PER_DAY as f64;
        let mut rng = StdRng::seed_from_u64(seed);

        let p_progress = 1.0 - f64::exp(-sigma * dt);
        let p_remove = 1.0 - f64::exp(-gamma * dt);
        let mut s = p.population - p.initial_exposed - p.initial_infectious;
        let mut e = p.initial_exposed;
        let mut i = p.initial_infectious;
        let mut r = 0u64;
        let mut cumulative_force = 0.0;
        let mut steps = Vec::with_capacity(self.horizon);
        let mut incidence = Vec::with_capacity(self.horizon);
        for day in 0..self.horizon {
            let t = day as f64;
            let day_start = (s, e, i, r);
            let mut new_e_day = 0u64;
            for sub in 0..SUBSTEPS_PER_DAY {
                let ts = t + sub as f64 * dt;
                let force = self.schedule.rate(ts) * i as f64 / n * dt;
                cumulative_force += force;

                let new_e = binomial_draw(&mut rng, s, 1.0 - f64::exp(-force));
                let new_i = binomial_draw(&mut rng, e, p_progress);
                let new_r = binomial_draw(&mut rng, i, p_remove);
                s -= new_e;
                e = e + new_e - new_i;
                i = i + new_i - new_r;
                r += new_r;
                new_e_day += new_e;
            }

            steps.push(StateStep {
                step: day,
                susceptible: day_start.0 as f64,
                exposed: day_start.1 as f64,
                infectious: day_start.2 as f64,
                removed: day_start.3 as f64,
                incidence: new_e_day,
                observed: 0,
                true_rt: self.true_rt(t, day_start.0 as f64),
                cumulative_force,
            });
            incidence.push(new_e_day);
        }
        let observed = self.observe_stochastic(&incidence, &mut rng);
        for (step, obs) in steps.iter_mut().zip(observed) {
            step.observed = obs;
        }
        Ok(SimulationState { steps })
    }

    /// Expected observed counts: thin, convolve with the delay PMF, round.
    fn observe_deterministic(&self, incidence: &[u64]) -> Vec<u64> {
        let mut expected = vec![0.0; incidence.len()];
        for (day, &cases) in incidence.iter().enumerate() {
            let reported = cases as f64 * self.observation.report_probability;
            for (delay, &mass) in self.observation.delay_pmf.iter().enumerate() {
                if day + delay < expected.len() {
                    expected[day + delay] += reported * mass;
                }
            }
        }
        expected.iter().map(|&v| v.round() as u64).collect()
    }

    /// Thin each day's cases binomially, then split the survivors across
    /// delays by sequential binomials over the residual mass.
    fn observe_stochastic(&self, incidence: &[u64], rng: &mut StdRng) -> Vec<u64> {
        let mut observed = vec![0u64; incidence.len()];
        for (day, &cases) in incidence.iter().enumerate() {
            if cases == 0 {
                continue;
            }
            let reported = binomial_draw(rng, cases, self.observation.report_probability);
            let mut residual_mass = 1.0;
            let mut assigned = 0;
            for (delay, &mass) in self.observation.delay_pmf.iter().enumerate() {
                if day + delay >= observed.len() || reported == assigned {
                    break;
                }
                let draws =
                    binomial_draw(rng, reported - assigned, mass / residual_mass);
                observed[day + delay] += draws;
                assigned += draws;
                residual_mass -= mass;
            }
        }
        observed
    }
}

fn binomial_draw(rng: &mut StdRng, n: u64, p: f64) -> u64 {
    if n == 0 {
        return 0;
    }
    let p = p.clamp(0.0, 1.0);
    Binomial::new(n, p).unwrap().sample(rng)
}
