use epi_rt::{
    Breakpoint, EpiError, EpidemicGenerator, EstimatorConfig, ObservationModel, SeirParams,
    TransmissionSchedule,
};
use serde::Deserialize;

fn default_dt() -> f64 {
    0.05
}

fn default_observation() -> ObservationModel {
    ObservationModel::complete()
}

/// One comparison run: an epidemic to simulate and the estimator settings
/// to recover its Rt with.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub population: u64,
    pub initial_exposed: u64,
    pub initial_infectious: u64,
    /// Mean latent duration, days.
    pub latent_period: f64,
    /// Mean infectious duration, days.
    pub infectious_period: f64,
    /// Basic reproduction number; the baseline transmission rate is
    /// r0 / infectious_period.
    pub r0: f64,
    pub horizon: usize,
    #[serde(default)]
    pub stochastic: bool,
    #[serde(default)]
    pub interventions: Vec<Breakpoint>,
    #[serde(default = "default_observation")]
    pub observation: ObservationModel,
    #[serde(default = "default_dt")]
    pub integration_dt: f64,
    pub estimator: EstimatorConfig,
}

impl Scenario {
    pub fn seir_params(&self) -> SeirParams {
        SeirParams {
            population: self.population,
            initial_exposed: self.initial_exposed,
            initial_infectious: self.initial_infectious,
            latent_period: self.latent_period,
            infectious_period: self.infectious_period,
        }
    }

    pub fn schedule(&self) -> Result<TransmissionSchedule, EpiError> {
        if self.r0 <= 0.0 {
            return Err(EpiError::InvalidParameter {
                name: "r0",
                reason: "must be > 0".to_string(),
            });
        }
        TransmissionSchedule::new(self.r0 / self.infectious_period, self.interventions.clone())
    }

    pub fn generator(&self) -> Result<EpidemicGenerator, EpiError> {
        EpidemicGenerator::new(
            self.seir_params(),
            self.schedule()?,
            self.observation.clone(),
            self.horizon,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_from_toml() {
        let scenario: Scenario = toml::from_str(
            r#"
            population = 1000000
            initial_exposed = 50
            initial_infectious = 50
            latent_period = 3.0
            infectious_period = 4.0
            r0 = 2.0
            horizon = 120
            stochastic = true

            [[interventions]]
            time = 40.0
            multiplier = 0.5

            [estimator]
            window_width = 7
            window_alignment = "end"
            serial_interval_mean = 7.0
            serial_interval_sd = 5.0
            "#,
        )
        .unwrap();
        assert!(scenario.stochastic);
        assert_eq!(scenario.interventions.len(), 1);
        assert_eq!(scenario.estimator.resample_count, 500);
        let schedule = scenario.schedule().unwrap();
        assert!((schedule.baseline() - 0.5).abs() < 1e-12);
        scenario.generator().unwrap();
    }

    #[test]
    fn test_bad_r0_rejected() {
        let mut scenario: Scenario = serde_json::from_str(
            r#"{
                "population": 1000, "initial_exposed": 1, "initial_infectious": 1,
                "latent_period": 3.0, "infectious_period": 4.0, "r0": 2.0,
                "horizon": 30,
                "estimator": {
                    "window_width": 7, "window_alignment": "end",
                    "serial_interval_mean": 7.0, "serial_interval_sd": 5.0
                }
            }"#,
        )
        .unwrap();
        scenario.r0 = 0.0;
        assert!(scenario.schedule().is_err());
    }
}
