//! Estimators for the time-varying effective reproduction number (Rt),
//! scored against a synthetic SEIR ground truth.
//!
//! The generator produces incidence, observed cases, and the analytic true
//! Rt under a piecewise transmission schedule; the sliding-window and
//! backward-cohort estimators recover Rt from the incidence column; the
//! case-reproduction integrator provides a deterministic reference driven
//! by the same schedule. All outputs share a per-day step index and can be
//! joined with [`estimate::comparison_table`].

pub mod cache;
pub mod cohort;
pub mod config;
pub mod cori;
pub mod error;
pub mod estimate;
pub mod generator;
pub mod integrator;
pub mod schedule;
pub mod serial_interval;

pub use cache::{CacheKey, EstimateCache, cache_key};
pub use cohort::BackwardCohortEstimator;
pub use config::{EstimationWindow, EstimatorConfig, WindowAlignment};
pub use cori::{GammaPrior, SlidingWindowEstimator};
pub use error::EpiError;
pub use estimate::{Credible, Method, RtEstimate, comparison_table};
pub use generator::{EpidemicGenerator, ObservationModel, SeirParams, SimulationState};
pub use integrator::CaseReproductionIntegrator;
pub use schedule::{Breakpoint, TransmissionRate, TransmissionSchedule};
pub use serial_interval::SerialIntervalModel;
