use crate::estimate::Method;

/// Errors raised by the generator, the estimators, and the integrator.
///
/// All four kinds are raised at the point of detection; callers decide
/// whether to skip a time point or abort the run.
#[derive(Debug, thiserror::Error)]
pub enum EpiError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("{method}: series of {available} steps is shorter than the {required}-step window")]
    InsufficientHistory {
        method: Method,
        required: usize,
        available: usize,
    },

    #[error("{method}: no later incidence after step {step} to attribute from")]
    EmptyFutureWindow { method: Method, step: usize },

    #[error("integration unstable at t = {t}: {reason}")]
    IntegrationInstability { t: f64, reason: String },
}

impl EpiError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        EpiError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
