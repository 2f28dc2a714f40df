use thiserror::Error;

use super::trajectory::Trajectory;
use crate::parameters;

/// Problems detected while setting up a disc or a run. Never corrected silently.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Unknown initial condition '{0}'")]
    UnknownField(String),

    #[error("Value of '{field}' is not finite ({value})")]
    NonFiniteValue { field: String, value: f64 },

    #[error("Unknown coefficient '{0}'")]
    UnknownCoefficient(String),

    #[error("Coefficient '{name}' is not finite ({value})")]
    NonFiniteCoefficient { name: String, value: f64 },

    #[error("Unknown disc model '{0}'")]
    UnknownModel(String),

    #[error("Invalid physical constant '{name}': {value}")]
    InvalidConstant { name: String, value: f64 },

    #[error("Invalid simulation setting '{name}': {reason}")]
    InvalidSetting { name: String, reason: String },

    #[error("Error reading parameters")]
    Parameters(#[from] parameters::Error),
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The partial trajectory holds every sample up to the last finite one
    #[error(
        "Numerical instability: state became non-finite after t = {last_valid_t} s ({} valid samples)",
        .partial.len()
    )]
    NumericalInstability {
        last_valid_t: f64,
        partial: Box<Trajectory>,
    },
}
