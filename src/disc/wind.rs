use nalgebra::Vector3;

use super::error::ConfigError;
use crate::parameters::ParameterMap;

/// Wind velocity in the lab frame as a function of time
pub trait WindModel {
    fn velocity_n(&self, t: f64) -> Vector3<f64>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CalmWind;

impl WindModel for CalmWind {
    fn velocity_n(&self, _t: f64) -> Vector3<f64> {
        Vector3::zeros()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConstantWind {
    pub vel_n_m_s: Vector3<f64>,
}

impl WindModel for ConstantWind {
    fn velocity_n(&self, _t: f64) -> Vector3<f64> {
        self.vel_n_m_s
    }
}

/// Wind changing linearly in time, `w0 + rate * t`
#[derive(Debug, Clone, Copy)]
pub struct RampWind {
    pub vel0_n_m_s: Vector3<f64>,
    pub rate_n_m_s2: Vector3<f64>,
}

impl WindModel for RampWind {
    fn velocity_n(&self, t: f64) -> Vector3<f64> {
        self.vel0_n_m_s + self.rate_n_m_s2 * t
    }
}

/// Builds the wind from a `wind` parameter map: `velocity` (float[3]) and an
/// optional `rate` (float[3]). An empty map is calm air.
pub fn wind_from_params(params: &ParameterMap) -> Result<Box<dyn WindModel + Send + Sync>, ConfigError> {
    let velocity = params
        .get_param_opt("velocity")?
        .map(|p| p.value_float_n::<3>())
        .transpose()?;
    let rate = params
        .get_param_opt("rate")?
        .map(|p| p.value_float_n::<3>())
        .transpose()?;

    for (name, v) in [("velocity", velocity), ("rate", rate)] {
        if let Some(v) = v {
            if v.iter().any(|c| !c.is_finite()) {
                return Err(ConfigError::InvalidSetting {
                    name: format!("wind.{name}"),
                    reason: "components must be finite".to_string(),
                });
            }
        }
    }

    let wind: Box<dyn WindModel + Send + Sync> = match (velocity, rate) {
        (None, None) => Box::new(CalmWind),
        (Some(v), None) => Box::new(ConstantWind {
            vel_n_m_s: Vector3::from(v),
        }),
        (v, Some(rate)) => Box::new(RampWind {
            vel0_n_m_s: v.map(Vector3::from).unwrap_or_else(Vector3::zeros),
            rate_n_m_s2: Vector3::from(rate),
        }),
    };

    Ok(wind)
}
