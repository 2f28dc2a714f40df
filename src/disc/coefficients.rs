use super::error::ConfigError;
use crate::parameters::ParameterMap;

/// Parametric aerodynamic model of a disc mold. Every coefficient function is
/// affine (or quadratic, for drag) in the kinematic inputs.
#[allow(non_snake_case)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoefficientModel {
    pub PL0: f64,
    pub PLa: f64,
    pub PD0: f64,
    pub PDa: f64,
    pub PTxwx: f64,
    pub PTxwz: f64,
    pub PTy0: f64,
    pub PTya: f64,
    pub PTywy: f64,
    pub PTzwz: f64,
    /// Angle of attack of minimum drag
    pub alpha_0: f64,
}

/// Names accepted by [`CoefficientModel::set`], in declaration order
pub const COEFFICIENT_NAMES: [&str; 11] = [
    "PL0", "PLa", "PD0", "PDa", "PTxwx", "PTxwz", "PTy0", "PTya", "PTywy", "PTzwz", "alpha_0",
];

impl Default for CoefficientModel {
    /// Hummel (2003) coefficients
    fn default() -> Self {
        CoefficientModel {
            PL0: 0.33,
            PLa: 1.9,
            PD0: 0.18,
            PDa: 0.69,
            PTxwx: -0.013,
            PTxwz: -0.0017,
            PTy0: -0.082,
            PTya: 0.43,
            PTywy: -0.014,
            PTzwz: -0.000034,
            alpha_0: 4.0_f64.to_radians(),
        }
    }
}

impl CoefficientModel {
    /// Base model with the per-mold lift, drag and pitching parameters replaced
    #[allow(non_snake_case)]
    pub fn mold(PL0: f64, PLa: f64, PD0: f64, PTy0: f64, PTya: f64) -> Self {
        CoefficientModel {
            PL0,
            PLa,
            PD0,
            PTy0,
            PTya,
            ..Default::default()
        }
    }

    pub fn zero() -> Self {
        CoefficientModel {
            PL0: 0.0,
            PLa: 0.0,
            PD0: 0.0,
            PDa: 0.0,
            PTxwx: 0.0,
            PTxwz: 0.0,
            PTy0: 0.0,
            PTya: 0.0,
            PTywy: 0.0,
            PTzwz: 0.0,
            alpha_0: 0.0,
        }
    }

    pub fn lift_coefficient(&self, alpha: f64) -> f64 {
        self.PL0 + self.PLa * alpha
    }

    pub fn drag_coefficient(&self, alpha: f64) -> f64 {
        self.PD0 + self.PDa * (alpha - self.alpha_0).powi(2)
    }

    pub fn x_torque_coefficient(&self, wx: f64, wz: f64) -> f64 {
        self.PTxwx * wx + self.PTxwz * wz
    }

    pub fn y_torque_coefficient(&self, alpha: f64, wy: f64) -> f64 {
        self.PTy0 + self.PTywy * wy + self.PTya * alpha
    }

    pub fn z_torque_coefficient(&self, wz: f64) -> f64 {
        self.PTzwz * wz
    }

    pub fn values(&self) -> [f64; 11] {
        [
            self.PL0,
            self.PLa,
            self.PD0,
            self.PDa,
            self.PTxwx,
            self.PTxwz,
            self.PTy0,
            self.PTya,
            self.PTywy,
            self.PTzwz,
            self.alpha_0,
        ]
    }

    pub fn get(&self, name: &str) -> Result<f64, ConfigError> {
        COEFFICIENT_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values()[i])
            .ok_or_else(|| ConfigError::UnknownCoefficient(name.to_string()))
    }

    /// Sets a single coefficient by name. Does not validate the value.
    pub fn set(&mut self, name: &str, value: f64) -> Result<(), ConfigError> {
        let slot = match name {
            "PL0" => &mut self.PL0,
            "PLa" => &mut self.PLa,
            "PD0" => &mut self.PD0,
            "PDa" => &mut self.PDa,
            "PTxwx" => &mut self.PTxwx,
            "PTxwz" => &mut self.PTxwz,
            "PTy0" => &mut self.PTy0,
            "PTya" => &mut self.PTya,
            "PTywy" => &mut self.PTywy,
            "PTzwz" => &mut self.PTzwz,
            "alpha_0" => &mut self.alpha_0,
            unknown => return Err(ConfigError::UnknownCoefficient(unknown.to_string())),
        };
        *slot = value;
        Ok(())
    }

    /// All coefficients must be finite. No sign constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in COEFFICIENT_NAMES.iter().zip(self.values()) {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteCoefficient {
                    name: name.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }

    /// Starts from `base` and overrides every coefficient present in `params`.
    /// `alpha_0` may be given in degrees as `alpha_0_deg`; a `base` entry names
    /// the parent model and is skipped here.
    pub fn from_params(base: &CoefficientModel, params: &ParameterMap) -> Result<Self, ConfigError> {
        let mut model = *base;

        for (key, tree) in params.iter() {
            if key == "base" {
                continue;
            }
            let value = tree.as_param()?.value_float()?;
            if key == "alpha_0_deg" {
                model.alpha_0 = value.to_radians();
            } else {
                model.set(key, value)?;
            }
        }

        model.validate()?;
        Ok(model)
    }
}
