use core::f64;
use std::{collections::BTreeMap, str::FromStr};

use nalgebra::{SVector, Vector3};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use super::error::ConfigError;
use crate::parameters::ParameterMap;

pub const STATE_SIZE: usize = 12;

/// Names of the state components, in state-vector order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString, AsRefStr, Display, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum StateField {
    X,
    Y,
    Z,
    Vx,
    Vy,
    Vz,
    Phi,
    Theta,
    Gamma,
    Wx,
    Wy,
    Wz,
}

impl StateField {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        StateField::from_str(name).map_err(|_| ConfigError::UnknownField(name.to_string()))
    }
}

/// Full kinematic state: position and velocity in the lab frame (n), Euler
/// angles, and angular velocity in the non-spinning disc frame (d).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DiscState(pub SVector<f64, STATE_SIZE>);

impl DiscState {
    pub fn new(
        pos_n_m: Vector3<f64>,
        vel_n_m_s: Vector3<f64>,
        angles_rad: Vector3<f64>,
        angvel_d_rad_s: Vector3<f64>,
    ) -> Self {
        let mut state = DiscState::default();
        state.set_pos_n_m(&pos_n_m);
        state.set_vel_n_m_s(&vel_n_m_s);
        state.set_angles_rad(&angles_rad);
        state.set_angvel_d_rad_s(&angvel_d_rad_s);
        state
    }

    pub fn get(&self, field: StateField) -> f64 {
        self.0[field.index()]
    }

    pub fn set(&mut self, field: StateField, value: f64) {
        self.0[field.index()] = value;
    }

    pub fn pos_n_m(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(0).clone_owned()
    }

    pub fn vel_n_m_s(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(3).clone_owned()
    }

    /// (phi, theta, gamma)
    pub fn angles_rad(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(6).clone_owned()
    }

    pub fn angvel_d_rad_s(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(9).clone_owned()
    }

    pub fn phi(&self) -> f64 {
        self.get(StateField::Phi)
    }

    pub fn theta(&self) -> f64 {
        self.get(StateField::Theta)
    }

    pub fn set_pos_n_m(&mut self, pos_n: &Vector3<f64>) {
        self.0.fixed_rows_mut::<3>(0).set_column(0, pos_n);
    }

    pub fn set_vel_n_m_s(&mut self, vel_n: &Vector3<f64>) {
        self.0.fixed_rows_mut::<3>(3).set_column(0, vel_n);
    }

    pub fn set_angles_rad(&mut self, angles: &Vector3<f64>) {
        self.0.fixed_rows_mut::<3>(6).set_column(0, angles);
    }

    pub fn set_angvel_d_rad_s(&mut self, angvel_d: &Vector3<f64>) {
        self.0.fixed_rows_mut::<3>(9).set_column(0, angvel_d);
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// First component that is NaN or infinite, if any
    pub fn first_non_finite(&self) -> Option<StateField> {
        StateField::iter().find(|f| !self.get(*f).is_finite())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalConstants {
    pub mass_kg: f64,
    pub area_m2: f64,
    pub diameter_m: f64,
    pub air_density_kg_m3: f64,
    pub g_m_s2: f64,
    /// Moment of inertia about the transverse axes
    pub i_xx_kgm2: f64,
    /// Moment of inertia about the spin axis
    pub i_zz_kgm2: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        let area_m2 = 0.058556;
        PhysicalConstants {
            mass_kg: 0.175,
            area_m2,
            diameter_m: diameter_from_area(area_m2),
            air_density_kg_m3: 1.225,
            g_m_s2: 9.81,
            i_xx_kgm2: 0.001219,
            i_zz_kgm2: 0.002352,
        }
    }
}

pub fn diameter_from_area(area_m2: f64) -> f64 {
    2.0 * (area_m2 / f64::consts::PI).sqrt()
}

impl PhysicalConstants {
    /// Reads the constants from a `disc` parameter map. Missing entries keep
    /// their default value; the diameter follows the area unless given.
    pub fn from_params(params: &ParameterMap) -> Result<Self, ConfigError> {
        let d = PhysicalConstants::default();

        let area_m2 = params.get_float_or("area", d.area_m2)?;
        let constants = PhysicalConstants {
            mass_kg: params.get_float_or("mass", d.mass_kg)?,
            area_m2,
            diameter_m: params.get_float_or("diameter", diameter_from_area(area_m2))?,
            air_density_kg_m3: params.get_float_or("air_density", d.air_density_kg_m3)?,
            g_m_s2: params.get_float_or("g", d.g_m_s2)?,
            i_xx_kgm2: params.get_float_or("i_xx", d.i_xx_kgm2)?,
            i_zz_kgm2: params.get_float_or("i_zz", d.i_zz_kgm2)?,
        };

        constants.validate()?;
        Ok(constants)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("mass", self.mass_kg),
            ("area", self.area_m2),
            ("diameter", self.diameter_m),
            ("air_density", self.air_density_kg_m3),
            ("i_xx", self.i_xx_kgm2),
            ("i_zz", self.i_zz_kgm2),
        ];

        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidConstant {
                    name: name.to_string(),
                    value,
                });
            }
        }

        // Zero gravity is allowed
        if !self.g_m_s2.is_finite() {
            return Err(ConfigError::InvalidConstant {
                name: "g".to_string(),
                value: self.g_m_s2,
            });
        }

        Ok(())
    }
}

/// Defaults snapshot plus the overrides currently applied on top of it.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialConditions {
    defaults: DiscState,
    overrides: BTreeMap<StateField, f64>,
}

impl Default for InitialConditions {
    fn default() -> Self {
        let mut defaults = DiscState::default();
        defaults.set(StateField::Z, 1.0);
        defaults.set(StateField::Vx, 10.0);
        defaults.set(StateField::Wz, 62.0);

        InitialConditions::new(defaults)
    }
}

impl InitialConditions {
    pub fn new(defaults: DiscState) -> Self {
        InitialConditions {
            defaults,
            overrides: BTreeMap::new(),
        }
    }

    pub fn defaults(&self) -> &DiscState {
        &self.defaults
    }

    pub fn overrides(&self) -> &BTreeMap<StateField, f64> {
        &self.overrides
    }

    /// Conditions for the next run: defaults with the overrides applied
    pub fn current(&self) -> DiscState {
        let mut state = self.defaults.clone();
        for (field, value) in &self.overrides {
            state.set(*field, *value);
        }
        state
    }

    /// Merges `overrides` into the defaults snapshot. Nothing is changed if any
    /// name or value is rejected.
    pub fn set_defaults(&mut self, overrides: &[(&str, f64)]) -> Result<(), ConfigError> {
        for (field, value) in Self::parse_overrides(overrides)? {
            self.defaults.set(field, value);
        }
        Ok(())
    }

    /// Overrides the current conditions without touching the defaults
    pub fn set_current(&mut self, overrides: &[(&str, f64)]) -> Result<(), ConfigError> {
        self.overrides.extend(Self::parse_overrides(overrides)?);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.overrides.clear();
    }

    /// Reads defaults overrides from an `init` parameter map
    pub fn from_params(params: &ParameterMap) -> Result<Self, ConfigError> {
        let mut values = Vec::new();
        for (key, tree) in params.iter() {
            values.push((key.as_str(), tree.as_param()?.value_float()?));
        }

        let mut init = InitialConditions::default();
        init.set_defaults(&values)?;
        Ok(init)
    }

    fn parse_overrides(overrides: &[(&str, f64)]) -> Result<Vec<(StateField, f64)>, ConfigError> {
        overrides
            .iter()
            .map(|(name, value)| {
                let field = StateField::parse(name)?;
                if value.is_finite() {
                    Ok((field, *value))
                } else {
                    Err(ConfigError::NonFiniteValue {
                        field: field.to_string(),
                        value: *value,
                    })
                }
            })
            .collect()
    }
}
