use log::{debug, info};

use super::{
    coefficients::CoefficientModel,
    disc_data::{DiscState, InitialConditions, PhysicalConstants},
    eom::DiscEom,
    error::{ConfigError, SimError},
    integrator::{IntegratorConfig, TrajectoryIntegrator},
    presets::ModelRegistry,
    trajectory::Trajectory,
    wind::{CalmWind, WindModel, wind_from_params},
};
use crate::parameters::ParameterMap;

/// A disc ready to be thrown: physical data, aerodynamic model, wind,
/// initial conditions and integrator settings. Each call to
/// [`Disc::compute_trajectory`] is an independent run.
pub struct Disc {
    name: String,
    constants: PhysicalConstants,
    model: CoefficientModel,
    wind: Box<dyn WindModel + Send + Sync>,
    initial_conditions: InitialConditions,
    integrator: IntegratorConfig,
}

impl Disc {
    pub fn new(
        name: &str,
        model: CoefficientModel,
        constants: PhysicalConstants,
    ) -> Result<Self, ConfigError> {
        model.validate()?;
        constants.validate()?;

        Ok(Disc {
            name: name.to_string(),
            constants,
            model,
            wind: Box::new(CalmWind),
            initial_conditions: InitialConditions::default(),
            integrator: IntegratorConfig::default(),
        })
    }

    /// Disc with default physical constants and a builtin mold
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        Self::from_registry(&ModelRegistry::builtin(), name)
    }

    pub fn from_registry(registry: &ModelRegistry, name: &str) -> Result<Self, ConfigError> {
        Self::new(name, *registry.get(name)?, PhysicalConstants::default())
    }

    /// Builds a disc from the whole parameter tree: `disc.*` for the disc and
    /// `sim.*` for the integrator. `disc.model` is looked up in `registry`,
    /// which is expected to already hold the `models.*` entries
    /// (see [`ModelRegistry::from_params`]).
    pub fn from_params(params: &ParameterMap, registry: &ModelRegistry) -> Result<Self, ConfigError> {
        let disc_params = params.get_map_opt("disc")?.cloned().unwrap_or_default();
        let sim_params = params.get_map_opt("sim")?.cloned().unwrap_or_default();

        let model_name = disc_params.get_string_or("model", "default")?;
        let model = *registry.get(&model_name)?;
        let constants = PhysicalConstants::from_params(&disc_params)?;

        let mut disc = Disc::new(&model_name, model, constants)?;

        if let Some(init) = disc_params.get_map_opt("init")? {
            disc.initial_conditions = InitialConditions::from_params(init)?;
        }
        if let Some(wind) = disc_params.get_map_opt("wind")? {
            disc.wind = wind_from_params(wind)?;
        }
        disc.integrator = IntegratorConfig::from_params(&sim_params)?;

        debug!(
            "Disc '{}': {:?}, {:?}",
            disc.name, disc.constants, disc.model
        );

        Ok(disc)
    }

    pub fn with_wind(mut self, wind: Box<dyn WindModel + Send + Sync>) -> Self {
        self.wind = wind;
        self
    }

    /// Same disc with a different aerodynamic model
    pub fn with_model(mut self, name: &str, model: CoefficientModel) -> Result<Self, ConfigError> {
        model.validate()?;
        self.name = name.to_string();
        self.model = model;
        Ok(self)
    }

    pub fn with_integrator(mut self, config: IntegratorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        self.integrator = config;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constants(&self) -> &PhysicalConstants {
        &self.constants
    }

    pub fn model(&self) -> &CoefficientModel {
        &self.model
    }

    pub fn integrator_config(&self) -> &IntegratorConfig {
        &self.integrator
    }

    /// Merges `overrides` into the stored defaults. Rejected as a whole if any
    /// name is not a state field or any value is not finite.
    pub fn set_default_initial_conditions(
        &mut self,
        overrides: &[(&str, f64)],
    ) -> Result<(), ConfigError> {
        self.initial_conditions.set_defaults(overrides)
    }

    /// Overrides the conditions of the next runs, until reset
    pub fn set_initial_conditions(&mut self, overrides: &[(&str, f64)]) -> Result<(), ConfigError> {
        self.initial_conditions.set_current(overrides)
    }

    pub fn reset_initial_conditions(&mut self) {
        self.initial_conditions.reset();
    }

    pub fn initial_conditions(&self) -> DiscState {
        self.initial_conditions.current()
    }

    pub fn default_initial_conditions(&self) -> &DiscState {
        self.initial_conditions.defaults()
    }

    pub fn compute_trajectory(&self, flight_time: f64) -> Result<Trajectory, SimError> {
        let initial = self.initial_conditions.current();

        info!(
            "Throwing '{}' for {flight_time} s from {:?}",
            self.name,
            initial.0.as_slice()
        );

        let eom = DiscEom {
            constants: &self.constants,
            model: &self.model,
            wind: self.wind.as_ref(),
        };

        TrajectoryIntegrator::new(eom, self.integrator.clone()).run(&initial, flight_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        disc::{
            disc_data::StateField,
            integrator::{RunStatus, StepControl, TerminationReason},
            wind::ConstantWind,
        },
        parameters::parse_string,
    };
    use approx::assert_relative_eq;
    use nalgebra::vector;
    use pretty_assertions::assert_eq;

    /// x displacement after 4 s of the reference aviar throw
    const AVIAR_GOLDEN_X_M: f64 = 13.415192593265056;
    const AVIAR_GOLDEN_TOL_M: f64 = 1e-6;

    fn aviar_reference_throw() -> Disc {
        let mut disc = Disc::from_preset("aviar")
            .unwrap()
            .with_integrator(IntegratorConfig {
                stop_at_ground: false,
                ..Default::default()
            })
            .unwrap();
        disc.set_default_initial_conditions(&[
            ("vx", 23.0),
            ("vy", 0.0),
            ("theta", 0.0),
            ("phi", 0.2),
        ])
        .unwrap();
        disc
    }

    #[test]
    fn test_aviar_regression() {
        let disc = aviar_reference_throw();
        let traj = disc.compute_trajectory(4.0).unwrap();

        assert!(traj.is_complete());
        assert_eq!(traj.len(), 401);
        assert_eq!(traj.final_time(), Some(4.0));
        assert_relative_eq!(
            *traj.x.last().unwrap() - traj.x[0],
            AVIAR_GOLDEN_X_M,
            epsilon = AVIAR_GOLDEN_TOL_M
        );
    }

    #[test]
    fn test_runs_are_repeatable() {
        let disc = aviar_reference_throw();
        let a = disc.compute_trajectory(1.0).unwrap();
        let b = disc.compute_trajectory(1.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_free_fall() {
        let mut disc = Disc::new("brick", CoefficientModel::zero(), PhysicalConstants::default())
            .unwrap()
            .with_integrator(IntegratorConfig {
                stop_at_ground: false,
                ..Default::default()
            })
            .unwrap();
        disc.set_default_initial_conditions(&[("z", 5.0), ("vx", 0.0), ("wz", 0.0)])
            .unwrap();

        let traj = disc.compute_trajectory(1.0).unwrap();
        for (t, z) in traj.times.iter().zip(traj.z.iter()) {
            assert_relative_eq!(*z, 5.0 - 0.5 * 9.81 * t * t, epsilon = 1e-9);
        }
        assert!(traj.vx.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_overrides_do_not_leak_between_runs() {
        let mut disc = Disc::from_preset("buzz").unwrap();
        let defaults = disc.default_initial_conditions().clone();

        disc.set_initial_conditions(&[("vx", 25.0), ("theta", -0.2)])
            .unwrap();
        let strong = disc.compute_trajectory(1.0).unwrap();
        assert_eq!(strong.vx[0], 25.0);
        assert_eq!(strong.theta[0], -0.2);

        disc.reset_initial_conditions();
        assert_eq!(disc.initial_conditions(), defaults);

        let default_run = disc.compute_trajectory(1.0).unwrap();
        assert_eq!(default_run.vx[0], 10.0);
        assert_eq!(default_run.theta[0], 0.0);
    }

    #[test]
    fn test_reset_is_bit_exact() {
        let mut disc = Disc::from_preset("roc").unwrap();
        disc.set_default_initial_conditions(&[("vx", 0.1 + 0.2), ("phi", -0.0)])
            .unwrap();
        let snapshot: Vec<u64> = disc
            .default_initial_conditions()
            .0
            .iter()
            .map(|v| v.to_bits())
            .collect();

        disc.set_initial_conditions(&[("vx", 3.0), ("phi", 0.0), ("gamma", 1.0)])
            .unwrap();
        disc.reset_initial_conditions();
        disc.reset_initial_conditions();

        let restored: Vec<u64> = disc
            .initial_conditions()
            .0
            .iter()
            .map(|v| v.to_bits())
            .collect();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn test_unknown_override_is_rejected() {
        let mut disc = Disc::from_preset("aviar").unwrap();
        assert_eq!(
            disc.set_default_initial_conditions(&[("vx", 20.0), ("speed", 20.0)]),
            Err(ConfigError::UnknownField("speed".to_string()))
        );
        assert_eq!(disc.initial_conditions().get(StateField::Vx), 10.0);
    }

    #[test]
    fn test_invalid_setup() {
        assert!(matches!(
            Disc::from_preset("ultimate"),
            Err(ConfigError::UnknownModel(_))
        ));

        let model = CoefficientModel {
            PD0: f64::INFINITY,
            ..Default::default()
        };
        assert!(matches!(
            Disc::new("bad", model, PhysicalConstants::default()),
            Err(ConfigError::NonFiniteCoefficient { .. })
        ));

        let disc = Disc::from_preset("aviar").unwrap();
        assert!(matches!(
            disc.with_model("bad", model),
            Err(ConfigError::NonFiniteCoefficient { .. })
        ));

        let disc = Disc::from_preset("aviar").unwrap();
        assert!(
            disc.with_integrator(IntegratorConfig {
                step: StepControl::Fixed { dt: -0.01 },
                ..Default::default()
            })
            .is_err()
        );
    }

    #[test]
    fn test_jankie_hits_the_ground() {
        let disc = Disc::from_preset("jankie").unwrap();
        let traj = disc.compute_trajectory(10.0);

        // Either it crashes into the ground or it blows up numerically
        match traj {
            Ok(traj) => assert_eq!(
                traj.status(),
                RunStatus::TerminatedEarly(TerminationReason::GroundContact)
            ),
            Err(SimError::NumericalInstability { partial, .. }) => {
                assert_eq!(partial.status(), RunStatus::Aborted)
            }
            Err(e) => panic!("unexpected error {e}"),
        }
    }

    #[test]
    fn test_headwind_shortens_throw() {
        let calm = aviar_reference_throw();
        let windy = aviar_reference_throw().with_wind(Box::new(ConstantWind {
            vel_n_m_s: vector![-5.0, 0.0, 0.0],
        }));

        let x_calm = *calm.compute_trajectory(1.0).unwrap().x.last().unwrap();
        let x_windy = *windy.compute_trajectory(1.0).unwrap().x.last().unwrap();
        assert!(x_windy < x_calm);
    }

    #[test]
    fn test_from_params() {
        let params = parse_string(
            "
            [sim]
            dt = { val = 0.02, type = \"float\" }
            stop_at_ground = { val = false, type = \"bool\" }

            [disc]
            model = { val = \"floater\", type = \"str\" }
            mass = { val = 0.165, type = \"float\" }

            [disc.init]
            vx = { val = 20.0, type = \"float\" }

            [disc.wind]
            velocity = { val = [1.0, 0.0, 0.0], type = \"float[]\" }

            [models.floater]
            base = { val = \"wraith\", type = \"str\" }
            PL0 = { val = 0.2, type = \"float\" }
            "
            .to_string(),
        )
        .unwrap();

        // Custom molds come from the registry, not from the disc loader
        assert_eq!(
            Disc::from_params(&params, &ModelRegistry::builtin()).err(),
            Some(ConfigError::UnknownModel("floater".to_string()))
        );

        let registry = ModelRegistry::from_params(&params).unwrap();
        let disc = Disc::from_params(&params, &registry).unwrap();
        assert_eq!(disc.name(), "floater");
        assert_eq!(disc.model().PL0, 0.2);
        assert_eq!(disc.model().PD0, 0.055);
        assert_eq!(disc.constants().mass_kg, 0.165);
        assert_eq!(disc.initial_conditions().get(StateField::Vx), 20.0);
        assert_eq!(disc.initial_conditions().get(StateField::Wz), 62.0);
        assert_eq!(
            disc.integrator_config().step,
            StepControl::Fixed { dt: 0.02 }
        );

        let traj = disc.compute_trajectory(0.1).unwrap();
        assert_eq!(traj.len(), 6);
        assert!(traj.alpha.iter().all(|a| a.is_finite()));

        // Everything defaults with an empty file
        let disc = Disc::from_params(&ParameterMap::default(), &ModelRegistry::builtin()).unwrap();
        assert_eq!(disc.name(), "default");
        assert_eq!(disc.integrator_config(), &IntegratorConfig::default());
    }

    #[test]
    fn test_shipped_params() {
        let params = parse_string(include_str!("../../config/params.toml").to_string()).unwrap();
        let registry = ModelRegistry::from_params(&params).unwrap();
        let disc = Disc::from_params(&params, &registry).unwrap();

        assert_eq!(disc.name(), "aviar");
        assert_eq!(disc.constants(), &PhysicalConstants::default());
        assert_eq!(disc.integrator_config(), &IntegratorConfig::default());
        assert_eq!(disc.initial_conditions().get(StateField::Vx), 23.0);
        assert_eq!(disc.initial_conditions().get(StateField::Phi), 0.2);
        assert_eq!(registry.get("understable_aviar").unwrap().PTy0, -0.005);
    }
}
