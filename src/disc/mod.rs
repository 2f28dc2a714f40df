pub mod coefficients;
pub mod disc;
pub mod disc_data;
pub mod eom;
pub mod error;
pub mod frames;
pub mod integrator;
pub mod presets;
pub mod trajectory;
pub mod wind;

pub use coefficients::CoefficientModel;
pub use disc::Disc;
pub use disc_data::{DiscState, InitialConditions, PhysicalConstants, StateField};
pub use error::{ConfigError, SimError};
pub use integrator::{IntegratorConfig, RunStatus, StepControl, TerminationReason};
pub use presets::ModelRegistry;
pub use trajectory::{SingularityWarning, Trajectory};
pub use wind::{CalmWind, ConstantWind, RampWind, WindModel};
