use std::str::FromStr;

use log::{debug, info, warn};
use nalgebra::SVector;
use strum::{AsRefStr, Display};

use super::{
    disc_data::{DiscState, STATE_SIZE},
    eom::{DiscEom, near_singularity},
    error::{ConfigError, SimError},
    frames::{angle_of_attack, rotation_matrix, wind_relative_velocity},
    trajectory::{SingularityWarning, Trajectory},
};
use crate::{math::ode::SolverKind, parameters::ParameterMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
pub enum TerminationReason {
    GroundContact,
    StepLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    NotStarted,
    Running,
    Completed,
    TerminatedEarly(TerminationReason),
    /// The state became non-finite
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepControl {
    /// Constant step. RK4 stays stable only while `dt * i_zz / i_xx * |wz|`
    /// is below ~2.8, e.g. dt < ~0.023 s for wz = 62 rad/s.
    Fixed {
        dt: f64,
    },
    /// Step doubling with local error control
    Adaptive {
        dt_initial: f64,
        dt_min: f64,
        dt_max: f64,
        tolerance: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegratorConfig {
    pub solver: SolverKind,
    pub step: StepControl,
    pub max_steps: usize,
    /// End the run at the first sample with z <= 0 (after the initial one)
    pub stop_at_ground: bool,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        IntegratorConfig {
            solver: SolverKind::RungeKutta4,
            step: StepControl::Fixed { dt: 0.01 },
            max_steps: 1_000_000,
            stop_at_ground: true,
        }
    }
}

fn invalid(name: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn positive(name: &str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, &format!("must be finite and positive, got {v}")))
    }
}

impl IntegratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.step {
            StepControl::Fixed { dt } => positive("dt", dt)?,
            StepControl::Adaptive {
                dt_initial,
                dt_min,
                dt_max,
                tolerance,
            } => {
                positive("dt", dt_initial)?;
                positive("dt_min", dt_min)?;
                positive("dt_max", dt_max)?;
                positive("tolerance", tolerance)?;
                if !(dt_min <= dt_initial && dt_initial <= dt_max) {
                    return Err(invalid("dt", "must satisfy dt_min <= dt <= dt_max"));
                }
            }
        }

        if self.max_steps == 0 {
            return Err(invalid("max_steps", "must be at least 1"));
        }

        Ok(())
    }

    /// Reads the integrator settings from the `sim` parameter map
    pub fn from_params(params: &ParameterMap) -> Result<Self, ConfigError> {
        let d = IntegratorConfig::default();

        let solver_name = params.get_string_or("solver", d.solver.as_ref())?;
        let solver = SolverKind::from_str(&solver_name)
            .map_err(|_| invalid("solver", &format!("unknown solver '{solver_name}'")))?;

        let dt = params.get_float_or("dt", 0.01)?;
        let step = match params.get_string_or("step_control", "fixed")?.as_str() {
            "fixed" => StepControl::Fixed { dt },
            "adaptive" => StepControl::Adaptive {
                dt_initial: dt,
                dt_min: params.get_float_or("dt_min", 1e-6)?,
                dt_max: params.get_float_or("dt_max", 0.05)?,
                tolerance: params.get_float_or("tolerance", 1e-8)?,
            },
            unknown => {
                return Err(invalid(
                    "step_control",
                    &format!("expected 'fixed' or 'adaptive', got '{unknown}'"),
                ));
            }
        };

        let max_steps = params.get_int_or("max_steps", d.max_steps as i64)?;
        let max_steps = usize::try_from(max_steps)
            .map_err(|_| invalid("max_steps", "must not be negative"))?;

        let config = IntegratorConfig {
            solver,
            step,
            max_steps,
            stop_at_ground: params.get_bool_or("stop_at_ground", d.stop_at_ground)?,
        };

        config.validate()?;
        Ok(config)
    }
}

/// Drives the equations of motion from an initial state to the requested
/// flight time.
pub struct TrajectoryIntegrator<'a> {
    eom: DiscEom<'a>,
    config: IntegratorConfig,
    status: RunStatus,
}

/// Outcome of a single accepted step
enum StepOutcome {
    Continue,
    Stop(RunStatus),
}

impl<'a> TrajectoryIntegrator<'a> {
    pub fn new(eom: DiscEom<'a>, config: IntegratorConfig) -> Self {
        TrajectoryIntegrator {
            eom,
            config,
            status: RunStatus::NotStarted,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    /// Integrates from `initial` (copied, never modified) over `flight_time`
    /// seconds. The returned trajectory always starts with the initial sample.
    pub fn run(&mut self, initial: &DiscState, flight_time: f64) -> Result<Trajectory, SimError> {
        if !(flight_time.is_finite() && flight_time >= 0.0) {
            return Err(invalid(
                "flight_time",
                &format!("must be finite and non-negative, got {flight_time}"),
            )
            .into());
        }
        self.config.validate()?;
        if let Some(field) = initial.first_non_finite() {
            return Err(ConfigError::NonFiniteValue {
                field: field.to_string(),
                value: initial.get(field),
            }
            .into());
        }

        debug!(
            "Integrating {flight_time} s with {} ({:?}), max {} steps, stop at ground: {}",
            self.config.solver.as_ref(),
            self.config.step,
            self.config.max_steps,
            self.config.stop_at_ground
        );

        self.status = RunStatus::Running;

        let capacity = match self.config.step {
            StepControl::Fixed { dt } => ((flight_time / dt).ceil() as usize)
                .saturating_add(1)
                .min(self.config.max_steps.saturating_add(1)),
            StepControl::Adaptive { .. } => 256,
        };
        let mut traj = Trajectory::with_capacity(capacity);
        let mut near_sing = false;

        let state = initial.clone();
        traj.push(0.0, &state, self.alpha_at(0.0, &state));
        self.check_singularity(0.0, &state, &mut traj, &mut near_sing);

        let result = if flight_time == 0.0 {
            Ok(RunStatus::Completed)
        } else {
            match self.config.step {
                StepControl::Fixed { dt } => {
                    self.run_fixed(state, flight_time, dt, &mut traj, &mut near_sing)
                }
                StepControl::Adaptive {
                    dt_initial,
                    dt_min,
                    dt_max,
                    tolerance,
                } => self.run_adaptive(
                    state,
                    flight_time,
                    (dt_initial, dt_min, dt_max, tolerance),
                    &mut traj,
                    &mut near_sing,
                ),
            }
        };

        match result {
            Ok(status) => {
                self.status = status;
                traj.set_status(status);

                info!(
                    "Run finished ({:?}) at t = {:.3} s after {} samples, x = {:.3} m",
                    status,
                    traj.final_time().unwrap_or_default(),
                    traj.len(),
                    traj.x.last().copied().unwrap_or_default()
                );
                Ok(traj)
            }
            Err(last_valid_t) => {
                self.status = RunStatus::Aborted;
                traj.set_status(RunStatus::Aborted);

                warn!("State became non-finite after t = {last_valid_t} s, run aborted");
                Err(SimError::NumericalInstability {
                    last_valid_t,
                    partial: Box::new(traj),
                })
            }
        }
    }

    /// Returns the final status, or the last valid time if the state blew up
    fn run_fixed(
        &self,
        mut state: DiscState,
        flight_time: f64,
        dt: f64,
        traj: &mut Trajectory,
        near_sing: &mut bool,
    ) -> Result<RunStatus, f64> {
        // Uniform steps no longer than dt, the last one landing on flight_time
        let n = ((flight_time / dt - 1e-9).ceil() as usize).max(1);
        let mut t_prev = 0.0;

        for k in 1..=n {
            if k > self.config.max_steps {
                return Ok(self.step_limit(t_prev));
            }

            let t = if k == n {
                flight_time
            } else {
                k as f64 * flight_time / n as f64
            };

            let y = self
                .config
                .solver
                .step(&self.eom, t_prev, t - t_prev, &state.0);
            state = DiscState(y);

            if let StepOutcome::Stop(status) =
                self.accept(t_prev, t, &state, traj, near_sing)?
            {
                return Ok(status);
            }
            t_prev = t;
        }

        Ok(RunStatus::Completed)
    }

    fn run_adaptive(
        &self,
        mut state: DiscState,
        flight_time: f64,
        (dt_initial, dt_min, dt_max, tolerance): (f64, f64, f64, f64),
        traj: &mut Trajectory,
        near_sing: &mut bool,
    ) -> Result<RunStatus, f64> {
        let order = self.config.solver.order();
        let richardson = 2.0_f64.powi(order) - 1.0;

        let mut t = 0.0;
        let mut h = dt_initial;
        let mut steps = 0;

        while t < flight_time {
            if steps >= self.config.max_steps {
                return Ok(self.step_limit(t));
            }

            let remaining = flight_time - t;
            let last = h >= remaining;
            let h_try = if last { remaining } else { h };

            let (y, err) = self.double_step(t, h_try, &state.0, tolerance, richardson);

            if err <= 1.0 || h_try <= dt_min {
                let t_next = if last { flight_time } else { t + h_try };
                state = DiscState(y);
                steps += 1;

                if let StepOutcome::Stop(status) = self.accept(t, t_next, &state, traj, near_sing)?
                {
                    return Ok(status);
                }
                t = t_next;
            }

            let factor = if err > 0.0 {
                (0.9 * err.powf(-1.0 / (order as f64 + 1.0))).clamp(0.2, 5.0)
            } else {
                5.0
            };
            // NaN errors shrink the step, the state check catches the blow-up
            let factor = if factor.is_nan() { 0.2 } else { factor };
            h = (h_try * factor).clamp(dt_min, dt_max);
        }

        Ok(RunStatus::Completed)
    }

    /// One full step and two half steps; returns the extrapolated state and
    /// the scaled error estimate
    fn double_step(
        &self,
        t: f64,
        h: f64,
        y: &SVector<f64, STATE_SIZE>,
        tolerance: f64,
        richardson: f64,
    ) -> (SVector<f64, STATE_SIZE>, f64) {
        let solver = self.config.solver;
        let full = solver.step(&self.eom, t, h, y);
        let half = solver.step(&self.eom, t, h / 2.0, y);
        let two = solver.step(&self.eom, t + h / 2.0, h / 2.0, &half);

        let delta = (two - full) / richardson;
        let err = delta
            .iter()
            .zip(two.iter())
            .map(|(d, yi)| d.abs() / (tolerance * (1.0 + yi.abs())))
            .fold(0.0, f64::max);

        (two + delta, err)
    }

    fn accept(
        &self,
        t_prev: f64,
        t: f64,
        state: &DiscState,
        traj: &mut Trajectory,
        near_sing: &mut bool,
    ) -> Result<StepOutcome, f64> {
        if !state.is_finite() {
            return Err(t_prev);
        }

        traj.push(t, state, self.alpha_at(t, state));
        self.check_singularity(t, state, traj, near_sing);

        if self.config.stop_at_ground && state.pos_n_m()[2] <= 0.0 {
            debug!("Ground contact at t = {t:.3} s");
            return Ok(StepOutcome::Stop(RunStatus::TerminatedEarly(
                TerminationReason::GroundContact,
            )));
        }

        Ok(StepOutcome::Continue)
    }

    fn step_limit(&self, t: f64) -> RunStatus {
        warn!(
            "Step limit of {} reached at t = {t:.3} s",
            self.config.max_steps
        );
        RunStatus::TerminatedEarly(TerminationReason::StepLimit)
    }

    fn check_singularity(
        &self,
        t: f64,
        state: &DiscState,
        traj: &mut Trajectory,
        near_sing: &mut bool,
    ) {
        let theta = state.theta();
        if near_singularity(theta) {
            if !*near_sing {
                warn!(
                    "theta = {:.2} deg at t = {t:.3} s is close to the Euler angle singularity",
                    theta.to_degrees()
                );
                traj.add_warning(SingularityWarning { t, theta });
            }
            *near_sing = true;
        } else {
            *near_sing = false;
        }
    }

    fn alpha_at(&self, t: f64, state: &DiscState) -> f64 {
        let rot = rotation_matrix(state.phi(), state.theta());
        let v_air_n = wind_relative_velocity(&state.vel_n_m_s(), &self.eom.wind.velocity_n(t));
        angle_of_attack(&(rot * v_air_n))
    }
}
