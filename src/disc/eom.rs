use nalgebra::{Matrix3, SVector, Vector3, vector};

use super::{
    coefficients::CoefficientModel,
    disc_data::{DiscState, PhysicalConstants, STATE_SIZE},
    frames::{AeroAxes, V_SMALL, angle_of_attack, rotation_matrix, wind_relative_velocity},
    wind::WindModel,
};
use crate::math::ode::OdeProblem;

/// |cos(theta)| below this (theta within ~1 deg of +-90 deg) is reported as
/// close to the Euler-angle singularity
pub const SINGULARITY_COS: f64 = 0.017452406437283512;

pub fn near_singularity(theta: f64) -> bool {
    theta.cos().abs() < SINGULARITY_COS
}

/// Rates of the Euler angles (phi, theta, gamma) given the angular velocity in
/// the non-spinning disc frame. Singular at theta = +-90 deg.
pub fn euler_rates(theta: f64, angvel_d: &Vector3<f64>) -> Vector3<f64> {
    let (st, ct) = theta.sin_cos();
    let tan_t = st / ct;

    vector![
        angvel_d[0] / ct,
        angvel_d[1],
        angvel_d[2] - angvel_d[0] * tan_t
    ]
}

/// Equations of motion of a spinning disc. Borrows the disc data for the
/// duration of a run and keeps no state between evaluations.
#[derive(Clone, Copy)]
pub struct DiscEom<'a> {
    pub constants: &'a PhysicalConstants,
    pub model: &'a CoefficientModel,
    pub wind: &'a dyn WindModel,
}

#[derive(Debug, Clone)]
pub struct DiscActions {
    pub lift_n_n: Vector3<f64>,
    pub drag_n_n: Vector3<f64>,
    pub gravity_n_n: Vector3<f64>,
    pub tot_force_n_n: Vector3<f64>,
    pub torque_d_nm: Vector3<f64>,
}

/// Everything computed while evaluating the derivative at one state
#[derive(Debug, Clone)]
pub struct DiscOdeStep {
    pub d_state: DiscState,
    pub rot_nd: Matrix3<f64>,
    pub v_air_n_m_s: Vector3<f64>,
    pub alpha_rad: f64,
    pub c_lift: f64,
    pub c_drag: f64,
    pub actions: DiscActions,
}

impl DiscOdeStep {
    pub fn calc(eom: &DiscEom, t_s: f64, state: &DiscState) -> Self {
        let c = eom.constants;
        let model = eom.model;

        let phi = state.phi();
        let theta = state.theta();
        let rot = rotation_matrix(phi, theta);

        let v_air_n = wind_relative_velocity(&state.vel_n_m_s(), &eom.wind.velocity_n(t_s));
        let v_air_d = rot * v_air_n;
        let speed = v_air_n.norm();
        let alpha_rad = angle_of_attack(&v_air_d);

        let axes = AeroAxes::new(&rot, &v_air_n);

        let amp = 0.5 * c.air_density_kg_m3 * speed.powi(2) * c.area_m2;
        let c_lift = model.lift_coefficient(alpha_rad);
        let c_drag = model.drag_coefficient(alpha_rad);

        let (lift_n_n, drag_n_n) = if speed < V_SMALL {
            (Vector3::zeros(), Vector3::zeros())
        } else {
            let v_hat = v_air_n / speed;
            // Flow along the normal has no lift direction
            let lift_n_n = if axes.flow_in_plane {
                c_lift * amp * v_hat.cross(&axes.y_n)
            } else {
                Vector3::zeros()
            };
            (lift_n_n, -c_drag * amp * v_hat)
        };
        let gravity_n_n = vector![0.0, 0.0, -c.mass_kg * c.g_m_s2];
        let tot_force_n_n = lift_n_n + drag_n_n + gravity_n_n;

        // Angular rates about the aerodynamic axes
        let w_d = state.angvel_d_rad_s();
        let w_n = rot.transpose() * w_d;
        let wx_aero = axes.x_n.dot(&w_n);
        let wy_aero = axes.y_n.dot(&w_n);
        let wz_aero = axes.z_n.dot(&w_n);

        let torque_amp = amp * c.diameter_m;
        let torque_n = model.x_torque_coefficient(wx_aero, wz_aero) * torque_amp * axes.x_n
            + model.y_torque_coefficient(alpha_rad, wy_aero) * torque_amp * axes.y_n;
        let torque_d_nm = rot * torque_n
            + vector![0.0, 0.0, model.z_torque_coefficient(wz_aero) * torque_amp];

        // The disc frame turns with (wx, wy, wx * tan(theta)), the body with (wx, wy, wz)
        let (wx, wy, wz) = (w_d[0], w_d[1], w_d[2]);
        let frame_wz = wx * theta.tan();
        let i_xx = c.i_xx_kgm2;
        let i_zz = c.i_zz_kgm2;

        let ang_acc_d = vector![
            (torque_d_nm[0] - wy * i_zz * wz + frame_wz * i_xx * wy) / i_xx,
            (torque_d_nm[1] - frame_wz * i_xx * wx + wx * i_zz * wz) / i_xx,
            torque_d_nm[2] / i_zz
        ];

        let mut d_state = DiscState::default();
        d_state.set_pos_n_m(&state.vel_n_m_s());
        d_state.set_vel_n_m_s(&(tot_force_n_n / c.mass_kg));
        d_state.set_angles_rad(&euler_rates(theta, &w_d));
        d_state.set_angvel_d_rad_s(&ang_acc_d);

        DiscOdeStep {
            d_state,
            rot_nd: rot,
            v_air_n_m_s: v_air_n,
            alpha_rad,
            c_lift,
            c_drag,
            actions: DiscActions {
                lift_n_n,
                drag_n_n,
                gravity_n_n,
                tot_force_n_n,
                torque_d_nm,
            },
        }
    }
}

impl OdeProblem<STATE_SIZE> for DiscEom<'_> {
    fn odefun(&self, t: f64, y: &SVector<f64, STATE_SIZE>) -> SVector<f64, STATE_SIZE> {
        DiscOdeStep::calc(self, t, &DiscState(*y)).d_state.0
    }
}
