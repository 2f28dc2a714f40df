use nalgebra::{Matrix3, Vector3};

/// Speeds below this are treated as zero when building aerodynamic axes
pub const V_SMALL: f64 = 1e-5;

/// Rotation from the lab frame to the (non-spinning) disc frame,
/// `R = R_y(theta) * R_x(phi)`, so that `v_d = R * v_n`.
///
/// The rows of the matrix are the disc axes expressed in the lab frame. The
/// spin angle does not enter: the aerodynamic frame is symmetric about the
/// disc normal.
pub fn rotation_matrix(phi: f64, theta: f64) -> Matrix3<f64> {
    let (sp, cp) = phi.sin_cos();
    let (st, ct) = theta.sin_cos();

    Matrix3::new(
        ct,
        sp * st,
        -st * cp,
        0.0,
        cp,
        sp,
        st,
        -sp * ct,
        cp * ct,
    )
}

/// Angle between the relative wind and the disc plane, positive when the air
/// hits the underside of the disc. Zero for a disc at rest in the air.
pub fn angle_of_attack(vel_d: &Vector3<f64>) -> f64 {
    if vel_d.norm() < V_SMALL {
        return 0.0;
    }
    (-vel_d[2]).atan2(vel_d[0].hypot(vel_d[1]))
}

pub fn wind_relative_velocity(vel_n: &Vector3<f64>, wind_n: &Vector3<f64>) -> Vector3<f64> {
    vel_n - wind_n
}

/// Lab-frame unit vectors used to resolve the aerodynamic actions: `x` along
/// the in-plane component of the relative wind, `z` the disc normal and
/// `y = z × x`.
///
/// With no in-plane wind component `x` is the disc x axis, an arbitrary
/// choice, and `flow_in_plane` is false.
#[derive(Debug, Clone, PartialEq)]
pub struct AeroAxes {
    pub x_n: Vector3<f64>,
    pub y_n: Vector3<f64>,
    pub z_n: Vector3<f64>,
    pub flow_in_plane: bool,
}

impl AeroAxes {
    pub fn new(rot: &Matrix3<f64>, v_air_n: &Vector3<f64>) -> Self {
        let z_n: Vector3<f64> = rot.row(2).transpose();

        let v_plane = v_air_n - v_air_n.dot(&z_n) * z_n;
        let flow_in_plane = v_plane.norm() >= V_SMALL;
        let x_n: Vector3<f64> = if flow_in_plane {
            v_plane.normalize()
        } else {
            rot.row(0).transpose()
        };

        let y_n = z_n.cross(&x_n);

        AeroAxes {
            x_n,
            y_n,
            z_n,
            flow_in_plane,
        }
    }
}
