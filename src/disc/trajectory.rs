use std::{io, path::Path};

use itertools::izip;
use serde::Serialize;

use super::{
    disc_data::{DiscState, StateField},
    integrator::RunStatus,
};

/// Theta came within ~1 deg of +-90 deg, where the Euler-angle rates are singular
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingularityWarning {
    pub t: f64,
    pub theta: f64,
}

/// Time series produced by one run. All columns have the same length and
/// sample `i` of one column belongs with sample `i` of every other.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub vx: Vec<f64>,
    pub vy: Vec<f64>,
    pub vz: Vec<f64>,
    pub phi: Vec<f64>,
    pub theta: Vec<f64>,
    pub gamma: Vec<f64>,
    pub wx: Vec<f64>,
    pub wy: Vec<f64>,
    pub wz: Vec<f64>,
    /// Angle of attack at each sample
    pub alpha: Vec<f64>,

    status: RunStatus,
    warnings: Vec<SingularityWarning>,
}

#[derive(Debug, Clone, Serialize)]
struct TrajectoryRow {
    t: f64,
    x: f64,
    y: f64,
    z: f64,
    vx: f64,
    vy: f64,
    vz: f64,
    phi: f64,
    theta: f64,
    gamma: f64,
    wx: f64,
    wy: f64,
    wz: f64,
    alpha: f64,
}

impl Default for Trajectory {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl Trajectory {
    pub fn with_capacity(capacity: usize) -> Self {
        let col = || Vec::with_capacity(capacity);
        Trajectory {
            times: col(),
            x: col(),
            y: col(),
            z: col(),
            vx: col(),
            vy: col(),
            vz: col(),
            phi: col(),
            theta: col(),
            gamma: col(),
            wx: col(),
            wy: col(),
            wz: col(),
            alpha: col(),
            status: RunStatus::NotStarted,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, t: f64, state: &DiscState, alpha: f64) {
        self.times.push(t);
        self.x.push(state.get(StateField::X));
        self.y.push(state.get(StateField::Y));
        self.z.push(state.get(StateField::Z));
        self.vx.push(state.get(StateField::Vx));
        self.vy.push(state.get(StateField::Vy));
        self.vz.push(state.get(StateField::Vz));
        self.phi.push(state.get(StateField::Phi));
        self.theta.push(state.get(StateField::Theta));
        self.gamma.push(state.get(StateField::Gamma));
        self.wx.push(state.get(StateField::Wx));
        self.wy.push(state.get(StateField::Wy));
        self.wz.push(state.get(StateField::Wz));
        self.alpha.push(alpha);
    }

    pub(crate) fn set_status(&mut self, status: RunStatus) {
        self.status = status;
    }

    pub(crate) fn add_warning(&mut self, warning: SingularityWarning) {
        self.warnings.push(warning);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// True only if the run reached the requested flight time
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn warnings(&self) -> &[SingularityWarning] {
        &self.warnings
    }

    pub fn state(&self, i: usize) -> Option<DiscState> {
        if i >= self.len() {
            return None;
        }

        let mut state = DiscState::default();
        let columns = [
            &self.x,
            &self.y,
            &self.z,
            &self.vx,
            &self.vy,
            &self.vz,
            &self.phi,
            &self.theta,
            &self.gamma,
            &self.wx,
            &self.wy,
            &self.wz,
        ];
        for (k, col) in columns.iter().enumerate() {
            state.0[k] = col[i];
        }
        Some(state)
    }

    pub fn last_state(&self) -> Option<DiscState> {
        self.len().checked_sub(1).and_then(|i| self.state(i))
    }

    pub fn final_time(&self) -> Option<f64> {
        self.times.last().copied()
    }

    /// One csv row per sample, with a header
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(writer);

        let rows = izip!(
            &self.times,
            &self.x,
            &self.y,
            &self.z,
            &self.vx,
            &self.vy,
            &self.vz,
            &self.phi,
            &self.theta,
            &self.gamma,
            &self.wx,
            &self.wy,
            &self.wz,
            &self.alpha
        );
        for (&t, &x, &y, &z, &vx, &vy, &vz, &phi, &theta, &gamma, &wx, &wy, &wz, &alpha) in rows {
            writer.serialize(TrajectoryRow {
                t,
                x,
                y,
                z,
                vx,
                vy,
                vz,
                phi,
                theta,
                gamma,
                wx,
                wy,
                wz,
                alpha,
            })?;
        }

        writer.flush()?;
        Ok(())
    }

    pub fn write_csv_file(&self, path: &Path) -> Result<(), csv::Error> {
        let file = std::fs::File::create(path)?;
        self.write_csv(io::BufWriter::new(file))
    }
}
