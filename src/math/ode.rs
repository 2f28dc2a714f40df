use nalgebra::SVector;
use strum::{AsRefStr, EnumString};

pub trait OdeProblem<const S: usize> {
    fn odefun(&self, t: f64, y: &SVector<f64, S>) -> SVector<f64, S>;
}

pub trait OdeSolver<const S: usize> {
    /// Advances `y0` from `t0` by a single step of length `dt`
    fn solve(
        &self,
        problem: &dyn OdeProblem<S>,
        t0: f64,
        dt: f64,
        y0: &SVector<f64, S>,
    ) -> SVector<f64, S>;

    /// Global order of accuracy of the method
    fn order(&self) -> i32;
}

pub struct ForwardEuler;

impl<const S: usize> OdeSolver<S> for ForwardEuler {
    fn solve(
        &self,
        problem: &dyn OdeProblem<S>,
        t0: f64,
        dt: f64,
        y0: &SVector<f64, S>,
    ) -> SVector<f64, S> {
        y0 + problem.odefun(t0, y0) * dt
    }

    fn order(&self) -> i32 {
        1
    }
}

pub struct RungeKutta4;

impl<const S: usize> OdeSolver<S> for RungeKutta4 {
    fn solve(
        &self,
        problem: &dyn OdeProblem<S>,
        t0: f64,
        dt: f64,
        y0: &SVector<f64, S>,
    ) -> SVector<f64, S> {
        let hdt = dt / 2.0;
        let k1 = problem.odefun(t0, y0);
        let k2 = problem.odefun(t0 + hdt, &(y0 + k1 * hdt));
        let k3 = problem.odefun(t0 + hdt, &(y0 + k2 * hdt));
        let k4 = problem.odefun(t0 + dt, &(y0 + k3 * dt));

        y0 + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
    }

    fn order(&self) -> i32 {
        4
    }
}

/// Solver selection, as named in the parameter file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr)]
pub enum SolverKind {
    #[strum(serialize = "euler")]
    ForwardEuler,
    #[default]
    #[strum(serialize = "rk4")]
    RungeKutta4,
}

impl SolverKind {
    pub fn step<const S: usize>(
        &self,
        problem: &dyn OdeProblem<S>,
        t0: f64,
        dt: f64,
        y0: &SVector<f64, S>,
    ) -> SVector<f64, S> {
        match self {
            SolverKind::ForwardEuler => ForwardEuler.solve(problem, t0, dt, y0),
            SolverKind::RungeKutta4 => RungeKutta4.solve(problem, t0, dt, y0),
        }
    }

    pub fn order(&self) -> i32 {
        match self {
            SolverKind::ForwardEuler => <ForwardEuler as OdeSolver<1>>::order(&ForwardEuler),
            SolverKind::RungeKutta4 => <RungeKutta4 as OdeSolver<1>>::order(&RungeKutta4),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Vector2, vector};
    use std::str::FromStr;

    /// Undamped harmonic oscillator, y = [x, v]
    struct Oscillator {
        omega: f64,
    }

    impl OdeProblem<2> for Oscillator {
        fn odefun(&self, _t: f64, y: &Vector2<f64>) -> Vector2<f64> {
            vector![y[1], -self.omega.powi(2) * y[0]]
        }
    }

    fn integrate(solver: SolverKind, dt: f64, t_end: f64) -> Vector2<f64> {
        let problem = Oscillator { omega: 2.0 };
        let n = (t_end / dt).round() as usize;
        let mut y = vector![1.0, 0.0];
        for i in 0..n {
            y = solver.step(&problem, i as f64 * dt, dt, &y);
        }
        y
    }

    #[test]
    fn test_rk4_oscillator() {
        let y = integrate(SolverKind::RungeKutta4, 0.01, 2.0);

        assert_relative_eq!(y[0], (2.0f64 * 2.0).cos(), epsilon = 1e-7);
        assert_relative_eq!(y[1], -2.0 * (2.0f64 * 2.0).sin(), epsilon = 1e-7);
    }

    #[test]
    fn test_rk4_error_order() {
        let exact = (2.0f64 * 2.0).cos();
        let e1 = (integrate(SolverKind::RungeKutta4, 0.04, 2.0)[0] - exact).abs();
        let e2 = (integrate(SolverKind::RungeKutta4, 0.02, 2.0)[0] - exact).abs();

        // Halving the step divides the error by ~2^4
        assert!(e1 / e2 > 12.0 && e1 / e2 < 20.0, "ratio {}", e1 / e2);
    }

    #[test]
    fn test_euler_is_first_order() {
        let exact = (2.0f64 * 2.0).cos();
        let e1 = (integrate(SolverKind::ForwardEuler, 0.002, 2.0)[0] - exact).abs();
        let e2 = (integrate(SolverKind::ForwardEuler, 0.001, 2.0)[0] - exact).abs();

        assert!(e1 / e2 > 1.8 && e1 / e2 < 2.2, "ratio {}", e1 / e2);
    }

    #[test]
    fn test_solver_names() {
        assert_eq!(SolverKind::from_str("rk4"), Ok(SolverKind::RungeKutta4));
        assert_eq!(SolverKind::from_str("euler"), Ok(SolverKind::ForwardEuler));
        assert!(SolverKind::from_str("rk45").is_err());
        assert_eq!(SolverKind::default().order(), 4);
    }
}
