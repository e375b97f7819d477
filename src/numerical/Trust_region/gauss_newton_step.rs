use super::quadratic_model::QuadraticModel;
use crate::somelinalg::linear_sys_diagnostics::condition_number;
use crate::somelinalg::normal_equations::{
    GaussNewtonSolver, LinearSolveError, LinearSolverKind, NormalEquationsSolve,
};
use log::{debug, warn};
use nalgebra::DVector;

/// Gauss-Newton point: unconstrained minimizer of the quadratic model, B p_GN = -g.
/// The solve is done lazily, at most once per staged inputs, and reused for every radius.
pub struct GaussNewtonStep {
    solver: GaussNewtonSolver,
    tolerance: f64,
    dx_gn: DVector<f64>,
    norm_gn: f64,
    /// None while not computed for the current inputs
    status: Option<Result<(), LinearSolveError>>,
    /// condition number of B, estimated once when the solve fails
    condition: Option<f64>,
}

impl GaussNewtonStep {
    pub fn new(kind: LinearSolverKind, tolerance: f64, n: usize, m: usize) -> Self {
        GaussNewtonStep {
            solver: GaussNewtonSolver::from_kind(kind, n, m),
            tolerance,
            dx_gn: DVector::zeros(n),
            norm_gn: -1.0, // negative indicates not computed
            status: None,
            condition: None,
        }
    }

    pub fn kind(&self) -> LinearSolverKind {
        self.solver.kind()
    }

    /// forget the cached solution, called whenever new inputs are staged
    pub fn invalidate(&mut self) {
        self.status = None;
        self.norm_gn = -1.0;
        self.condition = None;
    }

    pub fn is_computed(&self) -> bool {
        self.status.is_some()
    }

    /// solve B p = -g for the staged model, returns ||p_GN||
    pub fn compute(&mut self, model: &QuadraticModel) -> Result<f64, LinearSolveError> {
        if let Some(status) = &self.status {
            return status.clone().map(|()| self.norm_gn);
        }
        let res = self.solver.solve(
            model.jacobian(),
            model.residuals(),
            model.hessian(),
            model.gradient(),
            self.tolerance,
            &mut self.dx_gn,
        );
        match &res {
            Ok(()) => {
                self.norm_gn = self.dx_gn.norm();
                debug!(
                    "Gauss-Newton step ({} solver): ||p_GN|| = {:.4e}",
                    self.solver.kind(),
                    self.norm_gn
                );
            }
            Err(e) => {
                let cond = condition_number(model.hessian());
                warn!(
                    "Gauss-Newton step unavailable ({} solver): {}, condition number of J^T J = {:.3e}",
                    self.solver.kind(),
                    e,
                    cond
                );
                self.condition = Some(cond);
                self.dx_gn.fill(0.0);
                self.norm_gn = -1.0;
            }
        }
        self.status = Some(res.clone());
        res.map(|()| self.norm_gn)
    }

    /// p_GN if it was computed successfully
    pub fn step(&self) -> Option<&DVector<f64>> {
        match self.status {
            Some(Ok(())) => Some(&self.dx_gn),
            _ => None,
        }
    }

    pub fn norm(&self) -> Option<f64> {
        self.step().map(|_| self.norm_gn)
    }

    /// condition number of B when the solve failed for the current inputs
    pub fn condition_number(&self) -> Option<f64> {
        self.condition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use strum::IntoEnumIterator;

    fn staged_model(jacobian: DMatrix<f64>, residuals: DVector<f64>) -> QuadraticModel {
        let gradient = jacobian.transpose() * &residuals;
        let (m, n) = jacobian.shape();
        let mut model = QuadraticModel::new(n, m).unwrap();
        model
            .stage(&DVector::zeros(n), &residuals, &jacobian, &gradient, -1.0)
            .unwrap();
        model
    }

    #[test]
    fn test_gauss_newton_step_square_system() {
        // for a square nonsingular J the Gauss-Newton step solves J p = -r exactly
        let jacobian = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let residuals = DVector::from_vec(vec![1.0, 2.0]);
        let model = staged_model(jacobian.clone(), residuals.clone());
        for kind in LinearSolverKind::iter() {
            let mut gn = GaussNewtonStep::new(kind, 1e-12, 2, 2);
            assert!(!gn.is_computed());
            let norm = gn.compute(&model).unwrap();
            let step = gn.step().unwrap();
            let expected = jacobian.clone().lu().solve(&(-&residuals)).unwrap();
            assert_relative_eq!(step.clone(), expected, epsilon = 1e-10);
            assert_relative_eq!(norm, step.norm(), epsilon = 1e-14);
            assert_eq!(gn.norm(), Some(norm));
            assert_eq!(gn.kind(), kind);
        }
    }

    #[test]
    fn test_gauss_newton_step_cached_until_invalidated() {
        let jacobian = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 1.0, 2.0, 2.0]);
        let residuals = DVector::from_vec(vec![1.0, -1.0, 0.5]);
        let model = staged_model(jacobian, residuals);
        let mut gn = GaussNewtonStep::new(LinearSolverKind::Cholesky, 1e-12, 2, 3);
        let first = gn.compute(&model).unwrap();
        assert!(gn.is_computed());
        let second = gn.compute(&model).unwrap();
        assert_eq!(first, second);
        gn.invalidate();
        assert!(!gn.is_computed());
        assert_eq!(gn.step(), None);
    }

    #[test]
    fn test_gauss_newton_step_singular() {
        let jacobian = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 2.0, 4.0, -1.0, -2.0]);
        let residuals = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let model = staged_model(jacobian, residuals);
        let mut gn = GaussNewtonStep::new(LinearSolverKind::Cholesky, 1e-12, 2, 3);
        assert!(gn.compute(&model).is_err());
        assert!(gn.is_computed());
        assert_eq!(gn.step(), None);
        assert_eq!(gn.norm(), None);
        let cond = gn.condition_number().unwrap();
        assert!(cond > 1e10);
        // failure is cached as well, with its condition estimate
        assert!(gn.compute(&model).is_err());
        assert_eq!(gn.condition_number(), Some(cond));
        gn.invalidate();
        assert_eq!(gn.condition_number(), None);
    }

    #[test]
    fn test_gauss_newton_step_success_has_no_condition_estimate() {
        let jacobian = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let residuals = DVector::from_vec(vec![1.0, 2.0]);
        let model = staged_model(jacobian, residuals);
        let mut gn = GaussNewtonStep::new(LinearSolverKind::Lu, 1e-12, 2, 2);
        gn.compute(&model).unwrap();
        assert_eq!(gn.condition_number(), None);
    }
}
