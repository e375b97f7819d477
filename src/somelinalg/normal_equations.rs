//! Linear solvers for the Gauss-Newton subproblem  B p = -g,  B = J^T J, g = J^T r.
//!
//! Three strategies are dispatched through one enum:
//! - "cholesky": nalgebra Cholesky factorization of B in a reused workspace
//! - "lu": nalgebra LU decomposition with partial pivoting of the Jacobi scaled B
//! - "qr": nalgebra QR decomposition of J with unit columns and least squares solution of J p = -r,
//!   so the squared condition number of B is never formed
//!
//! Singularity is judged on the Jacobi scaled system D B D, D = diag(1/sqrt(B_ii)), so a column
//! scaling of J never makes a well-posed system look singular. With `tol` the relative tolerance:
//! - any B_ii <= 0 (a zero column of J) is singular
//! - cholesky fails when a pivot L_ii^2 <= tol * B_ii
//! - lu fails when |U_ii| <= tol for the scaled matrix (unit diagonal)
//! - qr fails when |R_ii| <= sqrt(tol) for the scaled Jacobian (unit columns)
use enum_dispatch::enum_dispatch;
use nalgebra::{Cholesky, DMatrix, DVector, LU, QR};
use std::fmt;
use std::mem;
use strum_macros::{Display, EnumIter, EnumString};

/// Error types for the Gauss-Newton linear solve
#[derive(Debug, Clone, PartialEq)]
pub enum LinearSolveError {
    /// a pivot fell below the singularity threshold
    Singular { pivot: f64, threshold: f64 },
    /// B has a negative pivot, possible only through rounding for B = J^T J
    NotPositiveDefinite,
    DimensionMismatch,
}

impl fmt::Display for LinearSolveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LinearSolveError::Singular { pivot, threshold } => write!(
                f,
                "matrix is singular: pivot {:.3e} <= threshold {:.3e}",
                pivot, threshold
            ),
            LinearSolveError::NotPositiveDefinite => {
                write!(f, "matrix is not positive definite")
            }
            LinearSolveError::DimensionMismatch => {
                write!(f, "dimensions of matrix and vectors do not match")
            }
        }
    }
}

impl std::error::Error for LinearSolveError {}

/// which factorization is used for the Gauss-Newton step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LinearSolverKind {
    #[default]
    Cholesky,
    Lu,
    Qr,
}

fn check_shapes(
    jacobian: &DMatrix<f64>,
    residuals: &DVector<f64>,
    hessian: &DMatrix<f64>,
    gradient: &DVector<f64>,
    step: &DVector<f64>,
) -> Result<usize, LinearSolveError> {
    let n = jacobian.ncols();
    if hessian.shape() != (n, n)
        || gradient.len() != n
        || step.len() != n
        || residuals.len() != jacobian.nrows()
    {
        return Err(LinearSolveError::DimensionMismatch);
    }
    Ok(n)
}

/// d_i = 1/sqrt(B_ii), B_ii = ||J_:i||^2
fn jacobi_scaling(hessian: &DMatrix<f64>, scale: &mut DVector<f64>) -> Result<(), LinearSolveError> {
    for (i, d) in scale.iter_mut().enumerate() {
        let b_ii = hessian[(i, i)];
        // also rejects NaN
        if !(b_ii > 0.0) {
            return Err(LinearSolveError::Singular {
                pivot: b_ii,
                threshold: 0.0,
            });
        }
        *d = 1.0 / b_ii.sqrt();
    }
    Ok(())
}

// basic funcionality of a Gauss-Newton linear solver
#[enum_dispatch]
pub trait NormalEquationsSolve {
    /// size the workspace for n parameters and m residuals
    fn resize(&mut self, n: usize, m: usize);
    /// solve B p = -g and write p into `step`
    fn solve(
        &mut self,
        jacobian: &DMatrix<f64>,
        residuals: &DVector<f64>,
        hessian: &DMatrix<f64>,
        gradient: &DVector<f64>,
        tolerance: f64,
        step: &mut DVector<f64>,
    ) -> Result<(), LinearSolveError>;
    fn kind(&self) -> LinearSolverKind;
}

#[enum_dispatch(NormalEquationsSolve)]
pub enum GaussNewtonSolver {
    Cholesky(CholeskySolve),
    Lu(LuSolve),
    Qr(QrSolve),
}

impl GaussNewtonSolver {
    pub fn from_kind(kind: LinearSolverKind, n: usize, m: usize) -> Self {
        let mut solver: GaussNewtonSolver = match kind {
            LinearSolverKind::Cholesky => CholeskySolve::default().into(),
            LinearSolverKind::Lu => LuSolve::default().into(),
            LinearSolverKind::Qr => QrSolve::default().into(),
        };
        solver.resize(n, m);
        solver
    }
}

////////////////////////////////////////////////////////////////
//           CHOLESKY
////////////////////////////////////////////////////////////////
/// B = L L^T, factorized in a workspace that is handed back after every solve
#[derive(Debug, Clone)]
pub struct CholeskySolve {
    factor: DMatrix<f64>,
}

impl Default for CholeskySolve {
    fn default() -> Self {
        CholeskySolve {
            factor: DMatrix::zeros(0, 0),
        }
    }
}

impl NormalEquationsSolve for CholeskySolve {
    fn resize(&mut self, n: usize, _m: usize) {
        self.factor = DMatrix::zeros(n, n);
    }

    fn solve(
        &mut self,
        jacobian: &DMatrix<f64>,
        residuals: &DVector<f64>,
        hessian: &DMatrix<f64>,
        gradient: &DVector<f64>,
        tolerance: f64,
        step: &mut DVector<f64>,
    ) -> Result<(), LinearSolveError> {
        let n = check_shapes(jacobian, residuals, hessian, gradient, step)?;
        if let Some(b_ii) = (0..n).map(|i| hessian[(i, i)]).find(|b_ii| !(*b_ii > 0.0)) {
            return Err(LinearSolveError::Singular {
                pivot: b_ii,
                threshold: 0.0,
            });
        }
        let mut work = mem::replace(&mut self.factor, DMatrix::zeros(0, 0));
        if work.shape() != (n, n) {
            work = DMatrix::zeros(n, n);
        }
        work.copy_from(hessian);
        // zero or negative pivot: the workspace is gone with the failed factorization
        let chol = match Cholesky::new(work) {
            Some(chol) => chol,
            None => {
                self.resize(n, residuals.len());
                return Err(LinearSolveError::NotPositiveDefinite);
            }
        };
        let mut result = Ok(());
        let l = chol.l_dirty();
        for i in 0..n {
            let pivot = l[(i, i)] * l[(i, i)];
            let threshold = tolerance * hessian[(i, i)];
            if !(pivot > threshold) {
                result = Err(LinearSolveError::Singular { pivot, threshold });
                break;
            }
        }
        if result.is_ok() {
            step.copy_from(gradient);
            step.neg_mut();
            chol.solve_mut(step);
        }
        self.factor = chol.unpack_dirty();
        result
    }

    fn kind(&self) -> LinearSolverKind {
        LinearSolverKind::Cholesky
    }
}

////////////////////////////////////////////////////////////////
//           LU
////////////////////////////////////////////////////////////////
/// (D B D) y = -D g,  p = D y
#[derive(Debug, Clone)]
pub struct LuSolve {
    scaled: DMatrix<f64>,
    scale: DVector<f64>,
}

impl Default for LuSolve {
    fn default() -> Self {
        LuSolve {
            scaled: DMatrix::zeros(0, 0),
            scale: DVector::zeros(0),
        }
    }
}

impl NormalEquationsSolve for LuSolve {
    fn resize(&mut self, n: usize, _m: usize) {
        self.scaled = DMatrix::zeros(n, n);
        self.scale = DVector::zeros(n);
    }

    fn solve(
        &mut self,
        jacobian: &DMatrix<f64>,
        residuals: &DVector<f64>,
        hessian: &DMatrix<f64>,
        gradient: &DVector<f64>,
        tolerance: f64,
        step: &mut DVector<f64>,
    ) -> Result<(), LinearSolveError> {
        let n = check_shapes(jacobian, residuals, hessian, gradient, step)?;
        if self.scaled.shape() != (n, n) || self.scale.len() != n {
            self.resize(n, residuals.len());
        }
        jacobi_scaling(hessian, &mut self.scale)?;
        self.scaled.copy_from(hessian);
        let d = &self.scale;
        for (j, mut col) in self.scaled.column_iter_mut().enumerate() {
            col.component_mul_assign(d);
            col *= d[j];
        }

        let lu = LU::new(mem::replace(&mut self.scaled, DMatrix::zeros(0, 0)));
        // U is square here and becomes the workspace of the next solve
        let u = lu.u();
        let pivot = u
            .diagonal()
            .iter()
            .fold(f64::INFINITY, |acc, &x| acc.min(x.abs()));
        self.scaled = u;
        if !(pivot > tolerance) {
            return Err(LinearSolveError::Singular {
                pivot,
                threshold: tolerance,
            });
        }
        step.copy_from(gradient);
        step.component_mul_assign(&self.scale);
        step.neg_mut();
        if !lu.solve_mut(step) {
            return Err(LinearSolveError::Singular {
                pivot,
                threshold: tolerance,
            });
        }
        step.component_mul_assign(&self.scale);
        Ok(())
    }

    fn kind(&self) -> LinearSolverKind {
        LinearSolverKind::Lu
    }
}

////////////////////////////////////////////////////////////////
//           QR
////////////////////////////////////////////////////////////////
/// J D = Q R, then R y = -Q^T r and p = D y. Assumes the staged gradient is J^T r
#[derive(Debug, Clone)]
pub struct QrSolve {
    scaled: DMatrix<f64>,
    scale: DVector<f64>,
    rhs: DVector<f64>,
}

impl Default for QrSolve {
    fn default() -> Self {
        QrSolve {
            scaled: DMatrix::zeros(0, 0),
            scale: DVector::zeros(0),
            rhs: DVector::zeros(0),
        }
    }
}

impl NormalEquationsSolve for QrSolve {
    fn resize(&mut self, n: usize, m: usize) {
        self.scaled = DMatrix::zeros(m, n);
        self.scale = DVector::zeros(n);
        self.rhs = DVector::zeros(m);
    }

    fn solve(
        &mut self,
        jacobian: &DMatrix<f64>,
        residuals: &DVector<f64>,
        hessian: &DMatrix<f64>,
        gradient: &DVector<f64>,
        tolerance: f64,
        step: &mut DVector<f64>,
    ) -> Result<(), LinearSolveError> {
        let n = check_shapes(jacobian, residuals, hessian, gradient, step)?;
        let m = jacobian.nrows();
        let threshold = tolerance.sqrt();
        // fewer residuals than parameters: J has a nontrivial null space
        if m < n {
            return Err(LinearSolveError::Singular {
                pivot: 0.0,
                threshold,
            });
        }
        if self.scaled.shape() != (m, n) || self.scale.len() != n || self.rhs.len() != m {
            self.resize(n, m);
        }
        jacobi_scaling(hessian, &mut self.scale)?;
        self.scaled.copy_from(jacobian);
        for (j, mut col) in self.scaled.column_iter_mut().enumerate() {
            col *= self.scale[j];
        }
        self.rhs.copy_from(residuals);
        self.rhs.neg_mut();

        let qr = QR::new(mem::replace(&mut self.scaled, DMatrix::zeros(0, 0)));
        qr.q_tr_mul(&mut self.rhs);
        // R takes over the factor storage, n x n
        let mut r = qr.unpack_r();
        let pivot = r
            .diagonal()
            .iter()
            .fold(f64::INFINITY, |acc, &x| acc.min(x.abs()));
        let result = if !(pivot > threshold) {
            Err(LinearSolveError::Singular { pivot, threshold })
        } else {
            step.copy_from(&self.rhs.rows(0, n));
            if r.solve_upper_triangular_mut(step) {
                step.component_mul_assign(&self.scale);
                Ok(())
            } else {
                Err(LinearSolveError::Singular { pivot, threshold })
            }
        };
        r.resize_mut(m, n, 0.0);
        self.scaled = r;
        result
    }

    fn kind(&self) -> LinearSolverKind {
        LinearSolverKind::Qr
    }
}
