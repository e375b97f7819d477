use super::trust_region_step::{DoglegError, check_len};
use log::debug;
use nalgebra::{DMatrix, DVector};

/// relative mismatch between a supplied cost and 0.5*||r||^2 that is reported
const COST_CONSISTENCY_TOL: f64 = 1e-8;

/// Local quadratic model of the least-squares cost around the current point
///  m(h) = fx + h^T g + 0.5 h^T B h,   B = J^T J
/// Holds the staged inputs of one iteration in buffers sized once for n parameters and m residuals.
#[derive(Debug, Clone)]
pub struct QuadraticModel {
    n: usize,
    m: usize,
    residuals: DVector<f64>,
    jacobian: DMatrix<f64>,
    gradient: DVector<f64>,
    hessian: DMatrix<f64>,
    cost: f64,
    staged: bool,
}

impl QuadraticModel {
    pub fn new(n: usize, m: usize) -> Result<Self, DoglegError> {
        if n == 0 {
            return Err(DoglegError::DimensionError {
                what: "number of parameters",
                expected: 1,
                found: 0,
            });
        }
        if m == 0 {
            return Err(DoglegError::DimensionError {
                what: "number of residuals",
                expected: 1,
                found: 0,
            });
        }
        Ok(QuadraticModel {
            n,
            m,
            residuals: DVector::zeros(m),
            jacobian: DMatrix::zeros(m, n),
            gradient: DVector::zeros(n),
            hessian: DMatrix::zeros(n, n),
            cost: 0.0,
            staged: false,
        })
    }

    /// copy the iteration inputs into the workspace and recompute B = J^T J
    pub fn stage(
        &mut self,
        x: &DVector<f64>,
        residuals: &DVector<f64>,
        jacobian: &DMatrix<f64>,
        gradient: &DVector<f64>,
        fx: f64,
    ) -> Result<(), DoglegError> {
        check_len("parameters", self.n, x.len())?;
        check_len("residuals", self.m, residuals.len())?;
        check_len("jacobian rows", self.m, jacobian.nrows())?;
        check_len("jacobian columns", self.n, jacobian.ncols())?;
        check_len("gradient", self.n, gradient.len())?;

        self.residuals.copy_from(residuals);
        self.jacobian.copy_from(jacobian);
        self.gradient.copy_from(gradient);
        self.jacobian.tr_mul_to(&self.jacobian, &mut self.hessian);

        let derived = 0.5 * self.residuals.norm_squared();
        self.cost = if fx.is_nan() || fx < 0.0 {
            derived
        } else {
            if (fx - derived).abs() > COST_CONSISTENCY_TOL * derived.max(f64::MIN_POSITIVE) {
                debug!(
                    "supplied cost {:.6e} differs from 0.5*||r||^2 = {:.6e}",
                    fx, derived
                );
            }
            fx
        };
        self.staged = true;
        Ok(())
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn is_staged(&self) -> bool {
        self.staged
    }

    pub fn residuals(&self) -> &DVector<f64> {
        &self.residuals
    }

    pub fn jacobian(&self) -> &DMatrix<f64> {
        &self.jacobian
    }

    pub fn gradient(&self) -> &DVector<f64> {
        &self.gradient
    }

    /// B = J^T J
    pub fn hessian(&self) -> &DMatrix<f64> {
        &self.hessian
    }

    /// m(0)
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// v^T B v, column by column since (B v)_j = B_:j^T v for symmetric B
    pub fn curvature(&self, v: &DVector<f64>) -> f64 {
        self.hessian
            .column_iter()
            .zip(v.iter())
            .map(|(column, v_j)| column.dot(v) * v_j)
            .sum()
    }

    /// m(h)
    pub fn value(&self, h: &DVector<f64>) -> f64 {
        self.cost + h.dot(&self.gradient) + 0.5 * self.curvature(h)
    }

    /// m(0) - m(h) = -(h^T g + 0.5 h^T B h)
    pub fn predicted_reduction(&self, h: &DVector<f64>) -> f64 {
        -(h.dot(&self.gradient) + 0.5 * self.curvature(h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn staged_model() -> QuadraticModel {
        let jacobian = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 1.0, 2.0, 2.0]);
        let residuals = DVector::from_vec(vec![1.0, -1.0, 0.5]);
        let gradient = jacobian.transpose() * &residuals;
        let x = DVector::zeros(2);
        let mut model = QuadraticModel::new(2, 3).unwrap();
        model.stage(&x, &residuals, &jacobian, &gradient, -1.0).unwrap();
        model
    }

    #[test]
    fn test_new_rejects_empty_sizes() {
        assert!(matches!(
            QuadraticModel::new(0, 3),
            Err(DoglegError::DimensionError { .. })
        ));
        assert!(matches!(
            QuadraticModel::new(2, 0),
            Err(DoglegError::DimensionError { .. })
        ));
    }

    #[test]
    fn test_stage_computes_hessian_and_cost() {
        let model = staged_model();
        assert!(model.is_staged());
        let jacobian = model.jacobian().clone();
        assert_relative_eq!(
            model.hessian().clone(),
            jacobian.transpose() * &jacobian,
            epsilon = 1e-14
        );
        // cost derived from residuals: 0.5*(1 + 1 + 0.25)
        assert_relative_eq!(model.cost(), 1.125, epsilon = 1e-14);
    }

    #[test]
    fn test_stage_keeps_supplied_cost() {
        let mut model = staged_model();
        let x = DVector::zeros(2);
        let residuals = model.residuals().clone();
        let jacobian = model.jacobian().clone();
        let gradient = model.gradient().clone();
        model.stage(&x, &residuals, &jacobian, &gradient, 7.0).unwrap();
        assert_eq!(model.cost(), 7.0);
    }

    #[test]
    fn test_stage_dimension_errors() {
        let mut model = QuadraticModel::new(2, 3).unwrap();
        let x = DVector::zeros(2);
        let residuals = DVector::zeros(3);
        let jacobian = DMatrix::zeros(3, 2);
        let gradient = DVector::zeros(2);
        let err = model
            .stage(&DVector::zeros(3), &residuals, &jacobian, &gradient, -1.0)
            .unwrap_err();
        assert!(matches!(err, DoglegError::DimensionError { what: "parameters", .. }));
        let err = model
            .stage(&x, &DVector::zeros(2), &jacobian, &gradient, -1.0)
            .unwrap_err();
        assert!(matches!(err, DoglegError::DimensionError { what: "residuals", .. }));
        let err = model
            .stage(&x, &residuals, &DMatrix::zeros(2, 2), &gradient, -1.0)
            .unwrap_err();
        assert!(matches!(err, DoglegError::DimensionError { what: "jacobian rows", .. }));
        let err = model
            .stage(&x, &residuals, &DMatrix::zeros(3, 3), &gradient, -1.0)
            .unwrap_err();
        assert!(matches!(err, DoglegError::DimensionError { what: "jacobian columns", .. }));
        let err = model
            .stage(&x, &residuals, &jacobian, &DVector::zeros(1), -1.0)
            .unwrap_err();
        assert!(matches!(err, DoglegError::DimensionError { what: "gradient", .. }));
        assert!(!model.is_staged());
    }

    #[test]
    fn test_model_value_matches_residual_cost() {
        // for a linear residual r(h) = r + J h the model is exact
        let model = staged_model();
        let h = DVector::from_vec(vec![0.3, -0.2]);
        let r_h = model.residuals() + model.jacobian() * &h;
        assert_relative_eq!(model.value(&h), 0.5 * r_h.norm_squared(), epsilon = 1e-12);
        assert_relative_eq!(
            model.predicted_reduction(&h),
            model.cost() - model.value(&h),
            epsilon = 1e-12
        );
        assert_eq!(model.predicted_reduction(&DVector::zeros(2)), 0.0);
    }

    #[test]
    fn test_curvature() {
        let model = staged_model();
        let v = DVector::from_vec(vec![1.0, -1.0]);
        let jv = model.jacobian() * &v;
        assert_relative_eq!(model.curvature(&v), jv.norm_squared(), epsilon = 1e-12);
    }
}
