//! Cauchy point: minimizer of the quadratic model along the steepest descent direction -g,
//! clipped to the trust region
//!   p_C = -alpha g,  alpha = min(||g||^2 / g^T B g,  delta / ||g||)
use super::quadratic_model::QuadraticModel;
use super::trust_region_step::{
    DoglegError, StepDiagnostics, StepRegime, TrustRegionStep, check_len, check_radius,
};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

/// radius-independent part of the Cauchy point, computed once per staged inputs
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CauchyPoint {
    /// ||g||
    gradient_norm: f64,
    /// g^T B g
    curvature: f64,
    /// ||p_C|| without the radius bound, infinite if the model is unbounded along -g
    unconstrained_norm: f64,
}

impl CauchyPoint {
    pub fn compute(model: &QuadraticModel) -> Self {
        let gradient = model.gradient();
        let gradient_norm = gradient.norm();
        if gradient_norm == 0.0 {
            return CauchyPoint {
                gradient_norm,
                curvature: 0.0,
                unconstrained_norm: 0.0,
            };
        }
        let curvature = model.curvature(gradient);
        // ||alpha g|| = ||g||^3 / g^T B g, ordered so that ||g||^3 is never formed
        let unconstrained_norm = if curvature > 0.0 {
            (gradient_norm / curvature) * gradient_norm * gradient_norm
        } else {
            warn!(
                "non-positive curvature along the gradient: g^T B g = {:.3e}",
                curvature
            );
            f64::INFINITY
        };
        debug!(
            "Cauchy point: ||g|| = {:.4e}, g^T B g = {:.4e}, ||p_C|| = {:.4e}",
            gradient_norm, curvature, unconstrained_norm
        );
        CauchyPoint {
            gradient_norm,
            curvature,
            unconstrained_norm,
        }
    }

    pub fn gradient_norm(&self) -> f64 {
        self.gradient_norm
    }

    pub fn curvature(&self) -> f64 {
        self.curvature
    }

    pub fn unconstrained_norm(&self) -> f64 {
        self.unconstrained_norm
    }

    pub fn is_zero_gradient(&self) -> bool {
        self.gradient_norm == 0.0
    }

    /// g^T B g <= 0 with a nonzero gradient
    pub fn is_unbounded(&self) -> bool {
        !self.is_zero_gradient() && !(self.curvature > 0.0)
    }

    /// write p_C for the given radius into `out`, returns true if the step was clipped to the radius
    pub fn write_step(&self, gradient: &DVector<f64>, radius: f64, out: &mut DVector<f64>) -> bool {
        if self.is_zero_gradient() {
            out.fill(0.0);
            return false;
        }
        let (length, clipped) = if self.unconstrained_norm >= radius {
            (radius, true)
        } else {
            (self.unconstrained_norm, false)
        };
        out.copy_from(gradient);
        out.scale_mut(-length / self.gradient_norm);
        clipped
    }
}

/// Trust region step that only ever follows the steepest descent direction
#[derive(Debug, Clone, Default)]
pub struct CauchyStep {
    model: Option<QuadraticModel>,
    point: Option<CauchyPoint>,
    max_step: bool,
    predicted_reduction: f64,
    diagnostics: StepDiagnostics,
}

impl CauchyStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cauchy_point(&self) -> Option<&CauchyPoint> {
        self.point.as_ref()
    }

    pub fn model(&self) -> Option<&QuadraticModel> {
        self.model.as_ref()
    }

    pub fn diagnostics(&self) -> StepDiagnostics {
        self.diagnostics
    }
}

impl TrustRegionStep for CauchyStep {
    fn init(&mut self, n: usize, m: usize) -> Result<(), DoglegError> {
        self.model = Some(QuadraticModel::new(n, m)?);
        self.point = None;
        self.max_step = false;
        self.predicted_reduction = 0.0;
        self.diagnostics = StepDiagnostics::default();
        Ok(())
    }

    fn set_inputs(
        &mut self,
        x: &DVector<f64>,
        residuals: &DVector<f64>,
        jacobian: &DMatrix<f64>,
        gradient: &DVector<f64>,
        fx: f64,
    ) -> Result<(), DoglegError> {
        let model = self.model.as_mut().ok_or(DoglegError::NotInitialized)?;
        self.point = None;
        model.stage(x, residuals, jacobian, gradient, fx)?;
        self.point = Some(CauchyPoint::compute(model));
        Ok(())
    }

    fn compute_step(
        &mut self,
        radius: f64,
        step: &mut DVector<f64>,
    ) -> Result<StepRegime, DoglegError> {
        check_radius(radius)?;
        let model = self.model.as_ref().ok_or(DoglegError::NotInitialized)?;
        let point = self.point.as_ref().ok_or(DoglegError::InputsNotSet)?;
        check_len("step", model.n(), step.len())?;

        self.max_step = point.write_step(model.gradient(), radius, step);
        self.predicted_reduction = model.predicted_reduction(step);
        self.diagnostics = StepDiagnostics {
            gauss_newton_failed: false,
            non_positive_curvature: point.is_unbounded(),
            zero_gradient: point.is_zero_gradient(),
            condition_number: None,
        };
        Ok(StepRegime::Cauchy)
    }

    fn is_max_step(&self) -> bool {
        self.max_step
    }

    fn predicted_reduction(&self) -> f64 {
        self.predicted_reduction
    }
}
