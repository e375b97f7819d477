//! Common contract of the trust-region step solvers consumed by an outer least-squares driver.
//!
//! The driver calls `init(n, m)` once per problem size, then every iteration stages fresh inputs with
//! `set_inputs`, asks for a step with `compute_step` and reads `is_max_step` and `predicted_reduction`
//! to update its trust region radius.
use nalgebra::{DMatrix, DVector};
use std::fmt;
use strum_macros::Display;

/// Error types for the trust-region step solvers. Numerical degeneracy of the cost surface is not an
/// error: it is absorbed by regime selection and reported through `StepDiagnostics`
#[derive(Debug, Clone, PartialEq)]
pub enum DoglegError {
    /// shape of an input disagrees with the sizes declared at `init`
    DimensionError {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    InvalidRadius(f64),
    NotInitialized,
    InputsNotSet,
    InvalidConfig(String),
}

impl fmt::Display for DoglegError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DoglegError::DimensionError {
                what,
                expected,
                found,
            } => write!(
                f,
                "dimension mismatch in {}: expected {}, found {}",
                what, expected, found
            ),
            DoglegError::InvalidRadius(radius) => {
                write!(f, "trust region radius must be positive and finite, got {}", radius)
            }
            DoglegError::NotInitialized => write!(f, "init must be called before use"),
            DoglegError::InputsNotSet => write!(f, "set_inputs must be called before compute_step"),
            DoglegError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for DoglegError {}

/// which branch of the dogleg path produced the step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StepRegime {
    /// steepest descent step, clipped to the radius when it reaches the boundary
    Cauchy,
    /// unconstrained minimizer of the model inside the trust region
    GaussNewton,
    /// intersection of the Cauchy to Gauss-Newton segment with the boundary
    Combined,
}

/// ill-conditioning observed while computing the most recent step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepDiagnostics {
    /// B = J^T J was singular or indefinite, the Gauss-Newton point was unavailable
    pub gauss_newton_failed: bool,
    /// g^T B g <= 0, the model is unbounded along -g
    pub non_positive_curvature: bool,
    pub zero_gradient: bool,
    /// condition number of B, estimated only when the Gauss-Newton solve failed
    pub condition_number: Option<f64>,
}

impl StepDiagnostics {
    pub fn is_degenerate(&self) -> bool {
        self.gauss_newton_failed || self.non_positive_curvature || self.zero_gradient
    }
}

pub trait TrustRegionStep {
    /// size all workspace for n parameters and m residuals
    fn init(&mut self, n: usize, m: usize) -> Result<(), DoglegError>;
    /// stage the linear algebra of the current iteration. `fx < 0` means the cost is unknown
    /// and is derived from the residuals as 0.5*||r||^2
    fn set_inputs(
        &mut self,
        x: &DVector<f64>,
        residuals: &DVector<f64>,
        jacobian: &DMatrix<f64>,
        gradient: &DVector<f64>,
        fx: f64,
    ) -> Result<(), DoglegError>;
    /// write the step for the given radius into `step`
    fn compute_step(
        &mut self,
        radius: f64,
        step: &mut DVector<f64>,
    ) -> Result<StepRegime, DoglegError>;
    /// true if the last step lies on the trust region boundary
    fn is_max_step(&self) -> bool;
    /// m(0) - m(h) for the last step h
    fn predicted_reduction(&self) -> f64;
}

pub(crate) fn check_radius(radius: f64) -> Result<(), DoglegError> {
    if radius > 0.0 && radius.is_finite() {
        Ok(())
    } else {
        Err(DoglegError::InvalidRadius(radius))
    }
}

pub(crate) fn check_len(what: &'static str, expected: usize, found: usize) -> Result<(), DoglegError> {
    if expected == found {
        Ok(())
    } else {
        Err(DoglegError::DimensionError {
            what,
            expected,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_radius() {
        assert!(check_radius(0.5).is_ok());
        assert_eq!(check_radius(0.0), Err(DoglegError::InvalidRadius(0.0)));
        assert_eq!(check_radius(-1.0), Err(DoglegError::InvalidRadius(-1.0)));
        assert!(check_radius(f64::NAN).is_err());
        assert!(check_radius(f64::INFINITY).is_err());
    }

    #[test]
    fn test_check_len() {
        assert!(check_len("gradient", 2, 2).is_ok());
        let err = check_len("gradient", 2, 3).unwrap_err();
        assert_eq!(
            err.to_string(),
            "dimension mismatch in gradient: expected 2, found 3"
        );
    }

    #[test]
    fn test_regime_display() {
        assert_eq!(StepRegime::Cauchy.to_string(), "Cauchy");
        assert_eq!(StepRegime::GaussNewton.to_string(), "GaussNewton");
        assert_eq!(StepRegime::Combined.to_string(), "Combined");
    }

    #[test]
    fn test_diagnostics_default() {
        let diagnostics = StepDiagnostics::default();
        assert!(!diagnostics.is_degenerate());
        assert_eq!(diagnostics.condition_number, None);
    }
}
