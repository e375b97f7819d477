//! numerical methods for nonlinear least squares
/// Trust region step computation: Cauchy point, Gauss-Newton point and Powell's dogleg between them
/// Example#1
/// ```
/// use RustedDogleg::numerical::Trust_region::dogleg_config::DoglegConfig;
/// use RustedDogleg::numerical::Trust_region::dogleg_step::DoglegStep;
/// use RustedDogleg::numerical::Trust_region::trust_region_step::{StepRegime, TrustRegionStep};
/// use RustedDogleg::somelinalg::normal_equations::LinearSolverKind;
/// use nalgebra::{DMatrix, DVector};
///
/// // r(x) = J x - b, staged at x = 0
/// let jacobian = DMatrix::from_row_slice(3, 2, &[1.0, 0.5, 2.0, 2.0_f64.sqrt(), -2.0, 4.0]);
/// let residuals = DVector::from_vec(vec![-1.0, -2.0, -3.0]);
/// let gradient = jacobian.transpose() * &residuals;
/// let x = DVector::zeros(2);
/// let fx = 0.5 * residuals.norm_squared();
///
/// let config = DoglegConfig::new().with_linear_solver(LinearSolverKind::Qr);
/// let mut dogleg = DoglegStep::new(config);
/// dogleg.init(2, 3).unwrap();
/// dogleg.set_inputs(&x, &residuals, &jacobian, &gradient, fx).unwrap();
///
/// let mut step = DVector::zeros(2);
/// // the Gauss-Newton point is outside, the path leaves the region between p_C and p_GN
/// let regime = dogleg.compute_step(0.9, &mut step).unwrap();
/// assert_eq!(regime, StepRegime::Combined);
/// assert!(dogleg.is_max_step());
/// assert!((step.norm() - 0.9).abs() < 1e-8);
/// println!("step = {}, predicted reduction = {}", step, dogleg.predicted_reduction());
/// ```
pub mod Trust_region;
