//! Powell's dogleg step (Nocedal & Wright, ch. 4.1; Madsen, Nielsen, Tingleff "Methods for non-linear
//! least squares problems", 3.3).
//!
//! The dogleg path runs from the origin to the Cauchy point p_C and from there to the Gauss-Newton
//! point p_GN. The step is the point where the path leaves the trust region, or p_GN if the whole
//! path is inside. Three regimes, checked in this order:
//! 1. GaussNewton: p_GN exists and ||p_GN|| <= delta  => h = p_GN
//! 2. Cauchy: p_GN is unavailable (singular B) or ||p_C|| >= delta => h = p_C clipped to delta
//! 3. Combined: ||p_C|| < delta < ||p_GN||  => h = p_C + tau (p_GN - p_C) with ||h|| = delta
use super::cauchy_step::CauchyPoint;
use super::dogleg_config::DoglegConfig;
use super::gauss_newton_step::GaussNewtonStep;
use super::quadratic_model::QuadraticModel;
use super::trust_region_step::{
    DoglegError, StepDiagnostics, StepRegime, TrustRegionStep, check_len, check_radius,
};
use crate::Utils::logger::init_logger;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};

/// Workspace of the dogleg algorithm for one problem size
pub struct DoglegState {
    /// staged inputs, B = J^T J
    model: QuadraticModel,
    cauchy: CauchyPoint,
    gauss_newton: GaussNewtonStep,
    /// unclipped Cauchy point, size n
    dx_sd: DVector<f64>,
    inputs_set: bool,
    diagnostics: StepDiagnostics,
}

impl DoglegState {
    pub fn new(n: usize, m: usize, config: &DoglegConfig) -> Result<Self, DoglegError> {
        Ok(DoglegState {
            model: QuadraticModel::new(n, m)?,
            cauchy: CauchyPoint::default(),
            gauss_newton: GaussNewtonStep::new(
                config.linear_solver,
                config.singular_tolerance,
                n,
                m,
            ),
            dx_sd: DVector::zeros(n),
            inputs_set: false,
            diagnostics: StepDiagnostics::default(),
        })
    }

    /// stage inputs of a new iteration and compute the radius-independent Cauchy data.
    /// The Gauss-Newton point is left for the first step that needs it
    pub fn preloop(
        &mut self,
        x: &DVector<f64>,
        residuals: &DVector<f64>,
        jacobian: &DMatrix<f64>,
        gradient: &DVector<f64>,
        fx: f64,
    ) -> Result<(), DoglegError> {
        self.inputs_set = false;
        self.gauss_newton.invalidate();
        self.model.stage(x, residuals, jacobian, gradient, fx)?;
        self.cauchy = CauchyPoint::compute(&self.model);
        self.inputs_set = true;
        Ok(())
    }

    /// compute the dogleg step for radius `delta`, returns the regime and whether the step is on the boundary
    pub fn step(&mut self, delta: f64, dx: &mut DVector<f64>) -> Result<(StepRegime, bool), DoglegError> {
        if !self.inputs_set {
            return Err(DoglegError::InputsNotSet);
        }
        check_len("step", self.model.n(), dx.len())?;

        self.diagnostics = StepDiagnostics {
            gauss_newton_failed: false,
            non_positive_curvature: self.cauchy.is_unbounded(),
            zero_gradient: self.cauchy.is_zero_gradient(),
            condition_number: None,
        };
        let norm_gn = match self.gauss_newton.compute(&self.model) {
            Ok(norm) => Some(norm),
            Err(_) => {
                self.diagnostics.gauss_newton_failed = true;
                self.diagnostics.condition_number = self.gauss_newton.condition_number();
                None
            }
        };

        // CASE 1: Gauss-Newton step is inside the trust region
        if let (Some(norm_gn), Some(dx_gn)) = (norm_gn, self.gauss_newton.step()) {
            if norm_gn <= delta {
                info!(
                    "Gauss-Newton step inside trust region: ||p_GN|| = {:.4e} <= delta = {:.4e}",
                    norm_gn, delta
                );
                dx.copy_from(dx_gn);
                return Ok((StepRegime::GaussNewton, false));
            }
        }

        // CASE 2: no Gauss-Newton point, or the Cauchy point reaches the boundary
        if norm_gn.is_none() || self.cauchy.unconstrained_norm() >= delta {
            let clipped = self.cauchy.write_step(self.model.gradient(), delta, dx);
            info!(
                "Cauchy step: ||p_C|| = {:.4e}, delta = {:.4e}, clipped = {}",
                self.cauchy.unconstrained_norm(),
                delta,
                clipped
            );
            return Ok((StepRegime::Cauchy, clipped));
        }

        // CASE 3: ||p_C|| < delta < ||p_GN||, move from p_C towards p_GN up to the boundary
        self.cauchy
            .write_step(self.model.gradient(), delta, &mut self.dx_sd);
        let tau = self.compute_dogleg_tau(delta);
        debug!("tau = {}", tau);
        if let Some(dx_gn) = self.gauss_newton.step() {
            for i in 0..dx.len() {
                dx[i] = self.dx_sd[i] + tau * (dx_gn[i] - self.dx_sd[i]);
            }
        }
        info!(
            "combined step on the boundary: tau = {:.6}, delta = {:.4e}",
            tau, delta
        );
        Ok((StepRegime::Combined, true))
    }

    /// Find tau in [0, 1] with ||p_C + tau (p_GN - p_C)|| = delta, i.e. the positive root of
    ///   a tau^2 + b tau + c = 0,  a = ||d||^2,  b = 2 p_C^T d,  c = ||p_C||^2 - delta^2,  d = p_GN - p_C
    /// c < 0 here, so the roots have opposite signs and the positive one is taken.
    /// Lengths are measured in units of delta so that b^2 stays finite for huge steps
    fn compute_dogleg_tau(&self, delta: f64) -> f64 {
        let dx_gn = match self.gauss_newton.step() {
            Some(dx_gn) => dx_gn,
            None => return 0.0,
        };
        let mut a = 0.0;
        let mut b = 0.0;
        for (sd, gn) in self.dx_sd.iter().zip(dx_gn.iter()) {
            let sd = sd / delta;
            let d = gn / delta - sd;
            a += d * d;
            b += sd * d;
        }
        b *= 2.0;
        if a <= 0.0 {
            return 1.0;
        }
        let norm_sd = self.dx_sd.norm() / delta;
        // c = (||p_C|| + 1)(||p_C|| - 1) avoids cancellation when ||p_C|| is close to delta
        let c = (norm_sd + 1.0) * (norm_sd - 1.0);
        let discriminant = (b * b - 4.0 * a * c).max(0.0);
        // numerically stable formula: never subtract two numbers of the same sign
        let tau = if b > 0.0 {
            (-2.0 * c) / (b + discriminant.sqrt())
        } else {
            (-b + discriminant.sqrt()) / (2.0 * a)
        };
        tau.clamp(0.0, 1.0)
    }

    pub fn model(&self) -> &QuadraticModel {
        &self.model
    }

    pub fn cauchy_point(&self) -> &CauchyPoint {
        &self.cauchy
    }

    pub fn gauss_newton(&self) -> &GaussNewtonStep {
        &self.gauss_newton
    }

    pub fn diagnostics(&self) -> StepDiagnostics {
        self.diagnostics
    }
}

/// High-level interface of the dogleg step, used by the outer trust-region driver
///  Example#1
/// ```
/// use RustedDogleg::numerical::Trust_region::dogleg_config::DoglegConfig;
/// use RustedDogleg::numerical::Trust_region::dogleg_step::DoglegStep;
/// use RustedDogleg::numerical::Trust_region::trust_region_step::{StepRegime, TrustRegionStep};
/// use nalgebra::{DMatrix, DVector};
///
/// let jacobian = DMatrix::from_row_slice(3, 2, &[1.0, 0.5, 2.0, 2.0_f64.sqrt(), -2.0, 4.0]);
/// let residuals = DVector::from_vec(vec![-1.0, -2.0, -3.0]);
/// let gradient = jacobian.transpose() * &residuals;
/// let x = DVector::from_vec(vec![0.5, 1.5]);
///
/// let mut dogleg = DoglegStep::new(DoglegConfig::default());
/// dogleg.init(2, 3).unwrap();
/// dogleg.set_inputs(&x, &residuals, &jacobian, &gradient, -1.0).unwrap();
/// let mut step = DVector::zeros(2);
/// let regime = dogleg.compute_step(10.0, &mut step).unwrap();
/// assert_eq!(regime, StepRegime::GaussNewton);
/// assert!(!dogleg.is_max_step());
/// assert!(dogleg.predicted_reduction() > 0.0);
/// ```
pub struct DoglegStep {
    config: DoglegConfig,
    state: Option<DoglegState>,
    max_step: bool,
    predicted_reduction: f64,
    last_regime: Option<StepRegime>,
}

impl Default for DoglegStep {
    fn default() -> Self {
        DoglegStep::new(DoglegConfig::default())
    }
}

impl DoglegStep {
    pub fn new(config: DoglegConfig) -> Self {
        DoglegStep {
            config,
            state: None,
            max_step: false,
            predicted_reduction: 0.0,
            last_regime: None,
        }
    }

    pub fn config(&self) -> &DoglegConfig {
        &self.config
    }

    /// regime of the most recent step
    pub fn last_regime(&self) -> Option<StepRegime> {
        self.last_regime
    }

    pub fn diagnostics(&self) -> StepDiagnostics {
        self.state
            .as_ref()
            .map(|state| state.diagnostics())
            .unwrap_or_default()
    }

    pub fn state(&self) -> Option<&DoglegState> {
        self.state.as_ref()
    }

    /// p_GN for the staged inputs, if it has been computed and B was not singular
    pub fn gauss_newton_step(&self) -> Option<&DVector<f64>> {
        self.state
            .as_ref()
            .and_then(|state| state.gauss_newton().step())
    }

    fn init_logging(&self) -> Result<(), DoglegError> {
        if let Some(level) = self.config.log_filter()? {
            // a logger installed earlier stays in place
            init_logger(level, self.config.log_file.as_deref()).map_err(|e| {
                DoglegError::InvalidConfig(format!(
                    "cannot open log file {:?}: {}",
                    self.config.log_file, e
                ))
            })?;
        }
        Ok(())
    }
}

impl TrustRegionStep for DoglegStep {
    fn init(&mut self, n: usize, m: usize) -> Result<(), DoglegError> {
        self.config.validate()?;
        self.init_logging()?;
        self.state = None;
        self.state = Some(DoglegState::new(n, m, &self.config)?);
        self.max_step = false;
        self.predicted_reduction = 0.0;
        self.last_regime = None;
        info!(
            "dogleg step initialized: {} parameters, {} residuals, {} solver",
            n, m, self.config.linear_solver
        );
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
        let state = self.state.as_mut().ok_or(DoglegError::NotInitialized)?;
        state.preloop(x, residuals, jacobian, gradient, fx)
    }

    fn compute_step(
        &mut self,
        radius: f64,
        step: &mut DVector<f64>,
    ) -> Result<StepRegime, DoglegError> {
        check_radius(radius)?;
        let state = self.state.as_mut().ok_or(DoglegError::NotInitialized)?;
        let (regime, max_step) = state.step(radius, step)?;
        let predicted_reduction = state.model().predicted_reduction(step);
        if predicted_reduction < 0.0 {
            warn!(
                "negative predicted reduction {:.3e} in {} regime, the model is badly conditioned",
                predicted_reduction, regime
            );
        }
        self.max_step = max_step;
        self.predicted_reduction = predicted_reduction;
        self.last_regime = Some(regime);
        Ok(regime)
    }

    fn is_max_step(&self) -> bool {
        self.max_step
    }

    fn predicted_reduction(&self) -> f64 {
        self.predicted_reduction
    }
}
