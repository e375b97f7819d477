/// common interface of the steps, the step regime tag, diagnostics and errors
pub mod trust_region_step;
/// local quadratic model m(h) = f + h^T g + 0.5 h^T J^T J h and its predicted reduction
pub mod quadratic_model;
/// steepest descent step clipped to the trust region
pub mod cauchy_step;
/// Gauss-Newton point with a selectable linear solver
pub mod gauss_newton_step;
/// Powell's dogleg step
pub mod dogleg_step;
/// settings of the dogleg step
pub mod dogleg_config;
