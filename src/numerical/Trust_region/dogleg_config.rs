//! settings of the dogleg step: which linear solver computes the Gauss-Newton point, the relative
//! singularity tolerance and logging options
use super::trust_region_step::DoglegError;
use crate::Utils::logger::loglevel_from_str;
use crate::somelinalg::normal_equations::LinearSolverKind;
use simplelog::LevelFilter;
use std::collections::HashMap;
use std::str::FromStr;

/// default relative tolerance for the singularity checks of the Gauss-Newton solvers
pub const DEFAULT_SINGULAR_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct DoglegConfig {
    pub linear_solver: LinearSolverKind,
    /// pivots of the Jacobi scaled B below singular_tolerance mean B is treated as singular
    pub singular_tolerance: f64,
    /// "trace", "debug", "info", "warn", "error" or "off"; None leaves the global logger alone
    pub loglevel: Option<String>,
    /// log file name, "auto" for a timestamped one
    pub log_file: Option<String>,
}

impl Default for DoglegConfig {
    fn default() -> Self {
        DoglegConfig {
            linear_solver: LinearSolverKind::default(),
            singular_tolerance: DEFAULT_SINGULAR_TOLERANCE,
            loglevel: None,
            log_file: None,
        }
    }
}

impl DoglegConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_linear_solver(mut self, kind: LinearSolverKind) -> Self {
        self.linear_solver = kind;
        self
    }

    pub fn with_singular_tolerance(mut self, tolerance: f64) -> Self {
        self.singular_tolerance = tolerance;
        self
    }

    pub fn with_loglevel(mut self, level: &str) -> Self {
        self.loglevel = Some(level.to_string());
        self
    }

    pub fn with_log_file(mut self, name: &str) -> Self {
        self.log_file = Some(name.to_string());
        self
    }

    /// build config from key-value settings, e.g. {"linear_solver": "qr", "loglevel": "info"}
    pub fn from_map(settings: &HashMap<String, String>) -> Result<Self, DoglegError> {
        let mut config = DoglegConfig::default();
        for (key, value) in settings {
            match key.as_str() {
                "linear_solver" => {
                    config.linear_solver = LinearSolverKind::from_str(value.trim()).map_err(|_| {
                        DoglegError::InvalidConfig(format!(
                            "unknown linear solver '{}', choose cholesky, lu or qr",
                            value
                        ))
                    })?;
                }
                "singular_tolerance" => {
                    config.singular_tolerance = value.trim().parse::<f64>().map_err(|_| {
                        DoglegError::InvalidConfig(format!(
                            "singular_tolerance must be a number, got '{}'",
                            value
                        ))
                    })?;
                }
                "loglevel" => config.loglevel = Some(value.trim().to_string()),
                "log_file" => config.log_file = Some(value.trim().to_string()),
                _ => {
                    return Err(DoglegError::InvalidConfig(format!(
                        "unknown setting '{}'",
                        key
                    )));
                }
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DoglegError> {
        if !(self.singular_tolerance >= 0.0 && self.singular_tolerance < 1.0) {
            return Err(DoglegError::InvalidConfig(format!(
                "singular_tolerance must be in [0, 1), got {}",
                self.singular_tolerance
            )));
        }
        self.log_filter()?;
        Ok(())
    }

    /// None when logging is not requested or switched off
    pub fn log_filter(&self) -> Result<Option<LevelFilter>, DoglegError> {
        match &self.loglevel {
            Some(level) => loglevel_from_str(level).map_err(DoglegError::InvalidConfig),
            None => Ok(None),
        }
    }
}
