//! Optimizer configuration.
//!
//! An [`OptimizerConfig`] can come from:
//! 1. A YAML file
//! 2. Environment variables (with `VARQ_` prefix)
//! 3. Default values
//!
//! Environment variables take precedence over the file, which takes
//! precedence over defaults. The configuration is handed to the optimizer by
//! value and never mutated during a run.

use std::f64::consts::FRAC_PI_4;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::cost::CostMode;
use crate::gradient::{GradientConfig, GradientMethod};
use crate::methods::Method;

/// Hyperparameters for one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Expected register width; checked against the circuit when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_qubits: Option<usize>,

    /// Expected layer count; checked against the circuit when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<usize>,

    /// Expected cost mode; checked against the evaluator when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_mode: Option<CostMode>,

    /// Update rule
    #[serde(default)]
    pub method: Method,

    /// Iteration cap
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Convergence tolerance
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Starting point
    #[serde(default)]
    pub initialization: InitPolicy,

    /// Gradient method and fallback
    #[serde(default)]
    pub gradient: GradientConfig,

    /// Seed for initialization, SPSA perturbations and shot sampling
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Wall-clock limit in seconds; a limit too large to represent means none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
}

/// How the initial parameter vector is chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InitPolicy {
    /// Independent uniform draws from `[low, high)`.
    Uniform {
        /// Lower bound
        low: f64,
        /// Upper bound
        high: f64,
    },
    /// All zeros.
    Zeros,
    /// A fixed vector; its length must match the circuit.
    Explicit {
        /// Parameter values
        values: Vec<f64>,
    },
}

impl Default for InitPolicy {
    fn default() -> Self {
        InitPolicy::Uniform {
            low: -FRAC_PI_4,
            high: FRAC_PI_4,
        }
    }
}

impl InitPolicy {
    /// Initial vector of length `n` (ignored for [`InitPolicy::Explicit`]).
    pub fn initial_parameters(&self, n: usize, seed: u64) -> Vec<f64> {
        match self {
            InitPolicy::Uniform { low, high } => {
                let mut rng = StdRng::seed_from_u64(seed);
                (0..n).map(|_| rng.gen_range(*low..*high)).collect()
            }
            InitPolicy::Zeros => vec![0.0; n],
            InitPolicy::Explicit { values } => values.clone(),
        }
    }
}

fn default_max_iterations() -> usize {
    200
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_seed() -> u64 {
    42
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            n_qubits: None,
            layers: None,
            cost_mode: None,
            method: Method::default(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            initialization: InitPolicy::default(),
            gradient: GradientConfig::default(),
            seed: default_seed(),
            timeout_seconds: None,
        }
    }
}

impl OptimizerConfig {
    /// Load and validate a YAML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::Io(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: OptimizerConfig =
            serde_yaml_ng::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml_ng::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration with the following precedence:
    /// 1. Environment variable overrides
    /// 2. The file, if provided
    /// 3. Defaults
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => OptimizerConfig::default(),
        };
        let config = config.merge_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `VARQ_*` overrides read through `lookup`.
    ///
    /// Absent variables leave fields unchanged. Values that do not parse are
    /// rejected rather than ignored.
    pub fn merge_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Validation(format!("{key}: cannot parse '{value}'")))
        }

        if let Some(v) = lookup("VARQ_MAX_ITERATIONS") {
            self.max_iterations = parsed("VARQ_MAX_ITERATIONS", &v)?;
        }
        if let Some(v) = lookup("VARQ_TOLERANCE") {
            self.tolerance = parsed("VARQ_TOLERANCE", &v)?;
        }
        if let Some(v) = lookup("VARQ_SEED") {
            self.seed = parsed("VARQ_SEED", &v)?;
        }
        if let Some(v) = lookup("VARQ_METHOD") {
            self.method = v.parse().map_err(ConfigError::Validation)?;
        }
        Ok(self)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::Validation(
                "max_iterations must be greater than 0".to_string(),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ConfigError::Validation(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        if self.n_qubits == Some(0) {
            return Err(ConfigError::Validation("n_qubits must be at least 1".to_string()));
        }
        if self.layers == Some(0) {
            return Err(ConfigError::Validation("layers must be at least 1".to_string()));
        }
        if let Some(timeout) = self.timeout_seconds {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "timeout_seconds must be positive, got {timeout}"
                )));
            }
        }

        self.method.validate().map_err(ConfigError::Validation)?;

        match &self.initialization {
            InitPolicy::Uniform { low, high } if !(low < high) => {
                return Err(ConfigError::Validation(format!(
                    "uniform initialization needs low < high, got [{low}, {high})"
                )));
            }
            InitPolicy::Explicit { values } if values.iter().any(|v| !v.is_finite()) => {
                return Err(ConfigError::Validation(
                    "explicit initial parameters must be finite".to_string(),
                ));
            }
            _ => {}
        }

        if !(self.gradient.fallback_step > 0.0) {
            return Err(ConfigError::Validation(format!(
                "gradient fallback_step must be positive, got {}",
                self.gradient.fallback_step
            )));
        }
        if let GradientMethod::FiniteDifference { step } = self.gradient.method {
            if !(step > 0.0) {
                return Err(ConfigError::Validation(format!(
                    "finite-difference step must be positive, got {step}"
                )));
            }
        }

        Ok(())
    }

    /// Set the update rule.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the initialization policy.
    pub fn with_initialization(mut self, initialization: InitPolicy) -> Self {
        self.initialization = initialization;
        self
    }

    /// Set the gradient settings.
    pub fn with_gradient(mut self, gradient: GradientConfig) -> Self {
        self.gradient = gradient;
        self
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set a wall-clock limit.
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Declare the register width and layer count the circuit must have.
    pub fn with_shape(mut self, n_qubits: usize, layers: usize) -> Self {
        self.n_qubits = Some(n_qubits);
        self.layers = Some(layers);
        self
    }

    /// Declare the cost mode the evaluator must use.
    pub fn with_cost_mode(mut self, mode: CostMode) -> Self {
        self.cost_mode = Some(mode);
        self
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The file could not be read.
    #[error("IO error: {0}")]
    Io(String),

    /// The document is not valid YAML for this schema.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A value is out of range.
    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OptimizerConfig::default();
        assert_eq!(config.method, Method::adam(0.1));
        assert_eq!(config.max_iterations, 200);
        assert_eq!(config.tolerance, 1e-6);
        assert_eq!(config.seed, 42);
        assert_eq!(config.gradient.method, GradientMethod::Analytic);
        assert!(config.gradient.fallback_to_finite_difference);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_takes_defaults() {
        let config = OptimizerConfig::from_yaml_str(
            "method:\n  name: spsa\n  a: 0.3\nmax_iterations: 50\n",
        )
        .unwrap();
        assert_eq!(config.max_iterations, 50);
        match config.method {
            Method::Spsa { a, c, .. } => {
                assert_eq!(a, 0.3);
                assert_eq!(c, 0.1);
            }
            other => panic!("unexpected method {other:?}"),
        }
        assert_eq!(config.initialization, InitPolicy::default());
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = OptimizerConfig::default()
            .with_method(Method::nelder_mead())
            .with_shape(3, 2)
            .with_initialization(InitPolicy::Explicit {
                values: vec![0.1, 0.2],
            })
            .with_timeout(5.0);
        let yaml = config.to_yaml().unwrap();
        assert_eq!(OptimizerConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(OptimizerConfig::default().with_max_iterations(0).validate().is_err());
        assert!(OptimizerConfig::default().with_tolerance(-1.0).validate().is_err());
        assert!(OptimizerConfig::default().with_timeout(0.0).validate().is_err());
        assert!(OptimizerConfig::default().with_shape(2, 0).validate().is_err());
        let inverted = OptimizerConfig::default()
            .with_initialization(InitPolicy::Uniform { low: 1.0, high: 0.0 });
        assert!(inverted.validate().is_err());
        assert!(
            OptimizerConfig::default()
                .with_method(Method::gradient_descent(0.0))
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_parse_error() {
        let err = OptimizerConfig::from_yaml_str("max_iterations: [1, 2]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_merge_env_overrides() {
        let env = |key: &str| match key {
            "VARQ_MAX_ITERATIONS" => Some("17".to_string()),
            "VARQ_METHOD" => Some("nelder-mead".to_string()),
            "VARQ_SEED" => Some("9".to_string()),
            _ => None,
        };
        let config = OptimizerConfig::default().merge_env(env).unwrap();
        assert_eq!(config.max_iterations, 17);
        assert_eq!(config.method, Method::nelder_mead());
        assert_eq!(config.seed, 9);
        assert_eq!(config.tolerance, 1e-6);
    }

    #[test]
    fn test_merge_env_rejects_garbage() {
        let env = |key: &str| (key == "VARQ_TOLERANCE").then(|| "small".to_string());
        let err = OptimizerConfig::default().merge_env(env).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_uniform_initialization_is_seeded_and_bounded() {
        let policy = InitPolicy::default();
        let a = policy.initial_parameters(8, 3);
        assert_eq!(a, policy.initial_parameters(8, 3));
        assert_ne!(a, policy.initial_parameters(8, 4));
        assert!(a.iter().all(|v| (-FRAC_PI_4..FRAC_PI_4).contains(v)));
        assert_eq!(InitPolicy::Zeros.initial_parameters(3, 0), vec![0.0; 3]);
    }
}
