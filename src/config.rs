use serde::{Deserialize, Serialize};

use crate::error::{LdaError, Result};

/// How the per-term responsibilities are seeded before the first sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Initialization {
    /// Normalized uniform draws from a generator seeded with `seed`.
    #[default]
    Random,
    /// Every topic gets `1/K`. Symmetric data then stays symmetric.
    Uniform,
}

/// Which collapsed variational update to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approximation {
    /// CVB0: expected counts only, the term's own contribution removed.
    #[default]
    Zeroth,
    /// CVB with the Gaussian second-order (variance) correction.
    SecondOrder,
}

/// Hyperparameters and run settings for [`crate::LdaCvb`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LdaConfig {
    /// Number of topics K.
    pub num_topics: usize,
    /// Document-topic Dirichlet prior.
    pub alpha: f64,
    /// Topic-term Dirichlet prior.
    pub beta: f64,
    /// Upper bound on full sweeps over the dataset.
    pub num_iterations: usize,
    pub seed: u64,
    /// Stop early once the L1 change of phi and theta in one sweep drops below this.
    pub convergence_tolerance: Option<f64>,
    /// Worker threads for one sweep. 1 runs a sequential Gauss-Seidel sweep.
    pub num_threads: usize,
    pub initialization: Initialization,
    pub approximation: Approximation,
}

impl Default for LdaConfig {
    fn default() -> Self {
        Self {
            num_topics: 2,
            alpha: 1.0,
            beta: 0.01,
            num_iterations: 10,
            seed: 42,
            convergence_tolerance: None,
            num_threads: 1,
            initialization: Initialization::Random,
            approximation: Approximation::Zeroth,
        }
    }
}

impl LdaConfig {
    #[must_use]
    pub fn new(num_topics: usize, alpha: f64, beta: f64) -> Self {
        Self {
            num_topics,
            alpha,
            beta,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_iterations(mut self, num_iterations: usize) -> Self {
        self.num_iterations = num_iterations;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.convergence_tolerance = Some(tolerance);
        self
    }

    #[must_use]
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    #[must_use]
    pub fn with_initialization(mut self, initialization: Initialization) -> Self {
        self.initialization = initialization;
        self
    }

    #[must_use]
    pub fn with_approximation(mut self, approximation: Approximation) -> Self {
        self.approximation = approximation;
        self
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.num_topics < 1 {
            return Err(LdaError::InvalidHyperparameter(
                "num_topics must be at least 1".to_string(),
            ));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(LdaError::InvalidHyperparameter(format!(
                "alpha must be a finite value > 0, got {}",
                self.alpha
            )));
        }
        if !(self.beta.is_finite() && self.beta > 0.0) {
            return Err(LdaError::InvalidHyperparameter(format!(
                "beta must be a finite value > 0, got {}",
                self.beta
            )));
        }
        if let Some(tol) = self.convergence_tolerance {
            if !(tol.is_finite() && tol >= 0.0) {
                return Err(LdaError::InvalidHyperparameter(format!(
                    "convergence_tolerance must be a finite value >= 0, got {tol}"
                )));
            }
        }
        if self.num_threads < 1 {
            return Err(LdaError::InvalidHyperparameter(
                "num_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
