use serde::{Deserialize, Serialize};

use crate::error::BlobNetError;
use crate::net::Net;
use crate::optim::regularizer::{L2Regularizer, Regularizer};
use crate::optim::Solver;

fn default_base_lr() -> f64 {
    0.01
}

fn default_max_iter() -> usize {
    1
}

/// Hyperparameters of [`SgdSolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SgdConfig {
    #[serde(default = "default_base_lr")]
    pub base_lr: f64,
    /// In `[0, 1)`; 0 disables the step history.
    #[serde(default)]
    pub momentum: f64,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default)]
    pub regularizer: Option<L2Regularizer>,
}

impl Default for SgdConfig {
    fn default() -> Self {
        SgdConfig {
            base_lr: default_base_lr(),
            momentum: 0.0,
            max_iter: default_max_iter(),
            regularizer: None,
        }
    }
}

impl SgdConfig {
    pub fn validate(&self) -> Result<(), BlobNetError> {
        let reason = if !(self.base_lr.is_finite() && self.base_lr > 0.0) {
            format!("base_lr must be finite and > 0, got {}", self.base_lr)
        } else if !(0.0..1.0).contains(&self.momentum) {
            format!("momentum must lie in [0, 1), got {}", self.momentum)
        } else if self.max_iter == 0 {
            "max_iter must be at least 1".to_string()
        } else {
            return match &self.regularizer {
                Some(reg) => reg.validate(),
                None => Ok(()),
            };
        };
        Err(BlobNetError::InvalidSolverConfig { reason })
    }
}

/// Stochastic gradient descent with momentum.
///
/// Each iteration rewrites every parameter gradient into
/// `step = momentum * previous_step + base_lr * grad` and lets
/// [`Net::update`] subtract it. The step history is indexed by the position
/// of the parameter in [`Net::parameters`], so a solver should stay bound to
/// one net.
#[derive(Debug)]
pub struct SgdSolver {
    config: SgdConfig,
    regularizer: Option<Box<dyn Regularizer>>,
    history: Vec<Option<Vec<f64>>>,
    iteration: usize,
}

impl SgdSolver {
    pub fn new(config: SgdConfig) -> Result<Self, BlobNetError> {
        config.validate()?;
        let regularizer = config
            .regularizer
            .map(|reg| Box::new(reg) as Box<dyn Regularizer>);
        Ok(SgdSolver {
            config,
            regularizer,
            history: Vec::new(),
            iteration: 0,
        })
    }

    /// Replaces the configured regularizer with any implementation.
    pub fn with_regularizer(mut self, regularizer: Box<dyn Regularizer>) -> Self {
        self.regularizer = Some(regularizer);
        self
    }

    pub fn config(&self) -> &SgdConfig {
        &self.config
    }

    /// Iterations run so far, across calls to [`Solver::solve`].
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// One forward/backward pass followed by one update. Returns the loss
    /// of that pass, without the regularization penalty.
    pub fn step(&mut self, net: &mut Net) -> Result<f64, BlobNetError> {
        let loss = net.forward_backward()?;
        let parameters = net.parameters()?;
        if self.history.len() < parameters.len() {
            self.history.resize(parameters.len(), None);
        }

        let mut penalty = 0.0;
        for (index, param) in parameters.iter().enumerate() {
            let gradient = match param.gradient() {
                Some(g) => g,
                None => continue,
            };
            if let Some(reg) = &self.regularizer {
                penalty += reg.reg(param)?;
            }
            let grad = gradient.to_f64_vec()?;
            let step: Vec<f64> = match &self.history[index] {
                Some(prev) if self.config.momentum != 0.0 && prev.len() == grad.len() => prev
                    .iter()
                    .zip(&grad)
                    .map(|(p, g)| self.config.momentum * p + self.config.base_lr * g)
                    .collect(),
                _ => grad.iter().map(|g| self.config.base_lr * g).collect(),
            };
            gradient.assign_f64(&step)?;
            if self.config.momentum != 0.0 {
                self.history[index] = Some(step);
            }
        }
        net.update()?;

        self.iteration += 1;
        log::debug!(
            "sgd iteration {}: loss {} (penalty {})",
            self.iteration,
            loss,
            penalty
        );
        Ok(loss)
    }
}

impl Solver for SgdSolver {
    fn solve(&mut self, net: &mut Net) -> Result<f64, BlobNetError> {
        let mut loss = 0.0;
        for _ in 0..self.config.max_iter {
            loss = self.step(net)?;
        }
        Ok(loss)
    }
}

#[cfg(test)]
#[path = "sgd_test.rs"]
mod tests;
