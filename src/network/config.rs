use serde::{Serialize, Deserialize};

use crate::activation::ActivationFunction;
use crate::cost::CostFunction;
use crate::error::{Error, Result};
use crate::math::init::WeightsInit;
use crate::optim::{Optimizer, Regularization};

/// Network-wide hyperparameters. Layers read them; they never write them.
///
/// Every field has a default, so a JSON config only needs to name what it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Falls back to the optimizer's own default when unset.
    pub learning_rate: Option<f64>,
    pub optimizer: Optimizer,
    /// Activation for layers whose spec does not name one.
    pub activation: ActivationFunction,
    pub cost: CostFunction,
    pub weights_init: WeightsInit,
    pub l1: f64,
    pub l2: f64,
    /// Keep probability for dropout; `1.0` disables it.
    pub dropout: f64,
    pub max_norm: Option<f64>,
    pub mini_batch_size: usize,
    /// Seeds weight initialization and dropout; entropy when unset.
    pub seed: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            learning_rate: None,
            optimizer: Optimizer::default(),
            activation: ActivationFunction::default(),
            cost: CostFunction::default(),
            weights_init: WeightsInit::default(),
            l1: 0.0,
            l2: 0.0,
            dropout: 1.0,
            max_norm: None,
            mini_batch_size: 1,
            seed: None,
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        self.optimizer.validate()?;
        if let Some(lr) = self.learning_rate {
            if !lr.is_finite() || lr < 0.0 {
                return Err(Error::config(format!("learning rate must be finite and non-negative, got {lr}")));
            }
        }
        if !(0.0..=1.0).contains(&self.dropout) {
            return Err(Error::config(format!("dropout keep probability must be in [0, 1], got {}", self.dropout)));
        }
        if !(self.l1 >= 0.0 && self.l2 >= 0.0) {
            return Err(Error::config(format!(
                "regularization coefficients must be non-negative (l1 {}, l2 {})",
                self.l1, self.l2
            )));
        }
        if let Some(cap) = self.max_norm {
            if !(cap > 0.0) {
                return Err(Error::config(format!("max norm must be positive, got {cap}")));
            }
        }
        if self.mini_batch_size == 0 {
            return Err(Error::config("mini-batch size must be at least 1"));
        }
        Ok(())
    }

    pub fn effective_learning_rate(&self) -> f64 {
        self.learning_rate
            .unwrap_or_else(|| self.optimizer.default_learning_rate())
    }
}

/// Immutable snapshot of the hyperparameters handed to every layer call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingContext {
    pub learning_rate: f64,
    pub optimizer: Optimizer,
    pub regularization: Regularization,
    pub keep_probability: f64,
    pub max_norm: Option<f64>,
    pub training: bool,
    /// 1-based number of the parameter update about to be applied.
    pub step: u64,
}

impl TrainingContext {
    pub fn new(config: &NetworkConfig, training: bool, step: u64) -> TrainingContext {
        TrainingContext {
            learning_rate: config.effective_learning_rate(),
            optimizer: config.optimizer,
            regularization: Regularization {
                l1: config.l1,
                l2: config.l2,
                mini_batch_size: config.mini_batch_size,
            },
            keep_probability: config.dropout,
            max_norm: config.max_norm,
            training,
            step,
        }
    }

    /// Dropout only runs while training and when it is actually configured.
    pub fn dropout_active(&self) -> bool {
        self.training && self.keep_probability < 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = NetworkConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_learning_rate(), 0.2);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: NetworkConfig = serde_json::from_str(r#"{"l2": 0.001, "mini_batch_size": 4}"#).unwrap();
        assert_eq!(config.l2, 0.001);
        assert_eq!(config.mini_batch_size, 4);
        assert_eq!(config.dropout, 1.0);
        assert_eq!(config.optimizer, Optimizer::Sgd);
    }

    #[test]
    fn optimizer_is_tagged_in_json() {
        let config: NetworkConfig =
            serde_json::from_str(r#"{"optimizer": {"type": "adam", "beta1": 0.8, "beta2": 0.99}}"#).unwrap();
        assert_eq!(config.optimizer, Optimizer::Adam { beta1: 0.8, beta2: 0.99 });
        assert_eq!(config.effective_learning_rate(), 0.01);
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        let bad = [
            NetworkConfig { dropout: 1.5, ..NetworkConfig::default() },
            NetworkConfig { l2: -0.1, ..NetworkConfig::default() },
            NetworkConfig { max_norm: Some(0.0), ..NetworkConfig::default() },
            NetworkConfig { mini_batch_size: 0, ..NetworkConfig::default() },
        ];
        for config in &bad {
            assert!(matches!(config.validate(), Err(Error::Configuration(_))), "{config:?}");
        }
    }

    #[test]
    fn dropout_needs_training_mode() {
        let config = NetworkConfig { dropout: 0.5, ..NetworkConfig::default() };
        assert!(TrainingContext::new(&config, true, 1).dropout_active());
        assert!(!TrainingContext::new(&config, false, 1).dropout_active());
    }
}
