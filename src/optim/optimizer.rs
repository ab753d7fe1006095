use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::optim::state::ParameterState;

const ADAGRAD_EPS: f64 = 1e-6;
const ADAM_EPS: f64 = 1e-8;
const ADADELTA_EPS: f64 = 1e-6;

const GAIN_MIN: f64 = 0.5;
const GAIN_MAX: f64 = 5.0;
const GAIN_SHRINK: f64 = 0.95;
const GAIN_GROWTH: f64 = 0.05;

/// Per-parameter update rule applied at the end of every mini-batch.
///
/// Gradients handed to [`Optimizer::update`] point in the direction the value
/// should move (they are built from `target - output` errors), so plain SGD
/// adds them: `v + lr * g`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Optimizer {
    Sgd,
    Momentum { momentum: f64 },
    Gain,
    Adagrad,
    Rmsprop { decay: f64 },
    Adam { beta1: f64, beta2: f64 },
    /// Learning-rate free.
    Adadelta { rho: f64 },
}

impl Default for Optimizer {
    fn default() -> Self {
        Optimizer::Sgd
    }
}

impl Optimizer {
    pub fn momentum() -> Optimizer {
        Optimizer::Momentum { momentum: 0.9 }
    }

    pub fn rmsprop() -> Optimizer {
        Optimizer::Rmsprop { decay: 0.99 }
    }

    pub fn adam() -> Optimizer {
        Optimizer::Adam { beta1: 0.9, beta2: 0.999 }
    }

    pub fn adadelta() -> Optimizer {
        Optimizer::Adadelta { rho: 0.95 }
    }

    /// Learning rate used when the network config leaves it unset.
    pub fn default_learning_rate(&self) -> f64 {
        match self {
            Optimizer::Sgd | Optimizer::Momentum { .. } | Optimizer::Gain => 0.2,
            Optimizer::Adagrad => 0.5,
            Optimizer::Rmsprop { .. } => 0.001,
            Optimizer::Adam { .. } => 0.01,
            Optimizer::Adadelta { .. } => 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let (name, coefficient) = match *self {
            Optimizer::Momentum { momentum } => ("momentum", momentum),
            Optimizer::Rmsprop { decay } => ("rmsprop decay", decay),
            Optimizer::Adadelta { rho } => ("adadelta rho", rho),
            Optimizer::Adam { beta1, beta2 } => {
                check_coefficient("adam beta1", beta1)?;
                ("adam beta2", beta2)
            }
            Optimizer::Sgd | Optimizer::Gain | Optimizer::Adagrad => return Ok(()),
        };
        check_coefficient(name, coefficient)
    }

    /// Returns the updated value of one parameter and advances its state.
    ///
    /// `step` is the 1-based number of the update being applied; only Adam
    /// uses it, for bias correction.
    ///
    /// Layers always hold states built from the network's own optimizer, but
    /// `update` and [`ParameterState`] are public: a caller driving its own
    /// parameters, or one switching optimizers on a cloned state, may pass a
    /// state of another kind. Such a state is reset to a fresh one for
    /// `self` before use.
    pub fn update(
        &self,
        value: f64,
        gradient: f64,
        state: &mut ParameterState,
        learning_rate: f64,
        step: u64,
    ) -> f64 {
        if !state.matches(self) {
            *state = ParameterState::for_optimizer(self);
        }

        match (*self, state) {
            (Optimizer::Momentum { momentum }, ParameterState::Momentum { velocity }) => {
                *velocity = momentum * *velocity - learning_rate * gradient;
                value - *velocity
            }
            (Optimizer::Gain, ParameterState::Gain { gain }) => {
                let new_value = value + learning_rate * gradient * *gain;
                let crossed_zero = (new_value <= 0.0 && value > 0.0) || (new_value > 0.0 && value <= 0.0);
                *gain = if crossed_zero {
                    (*gain * GAIN_SHRINK).max(GAIN_MIN)
                } else {
                    (*gain + GAIN_GROWTH).min(GAIN_MAX)
                };
                new_value
            }
            (Optimizer::Adagrad, ParameterState::Adagrad { cache }) => {
                *cache += gradient * gradient;
                value + learning_rate * gradient / (ADAGRAD_EPS + cache.sqrt())
            }
            (Optimizer::Rmsprop { decay }, ParameterState::Rmsprop { cache }) => {
                *cache = decay * *cache + (1.0 - decay) * gradient * gradient;
                value + learning_rate * gradient / (ADAGRAD_EPS + cache.sqrt())
            }
            (Optimizer::Adam { beta1, beta2 }, ParameterState::Adam { m, v }) => {
                let t = step.max(1) as i32;
                *m = beta1 * *m + (1.0 - beta1) * gradient;
                *v = beta2 * *v + (1.0 - beta2) * gradient * gradient;
                let m_hat = *m / (1.0 - beta1.powi(t));
                let v_hat = *v / (1.0 - beta2.powi(t));
                value + learning_rate * m_hat / (v_hat.sqrt() + ADAM_EPS)
            }
            (Optimizer::Adadelta { rho }, ParameterState::Adadelta { cache, adadelta_cache }) => {
                let update = ((*adadelta_cache + ADADELTA_EPS) / (*cache + ADADELTA_EPS)).sqrt() * gradient;
                *cache = rho * *cache + (1.0 - rho) * gradient * gradient;
                *adadelta_cache = rho * *adadelta_cache + (1.0 - rho) * update * update;
                value + update
            }
            _ => value + learning_rate * gradient,
        }
    }
}

fn check_coefficient(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::config(format!("{name} must be finite and in [0, 1), got {value}")))
    }
}
