use crate::optim::optimizer::Optimizer;

/// Companion state of a single trainable scalar (one weight or one bias),
/// holding exactly what the configured optimizer needs between updates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterState {
    Sgd,
    Momentum { velocity: f64 },
    Gain { gain: f64 },
    Adagrad { cache: f64 },
    Rmsprop { cache: f64 },
    Adam { m: f64, v: f64 },
    Adadelta { cache: f64, adadelta_cache: f64 },
}

impl ParameterState {
    pub fn for_optimizer(optimizer: &Optimizer) -> ParameterState {
        match optimizer {
            Optimizer::Sgd => ParameterState::Sgd,
            Optimizer::Momentum { .. } => ParameterState::Momentum { velocity: 0.0 },
            Optimizer::Gain => ParameterState::Gain { gain: 1.0 },
            Optimizer::Adagrad => ParameterState::Adagrad { cache: 0.0 },
            Optimizer::Rmsprop { .. } => ParameterState::Rmsprop { cache: 0.0 },
            Optimizer::Adam { .. } => ParameterState::Adam { m: 0.0, v: 0.0 },
            Optimizer::Adadelta { .. } => ParameterState::Adadelta { cache: 0.0, adadelta_cache: 0.0 },
        }
    }

    /// Whether this state was created for `optimizer`'s kind.
    pub fn matches(&self, optimizer: &Optimizer) -> bool {
        matches!(
            (self, optimizer),
            (ParameterState::Sgd, Optimizer::Sgd)
                | (ParameterState::Momentum { .. }, Optimizer::Momentum { .. })
                | (ParameterState::Gain { .. }, Optimizer::Gain)
                | (ParameterState::Adagrad { .. }, Optimizer::Adagrad)
                | (ParameterState::Rmsprop { .. }, Optimizer::Rmsprop { .. })
                | (ParameterState::Adam { .. }, Optimizer::Adam { .. })
                | (ParameterState::Adadelta { .. }, Optimizer::Adadelta { .. })
        )
    }
}
