use rand::Rng;

use crate::activation::{softmax, ActivationFunction};
use crate::layers::{ParameterInit, Shape};
use crate::math::volume::{flatten, Volume};
use crate::network::config::TrainingContext;
use crate::optim::{ParameterState, UpdateTotals};

/// One unit of a fully-connected layer.
#[derive(Debug, Clone)]
pub struct Neuron {
    pub weights: Vec<f64>,
    pub bias: f64,
    pub sum: f64,
    pub activation: f64,
    pub error: f64,
    pub derivative: f64,
    pub delta_weights: Vec<f64>,
    pub delta_bias: f64,
    pub dropped: bool,
    pub weight_states: Vec<ParameterState>,
    pub bias_state: ParameterState,
}

impl Neuron {
    fn new(weights: Vec<f64>, state: ParameterState) -> Neuron {
        let n = weights.len();
        Neuron {
            weights,
            bias: 1.0,
            sum: 0.0,
            activation: 0.0,
            error: 0.0,
            derivative: 0.0,
            delta_weights: vec![0.0; n],
            delta_bias: 0.0,
            dropped: false,
            weight_states: vec![state; n],
            bias_state: state,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FullyConnectedLayer {
    pub neurons: Vec<Neuron>,
    pub activator: ActivationFunction,
    pub input_shape: Shape,
    /// The output layer takes its errors from outside and is never dropped.
    pub is_output: bool,
}

impl FullyConnectedLayer {
    pub fn new<R: Rng + ?Sized>(
        size: usize,
        activator: ActivationFunction,
        input_shape: Shape,
        is_output: bool,
        params: &ParameterInit,
        rng: &mut R,
    ) -> FullyConnectedLayer {
        let fan_in = input_shape.len();
        let neurons = (0..size)
            .map(|_| Neuron::new(params.weights.sample(fan_in, fan_in, params.fan_out, rng), params.state))
            .collect();

        FullyConnectedLayer { neurons, activator, input_shape, is_output }
    }

    pub fn output_shape(&self) -> Shape {
        Shape::flat(self.neurons.len())
    }

    pub fn activations(&self) -> Vec<f64> {
        self.neurons.iter().map(|n| n.activation).collect()
    }

    /// `sum = bias + Σ input[i]·w[i]`, then the activation. Dropped neurons
    /// output 0; kept ones are scaled by `1 / keep_probability`.
    pub fn forward<R: Rng + ?Sized>(&mut self, input: &Volume, ctx: &TrainingContext, rng: &mut R) {
        let inputs = flatten(input);
        let dropout = ctx.dropout_active() && !self.is_output;

        for neuron in &mut self.neurons {
            neuron.sum = neuron.bias
                + neuron.weights.iter().zip(inputs.iter()).map(|(w, x)| w * x).sum::<f64>();
            neuron.dropped = dropout && rng.gen::<f64>() >= ctx.keep_probability;
        }

        let activated: Vec<f64> = if self.activator == ActivationFunction::Softmax {
            softmax(&self.neurons.iter().map(|n| n.sum).collect::<Vec<_>>())
        } else {
            self.neurons.iter().map(|n| self.activator.function(n.sum)).collect()
        };

        for (neuron, value) in self.neurons.iter_mut().zip(activated) {
            neuron.activation = if neuron.dropped {
                0.0
            } else if dropout {
                value / ctx.keep_probability
            } else {
                value
            };
        }
    }

    /// `output_errors` are the errors w.r.t. this layer's outputs: supplied
    /// directly for the output layer, otherwise gathered from the next layer.
    pub fn backward(&mut self, input: &Volume, output_errors: &[f64], ctx: &TrainingContext) {
        let inputs = flatten(input);
        let regularization = ctx.regularization;

        for (n, neuron) in self.neurons.iter_mut().enumerate() {
            if neuron.dropped {
                neuron.error = 0.0;
                continue;
            }
            let upstream = output_errors.get(n).copied().unwrap_or(0.0);
            neuron.derivative = self.activator.derivative(neuron.sum);
            neuron.error = if self.is_output { upstream } else { neuron.derivative * upstream };

            for ((delta, w), x) in neuron.delta_weights.iter_mut()
                .zip(neuron.weights.iter())
                .zip(inputs.iter())
            {
                *delta += neuron.error * x * regularization.accumulation_scale(*w);
            }
            neuron.delta_bias += neuron.error;
        }
    }

    /// Error w.r.t. input `i`: `Σ_n error_n · w_n[i]`, reshaped to the input
    /// volume. Input index `c·m² + y·m + x` addresses channel `c`, cell `(y, x)`.
    pub fn input_errors(&self) -> Volume {
        let mut flat = vec![0.0; self.input_shape.len()];
        for neuron in &self.neurons {
            for (e, w) in flat.iter_mut().zip(neuron.weights.iter()) {
                *e += neuron.error * w;
            }
        }
        self.input_shape.reshape(&flat)
    }

    pub fn reset_accumulated_gradients(&mut self) {
        for neuron in &mut self.neurons {
            neuron.delta_weights.iter_mut().for_each(|d| *d = 0.0);
            neuron.delta_bias = 0.0;
            neuron.dropped = false;
        }
    }

    pub fn apply_accumulated_gradients(&mut self, ctx: &TrainingContext, totals: &mut UpdateTotals) {
        let regularization = ctx.regularization;

        for neuron in &mut self.neurons {
            for ((w, delta), state) in neuron.weights.iter_mut()
                .zip(neuron.delta_weights.iter())
                .zip(neuron.weight_states.iter_mut())
            {
                regularization.record_penalties(*w, &mut totals.penalties);
                let gradient = regularization.weight_gradient(*delta, *w);
                *w = ctx.optimizer.update(*w, gradient, state, ctx.learning_rate, ctx.step);
                if ctx.max_norm.is_some() {
                    totals.squared_weight_sum += *w * *w;
                }
            }
            let gradient = regularization.bias_gradient(neuron.delta_bias);
            neuron.bias = ctx.optimizer.update(neuron.bias, gradient, &mut neuron.bias_state, ctx.learning_rate, ctx.step);
        }
    }

    pub fn scale_weights(&mut self, multiplier: f64) {
        for neuron in &mut self.neurons {
            neuron.weights.iter_mut().for_each(|w| *w *= multiplier);
        }
    }
}
