use rand::Rng;

use crate::activation::ActivationFunction;
use crate::error::Result;
use crate::layers::{ParameterInit, Shape};
use crate::math::volume::{
    accumulate_conv_weight_gradients, convolve, output_map_size, transposed_convolve, zeros_map,
    zeros_volume, Map, Volume,
};
use crate::network::config::TrainingContext;
use crate::optim::{ParameterState, UpdateTotals};

/// One kernel of a convolutional layer together with the maps it produces.
#[derive(Debug, Clone)]
pub struct Filter {
    /// `[channel][ky][kx]`
    pub weights: Volume,
    pub bias: f64,
    pub sum_map: Map,
    pub activation_map: Map,
    pub error_map: Map,
    pub delta_weights: Volume,
    pub delta_bias: f64,
    pub dropout_map: Vec<Vec<bool>>,
    pub weight_states: Vec<Vec<Vec<ParameterState>>>,
    pub bias_state: ParameterState,
}

impl Filter {
    fn new(weights: Volume, out_map_size: usize, state: ParameterState) -> Filter {
        let channels = weights.len();
        let filter_size = weights.first().map_or(0, |k| k.len());
        Filter {
            weights,
            bias: 1.0,
            sum_map: zeros_map(out_map_size),
            activation_map: zeros_map(out_map_size),
            error_map: zeros_map(out_map_size),
            delta_weights: zeros_volume(channels, filter_size),
            delta_bias: 0.0,
            dropout_map: vec![vec![false; out_map_size]; out_map_size],
            weight_states: vec![vec![vec![state; filter_size]; filter_size]; channels],
            bias_state: state,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConvolutionalLayer {
    pub filters: Vec<Filter>,
    pub filter_size: usize,
    pub zero_padding: usize,
    pub stride: usize,
    pub input_shape: Shape,
    pub out_map_size: usize,
    pub activator: ActivationFunction,
}

impl ConvolutionalLayer {
    /// Shapes the layer against its input. Fails before anything is
    /// allocated if `(W - F + 2P) / S + 1` is not an integer.
    pub fn new<R: Rng + ?Sized>(
        filter_count: usize,
        filter_size: usize,
        zero_padding: usize,
        stride: usize,
        activator: ActivationFunction,
        input_shape: Shape,
        params: &ParameterInit,
        rng: &mut R,
    ) -> Result<ConvolutionalLayer> {
        let out_map_size = output_map_size(input_shape.map_size, filter_size, zero_padding, stride)?;
        let channels = input_shape.channels;
        let fan_in = channels * filter_size * filter_size;

        let filters = (0..filter_count)
            .map(|_| {
                let flat = params.weights.sample(fan_in, fan_in, params.fan_out, rng);
                let weights = Shape::volume(channels, filter_size).reshape(&flat);
                Filter::new(weights, out_map_size, params.state)
            })
            .collect();

        Ok(ConvolutionalLayer {
            filters,
            filter_size,
            zero_padding,
            stride,
            input_shape,
            out_map_size,
            activator,
        })
    }

    pub fn output_shape(&self) -> Shape {
        Shape::volume(self.filters.len(), self.out_map_size)
    }

    pub fn activations(&self) -> Volume {
        self.filters.iter().map(|f| f.activation_map.clone()).collect()
    }

    pub fn forward<R: Rng + ?Sized>(&mut self, input: &Volume, ctx: &TrainingContext, rng: &mut R) {
        let dropout = ctx.dropout_active();

        for filter in &mut self.filters {
            filter.sum_map = convolve(
                input,
                &filter.weights,
                filter.bias,
                self.zero_padding,
                self.stride,
                self.out_map_size,
            );

            for (y, row) in filter.sum_map.iter().enumerate() {
                for (x, &sum) in row.iter().enumerate() {
                    let dropped = dropout && rng.gen::<f64>() >= ctx.keep_probability;
                    filter.dropout_map[y][x] = dropped;
                    filter.activation_map[y][x] = if dropped {
                        0.0
                    } else if dropout {
                        self.activator.function(sum) / ctx.keep_probability
                    } else {
                        self.activator.function(sum)
                    };
                }
            }
        }
    }

    /// Builds each filter's error map from the errors w.r.t. this layer's
    /// outputs, then accumulates weight and bias gradients.
    pub fn backward(&mut self, input: &Volume, output_errors: &Volume, ctx: &TrainingContext) {
        let regularization = ctx.regularization.accumulation_factor();

        for (f, filter) in self.filters.iter_mut().enumerate() {
            let upstream = &output_errors[f];
            for (y, row) in filter.error_map.iter_mut().enumerate() {
                for (x, error) in row.iter_mut().enumerate() {
                    *error = if filter.dropout_map[y][x] {
                        0.0
                    } else {
                        upstream[y][x] * self.activator.derivative(filter.sum_map[y][x])
                    };
                }
            }

            accumulate_conv_weight_gradients(
                &mut filter.delta_weights,
                input,
                &filter.error_map,
                &filter.weights,
                self.stride,
                self.zero_padding,
                regularization,
            );
            filter.delta_bias += filter.error_map.iter().flatten().sum::<f64>();
        }
    }

    /// Errors w.r.t. the input volume, by transposed convolution of every
    /// filter's error map with that filter's kernel slice for each channel.
    pub fn input_errors(&self) -> Volume {
        (0..self.input_shape.channels)
            .map(|c| {
                transposed_convolve(
                    self.filters.iter().map(|f| (&f.weights[c], &f.error_map)),
                    self.stride,
                    self.zero_padding,
                    self.input_shape.map_size,
                )
            })
            .collect()
    }

    pub fn reset_accumulated_gradients(&mut self) {
        for filter in &mut self.filters {
            filter.delta_weights.iter_mut().flatten().flatten().for_each(|d| *d = 0.0);
            filter.delta_bias = 0.0;
            filter.dropout_map.iter_mut().flatten().for_each(|d| *d = false);
        }
    }

    pub fn apply_accumulated_gradients(&mut self, ctx: &TrainingContext, totals: &mut UpdateTotals) {
        let regularization = ctx.regularization;

        for filter in &mut self.filters {
            let weights = filter.weights.iter_mut().flatten().flatten();
            let deltas = filter.delta_weights.iter().flatten().flatten();
            let states = filter.weight_states.iter_mut().flatten().flatten();

            for ((w, delta), state) in weights.zip(deltas).zip(states) {
                regularization.record_penalties(*w, &mut totals.penalties);
                let gradient = regularization.weight_gradient(*delta, *w);
                *w = ctx.optimizer.update(*w, gradient, state, ctx.learning_rate, ctx.step);
                if ctx.max_norm.is_some() {
                    totals.squared_weight_sum += *w * *w;
                }
            }
            let gradient = regularization.bias_gradient(filter.delta_bias);
            filter.bias = ctx.optimizer.update(filter.bias, gradient, &mut filter.bias_state, ctx.learning_rate, ctx.step);
        }
    }

    pub fn scale_weights(&mut self, multiplier: f64) {
        for filter in &mut self.filters {
            filter.weights.iter_mut().flatten().flatten().for_each(|w| *w *= multiplier);
        }
    }
}
