pub mod conv;
pub mod dense;
pub mod input;
pub mod pool;

use rand::Rng;
use serde::{Serialize, Deserialize};
use tracing::debug;

pub use conv::{ConvolutionalLayer, Filter};
pub use dense::{FullyConnectedLayer, Neuron};
pub use input::InputLayer;
pub use pool::PoolingLayer;

use crate::error::{Error, Result};
use crate::math::init::WeightsInit;
use crate::math::volume::{array_to_volume, flatten, Volume};
use crate::network::config::{NetworkConfig, TrainingContext};
use crate::network::spec::LayerSpec;
use crate::optim::{ParameterState, UpdateTotals};

/// Output extent of a layer: `channels` square maps of side `map_size`.
/// A fully-connected layer of `n` neurons is `n` channels of 1x1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub channels: usize,
    pub map_size: usize,
}

impl Shape {
    pub fn flat(size: usize) -> Shape {
        Shape { channels: size, map_size: 1 }
    }

    pub fn volume(channels: usize, map_size: usize) -> Shape {
        Shape { channels, map_size }
    }

    pub fn len(&self) -> usize {
        self.channels * self.map_size * self.map_size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reshape(&self, values: &[f64]) -> Volume {
        array_to_volume(values, self.channels, self.map_size)
    }
}

/// How a layer draws its initial parameters and which optimizer state it
/// pairs with each of them.
#[derive(Debug, Clone, Copy)]
pub struct ParameterInit {
    pub weights: WeightsInit,
    /// Fan-out for the Xavier variants; `None` on the output layer.
    pub fan_out: Option<usize>,
    pub state: ParameterState,
}

/// A wired layer. Neighbours are implicit: layer `i` reads from `i - 1` and
/// is corrected from `i + 1`.
#[derive(Debug, Clone)]
pub enum Layer {
    Input(InputLayer),
    FullyConnected(FullyConnectedLayer),
    Convolutional(ConvolutionalLayer),
    Pooling(PoolingLayer),
}

impl Layer {
    /// Shapes `spec` against the layer before it. `next` is only consulted
    /// for the fan-out used by weight initialization.
    pub fn wire<R: Rng + ?Sized>(
        spec: &LayerSpec,
        prev: Option<&Layer>,
        next: Option<&LayerSpec>,
        config: &NetworkConfig,
        rng: &mut R,
    ) -> Result<Layer> {
        let params = ParameterInit {
            weights: config.weights_init,
            fan_out: next.and_then(LayerSpec::fan_out),
            state: ParameterState::for_optimizer(&config.optimizer),
        };

        let prev = match (spec, prev) {
            (LayerSpec::Input { channels, map_size }, None) => {
                if *channels == 0 || *map_size == 0 {
                    return Err(Error::config("input layer must have a non-zero size"));
                }
                return Ok(Layer::Input(InputLayer::new(Shape::volume(*channels, *map_size))));
            }
            (_, None) => return Err(Error::config("the first layer must be an input layer")),
            (_, Some(prev)) => prev,
        };
        let input_shape = prev.output_shape();

        let layer = match *spec {
            LayerSpec::Input { .. } => {
                return Err(Error::config("an input layer may only appear first"));
            }
            LayerSpec::FullyConnected { size, activation } => {
                if size == 0 {
                    return Err(Error::config("fully-connected layer needs at least one neuron"));
                }
                let activator = activation.unwrap_or(config.activation);
                Layer::FullyConnected(FullyConnectedLayer::new(
                    size, activator, input_shape, next.is_none(), &params, rng,
                ))
            }
            LayerSpec::Convolutional { filter_count, filter_size, zero_padding, stride, activation } => {
                if matches!(prev, Layer::FullyConnected(_)) {
                    return Err(Error::config("a convolutional layer cannot follow a fully-connected layer"));
                }
                if filter_count == 0 {
                    return Err(Error::config("convolutional layer needs at least one filter"));
                }
                let padding = zero_padding.unwrap_or(filter_size / 2);
                let activator = activation.unwrap_or(config.activation);
                Layer::Convolutional(ConvolutionalLayer::new(
                    filter_count, filter_size, padding, stride, activator, input_shape, &params, rng,
                )?)
            }
            LayerSpec::Pooling { size, stride, activation } => {
                if matches!(prev, Layer::FullyConnected(_)) {
                    return Err(Error::config("a pooling layer cannot follow a fully-connected layer"));
                }
                Layer::Pooling(PoolingLayer::new(size, stride.unwrap_or(size), activation, input_shape)?)
            }
        };

        debug!(
            kind = layer.name(),
            channels = layer.output_shape().channels,
            map_size = layer.output_shape().map_size,
            parameters = layer.data_size(),
            "Wired layer"
        );
        Ok(layer)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Layer::Input(_) => "input",
            Layer::FullyConnected(_) => "fully_connected",
            Layer::Convolutional(_) => "convolutional",
            Layer::Pooling(_) => "pooling",
        }
    }

    pub fn output_shape(&self) -> Shape {
        match self {
            Layer::Input(layer) => layer.shape,
            Layer::FullyConnected(layer) => layer.output_shape(),
            Layer::Convolutional(layer) => layer.output_shape(),
            Layer::Pooling(layer) => layer.output_shape(),
        }
    }

    /// The layer's current activations as a volume.
    pub fn output(&self) -> Volume {
        match self {
            Layer::Input(layer) => layer.values.clone(),
            Layer::FullyConnected(layer) => layer.output_shape().reshape(&layer.activations()),
            Layer::Convolutional(layer) => layer.activations(),
            Layer::Pooling(layer) => layer.activations.clone(),
        }
    }

    pub fn forward<R: Rng + ?Sized>(&mut self, input: &Volume, ctx: &TrainingContext, rng: &mut R) {
        match self {
            Layer::Input(layer) => layer.forward(input.clone()),
            Layer::FullyConnected(layer) => layer.forward(input, ctx, rng),
            Layer::Convolutional(layer) => layer.forward(input, ctx, rng),
            Layer::Pooling(layer) => layer.forward(input),
        }
    }

    /// `input` is the previous layer's output, `output_errors` the errors
    /// w.r.t. this layer's own outputs.
    pub fn backward(&mut self, input: &Volume, output_errors: &Volume, ctx: &TrainingContext) {
        match self {
            Layer::Input(_) => {}
            Layer::FullyConnected(layer) => layer.backward(input, &flatten(output_errors), ctx),
            Layer::Convolutional(layer) => layer.backward(input, output_errors, ctx),
            Layer::Pooling(layer) => layer.backward(output_errors),
        }
    }

    /// Errors w.r.t. this layer's input, i.e. the previous layer's output
    /// errors. Valid after `backward`.
    pub fn input_errors(&self) -> Volume {
        match self {
            Layer::Input(_) => Vec::new(),
            Layer::FullyConnected(layer) => layer.input_errors(),
            Layer::Convolutional(layer) => layer.input_errors(),
            Layer::Pooling(layer) => layer.input_errors(),
        }
    }

    pub fn reset_accumulated_gradients(&mut self) {
        match self {
            Layer::FullyConnected(layer) => layer.reset_accumulated_gradients(),
            Layer::Convolutional(layer) => layer.reset_accumulated_gradients(),
            Layer::Input(_) | Layer::Pooling(_) => {}
        }
    }

    pub fn apply_accumulated_gradients(&mut self, ctx: &TrainingContext, totals: &mut UpdateTotals) {
        match self {
            Layer::FullyConnected(layer) => layer.apply_accumulated_gradients(ctx, totals),
            Layer::Convolutional(layer) => layer.apply_accumulated_gradients(ctx, totals),
            Layer::Input(_) | Layer::Pooling(_) => {}
        }
    }

    pub fn scale_weights(&mut self, multiplier: f64) {
        match self {
            Layer::FullyConnected(layer) => layer.scale_weights(multiplier),
            Layer::Convolutional(layer) => layer.scale_weights(multiplier),
            Layer::Input(_) | Layer::Pooling(_) => {}
        }
    }

    /// Neurons or filters.
    pub fn unit_count(&self) -> usize {
        match self {
            Layer::FullyConnected(layer) => layer.neurons.len(),
            Layer::Convolutional(layer) => layer.filters.len(),
            Layer::Input(_) | Layer::Pooling(_) => 0,
        }
    }

    /// Scalars per unit: the bias plus every weight.
    pub fn unit_size(&self) -> usize {
        match self {
            Layer::FullyConnected(layer) => 1 + layer.input_shape.len(),
            Layer::Convolutional(layer) => {
                1 + layer.input_shape.channels * layer.filter_size * layer.filter_size
            }
            Layer::Input(_) | Layer::Pooling(_) => 0,
        }
    }

    /// Number of scalars this layer contributes to a flat export.
    pub fn data_size(&self) -> usize {
        self.unit_count() * self.unit_size()
    }

    /// `[bias, w0, w1, ...]` for every unit in turn.
    pub fn flat_parameters(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(self.data_size());
        match self {
            Layer::FullyConnected(layer) => {
                for neuron in &layer.neurons {
                    values.push(neuron.bias);
                    values.extend_from_slice(&neuron.weights);
                }
            }
            Layer::Convolutional(layer) => {
                for filter in &layer.filters {
                    values.push(filter.bias);
                    values.extend(filter.weights.iter().flatten().flatten());
                }
            }
            Layer::Input(_) | Layer::Pooling(_) => {}
        }
        values
    }

    /// Inverse of [`Layer::flat_parameters`]; `values` must hold exactly
    /// [`Layer::data_size`] scalars.
    pub fn load_flat_parameters(&mut self, values: &[f64]) {
        let unit_size = self.unit_size();
        if unit_size == 0 {
            return;
        }
        match self {
            Layer::FullyConnected(layer) => {
                for (neuron, chunk) in layer.neurons.iter_mut().zip(values.chunks(unit_size)) {
                    neuron.bias = chunk[0];
                    neuron.weights.copy_from_slice(&chunk[1..]);
                }
            }
            Layer::Convolutional(layer) => {
                for (filter, chunk) in layer.filters.iter_mut().zip(values.chunks(unit_size)) {
                    filter.bias = chunk[0];
                    for (w, v) in filter.weights.iter_mut().flatten().flatten().zip(&chunk[1..]) {
                        *w = *v;
                    }
                }
            }
            Layer::Input(_) | Layer::Pooling(_) => {}
        }
    }

    /// Element 0 is the bias, element `k + 1` the `k`-th weight in flat order.
    pub fn parameter(&self, unit: usize, element: usize) -> Option<f64> {
        match self {
            Layer::FullyConnected(layer) => {
                let neuron = layer.neurons.get(unit)?;
                match element {
                    0 => Some(neuron.bias),
                    k => neuron.weights.get(k - 1).copied(),
                }
            }
            Layer::Convolutional(layer) => {
                let filter = layer.filters.get(unit)?;
                match element {
                    0 => Some(filter.bias),
                    k => filter.weights.iter().flatten().flatten().nth(k - 1).copied(),
                }
            }
            Layer::Input(_) | Layer::Pooling(_) => None,
        }
    }

    /// Returns `false` when the address does not exist.
    pub fn set_parameter(&mut self, unit: usize, element: usize, value: f64) -> bool {
        let slot = match self {
            Layer::FullyConnected(layer) => layer.neurons.get_mut(unit).and_then(|neuron| match element {
                0 => Some(&mut neuron.bias),
                k => neuron.weights.get_mut(k - 1),
            }),
            Layer::Convolutional(layer) => layer.filters.get_mut(unit).and_then(|filter| match element {
                0 => Some(&mut filter.bias),
                k => filter.weights.iter_mut().flatten().flatten().nth(k - 1),
            }),
            Layer::Input(_) | Layer::Pooling(_) => None,
        };
        match slot {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}
