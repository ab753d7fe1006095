use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::layers::Layer;
use crate::math::volume::flatten;
use crate::network::config::{NetworkConfig, TrainingContext};
use crate::network::spec::NetworkSpec;
use crate::optim::regularization::max_norm_multiplier;
use crate::optim::{Penalties, UpdateTotals};

/// An ordered chain of wired layers. `layers[0]` is always the input layer
/// and the last layer is always fully-connected.
///
/// The driver calls `forward` then `backward` per example, and every
/// mini-batch `apply_accumulated_gradients` followed by
/// `reset_accumulated_gradients`.
#[derive(Debug, Clone)]
pub struct Network {
    pub name: String,
    layers: Vec<Layer>,
    config: NetworkConfig,
    rng: StdRng,
    training: bool,
    has_output: bool,
    update_step: u64,
    penalties: Penalties,
}

impl Network {
    /// Wires every layer of `spec` against its predecessor. Parameters and
    /// optimizer state are allocated here, once.
    pub fn new(spec: &NetworkSpec) -> Result<Network> {
        spec.config.validate()?;
        let specs = spec.resolve_layers()?;

        let mut rng = match spec.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut layers: Vec<Layer> = Vec::with_capacity(specs.len());
        for (i, layer_spec) in specs.iter().enumerate() {
            let layer = Layer::wire(layer_spec, layers.last(), specs.get(i + 1), &spec.config, &mut rng)?;
            layers.push(layer);
        }

        Ok(Network {
            name: spec.name.clone(),
            layers,
            config: spec.config.clone(),
            rng,
            training: false,
            has_output: false,
            update_step: 0,
            penalties: Penalties::default(),
        })
    }

    /// Shorthand for `[input, hidden..., output]` fully-connected networks.
    pub fn from_sizes(sizes: &[usize], config: NetworkConfig) -> Result<Network> {
        Network::new(&NetworkSpec::new("network", sizes.iter().copied()).with_config(config))
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Dropout only runs in training mode.
    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Number of parameter updates applied so far.
    pub fn update_step(&self) -> u64 {
        self.update_step
    }

    pub fn input_size(&self) -> usize {
        self.layers[0].output_shape().len()
    }

    pub fn output_size(&self) -> usize {
        self.output_layer().output_shape().len()
    }

    fn output_layer(&self) -> &Layer {
        &self.layers[self.layers.len() - 1]
    }

    fn context(&self) -> TrainingContext {
        TrainingContext::new(&self.config, self.training, self.update_step + 1)
    }

    /// Runs one example through every layer in order and returns the output
    /// layer's activations.
    pub fn forward(&mut self, input: &[f64]) -> Result<Vec<f64>> {
        if input.is_empty() {
            return Err(Error::usage("forward called with an empty input vector"));
        }
        let input_shape = self.layers[0].output_shape();
        let values = fit_length(input, input_shape.len(), "input");

        let ctx = self.context();
        let mut current = input_shape.reshape(&values);
        for layer in &mut self.layers {
            layer.forward(&current, &ctx, &mut self.rng);
            current = layer.output();
        }

        self.has_output = true;
        Ok(flatten(&current))
    }

    /// Backpropagates `target - output` from the last forward pass and
    /// accumulates gradients in every layer.
    pub fn backward(&mut self, target: &[f64]) -> Result<()> {
        if target.is_empty() {
            return Err(Error::usage("backward called with an empty target vector"));
        }
        let target = fit_length(target, self.output_size(), "target");
        let output = self.output();
        let errors: Vec<f64> = target.iter().zip(output.iter()).map(|(t, o)| t - o).collect();
        self.backward_errors(&errors)
    }

    /// Backpropagates externally computed output errors, e.g. from
    /// [`crate::cost::CostFunction::error`].
    pub fn backward_errors(&mut self, errors: &[f64]) -> Result<()> {
        if errors.is_empty() {
            return Err(Error::usage("backward called with an empty error vector"));
        }
        if !self.has_output {
            return Err(Error::usage("backward called before any forward pass"));
        }
        let output_shape = self.output_layer().output_shape();
        let errors = fit_length(errors, output_shape.len(), "error");

        let ctx = self.context();
        let last = self.layers.len() - 1;
        let mut output_errors = output_shape.reshape(&errors);

        for i in (1..=last).rev() {
            let input = self.layers[i - 1].output();
            self.layers[i].backward(&input, &output_errors, &ctx);
            output_errors = self.layers[i].input_errors();
        }
        Ok(())
    }

    pub fn reset_accumulated_gradients(&mut self) {
        for layer in &mut self.layers {
            layer.reset_accumulated_gradients();
        }
    }

    /// Updates every weight and bias from its accumulated gradient, then
    /// applies max-norm clipping over all weights of the network.
    pub fn apply_accumulated_gradients(&mut self) {
        let ctx = self.context();
        let mut totals = UpdateTotals::default();

        for layer in self.layers.iter_mut().skip(1) {
            layer.apply_accumulated_gradients(&ctx, &mut totals);
        }
        self.penalties += totals.penalties;

        if let Some(cap) = ctx.max_norm {
            if let Some(multiplier) = max_norm_multiplier(totals.squared_weight_sum, cap) {
                trace!(norm = totals.squared_weight_sum.sqrt(), cap, multiplier, "Max-norm rescale");
                for layer in self.layers.iter_mut().skip(1) {
                    layer.scale_weights(multiplier);
                }
            }
        }

        self.update_step += 1;
        trace!(
            step = self.update_step,
            l1 = totals.penalties.l1,
            l2 = totals.penalties.l2,
            "Applied accumulated gradients"
        );
    }

    /// Output layer activations from the last forward pass.
    pub fn output(&self) -> Vec<f64> {
        flatten(&self.output_layer().output())
    }

    /// The configured cost of the last output against `target`.
    pub fn cost(&self, target: &[f64]) -> f64 {
        self.config.cost.cost(target, &self.output())
    }

    /// Returns the L1/L2 penalty totals gathered since the last call and
    /// clears them.
    pub fn take_penalties(&mut self) -> Penalties {
        std::mem::take(&mut self.penalties)
    }
}

/// Pads with zeros or truncates to `expected`, warning when they differ.
fn fit_length(values: &[f64], expected: usize, what: &str) -> Vec<f64> {
    if values.len() != expected {
        warn!(expected, found = values.len(), "{what} vector length differs from layer width");
    }
    let mut fitted = values.to_vec();
    fitted.resize(expected, 0.0);
    fitted
}
