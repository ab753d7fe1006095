use serde::{Serialize, Deserialize};

use crate::activation::ActivationFunction;
use crate::error::{Error, Result};
use crate::network::config::NetworkConfig;

/// Describes one layer before it is wired.
///
/// Only the layer's own hyperparameters live here; channel counts, map sizes
/// and parameter tensors are derived from the previous layer during wiring.
/// An `activation` of `None` means "use the network default" (for pooling:
/// no activation at all).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Input {
        channels: usize,
        #[serde(default = "default_one")]
        map_size: usize,
    },
    FullyConnected {
        size: usize,
        #[serde(default)]
        activation: Option<ActivationFunction>,
    },
    Convolutional {
        filter_count: usize,
        #[serde(default = "default_filter_size")]
        filter_size: usize,
        /// Defaults to `filter_size / 2`, which keeps the map size at stride 1.
        #[serde(default)]
        zero_padding: Option<usize>,
        #[serde(default = "default_one")]
        stride: usize,
        #[serde(default)]
        activation: Option<ActivationFunction>,
    },
    Pooling {
        #[serde(default = "default_pool_size")]
        size: usize,
        /// Defaults to `size` (non-overlapping windows).
        #[serde(default)]
        stride: Option<usize>,
        #[serde(default)]
        activation: Option<ActivationFunction>,
    },
}

fn default_one() -> usize {
    1
}

fn default_filter_size() -> usize {
    3
}

fn default_pool_size() -> usize {
    2
}

impl LayerSpec {
    /// A flat input of `size` values.
    pub fn input(size: usize) -> LayerSpec {
        LayerSpec::Input { channels: size, map_size: 1 }
    }

    /// An input of `channels` square maps of side `map_size`.
    pub fn input_volume(channels: usize, map_size: usize) -> LayerSpec {
        LayerSpec::Input { channels, map_size }
    }

    pub fn fully_connected(size: usize) -> LayerSpec {
        LayerSpec::FullyConnected { size, activation: None }
    }

    /// `filter_count` filters of 3x3, "same" padding, stride 1.
    pub fn convolutional(filter_count: usize) -> LayerSpec {
        LayerSpec::Convolutional {
            filter_count,
            filter_size: default_filter_size(),
            zero_padding: None,
            stride: 1,
            activation: None,
        }
    }

    pub fn pooling(size: usize) -> LayerSpec {
        LayerSpec::Pooling { size, stride: None, activation: None }
    }

    pub fn with_activation(mut self, activator: ActivationFunction) -> LayerSpec {
        match &mut self {
            LayerSpec::Input { .. } => {}
            LayerSpec::FullyConnected { activation, .. }
            | LayerSpec::Convolutional { activation, .. }
            | LayerSpec::Pooling { activation, .. } => *activation = Some(activator),
        }
        self
    }

    /// Number of units a weight of the previous layer fans out to, used by
    /// the Xavier initializers.
    pub fn fan_out(&self) -> Option<usize> {
        match *self {
            LayerSpec::FullyConnected { size, .. } => Some(size),
            LayerSpec::Convolutional { filter_count, filter_size, .. } => {
                Some(filter_count * filter_size * filter_size)
            }
            LayerSpec::Input { .. } | LayerSpec::Pooling { .. } => None,
        }
    }
}

/// A layer entry in a [`NetworkSpec`]: either a bare size, shorthand for a
/// fully-connected layer (or the input layer when first), or a full spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerEntry {
    Size(usize),
    Spec(LayerSpec),
}

impl From<usize> for LayerEntry {
    fn from(size: usize) -> Self {
        LayerEntry::Size(size)
    }
}

impl From<LayerSpec> for LayerEntry {
    fn from(spec: LayerSpec) -> Self {
        LayerEntry::Spec(spec)
    }
}

/// A fully serializable description of a network architecture plus its
/// hyperparameters.
///
/// `NetworkSpec` can be saved to / loaded from JSON independently of the
/// trained weights, so an architecture can be stored before training starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Human-readable name used as the model file stem.
    pub name: String,
    /// Ordered list of layer entries (input → output).
    pub layers: Vec<LayerEntry>,
    #[serde(default)]
    pub config: NetworkConfig,
}

impl NetworkSpec {
    pub fn new<I, E>(name: impl Into<String>, layers: I) -> NetworkSpec
    where
        I: IntoIterator<Item = E>,
        E: Into<LayerEntry>,
    {
        NetworkSpec {
            name: name.into(),
            layers: layers.into_iter().map(Into::into).collect(),
            config: NetworkConfig::default(),
        }
    }

    pub fn with_config(mut self, config: NetworkConfig) -> NetworkSpec {
        self.config = config;
        self
    }

    /// Expands shorthand sizes and checks the overall layer sequence.
    ///
    /// Sizes and full specs cannot be mixed. The result starts with an input
    /// layer, contains no other, has at least two layers and ends with a
    /// fully-connected layer.
    pub fn resolve_layers(&self) -> Result<Vec<LayerSpec>> {
        let sizes = self.layers.iter().filter(|e| matches!(e, LayerEntry::Size(_))).count();
        if sizes > 0 && sizes < self.layers.len() {
            return Err(Error::config(
                "layer sizes and layer specs cannot be mixed in one network",
            ));
        }

        let specs: Vec<LayerSpec> = self.layers.iter()
            .enumerate()
            .map(|(i, entry)| match entry {
                LayerEntry::Size(size) if i == 0 => LayerSpec::input(*size),
                LayerEntry::Size(size) => LayerSpec::fully_connected(*size),
                LayerEntry::Spec(spec) => spec.clone(),
            })
            .collect();

        if specs.len() < 2 {
            return Err(Error::config(format!(
                "a network needs an input layer and at least one more layer, got {}",
                specs.len()
            )));
        }
        if !matches!(specs.last(), Some(LayerSpec::FullyConnected { .. })) {
            return Err(Error::config("the last layer must be fully-connected"));
        }
        Ok(specs)
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `NetworkSpec` from a JSON file.
    pub fn load_json(path: &str) -> Result<NetworkSpec> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
