//! Weight export and import.
//!
//! The JSON form mirrors the live parameter shapes:
//! `{"layers": [{"weights": [{"bias": b, "weights": [...]}, ...]}, ...]}`,
//! one entry per layer after the input layer. Fully-connected units carry a
//! flat weight vector, filters a `[channel][ky][kx]` array, and pooling
//! layers an empty unit list.
//!
//! The flat form concatenates `[bias, w0, w1, ...]` for every unit of every
//! layer with no delimiters; [`Network::data_sizes`] tells a reader how to
//! slice it.

use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::layers::Layer;
use crate::network::network::Network;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedNetwork {
    pub layers: Vec<ExportedLayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedLayer {
    pub weights: Vec<ExportedUnit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedUnit {
    pub bias: f64,
    pub weights: UnitWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnitWeights {
    Flat(Vec<f64>),
    Volume(Vec<Vec<Vec<f64>>>),
}

impl UnitWeights {
    fn describe(&self) -> String {
        match self {
            UnitWeights::Flat(w) => format!("flat[{}]", w.len()),
            UnitWeights::Volume(v) => {
                let rows = v.first().map_or(0, |k| k.len());
                let cols = v.first().and_then(|k| k.first()).map_or(0, |r| r.len());
                format!("volume[{}][{}][{}]", v.len(), rows, cols)
            }
        }
    }

    /// Whether every channel/row has the given extents.
    fn is_volume(&self, channels: usize, size: usize) -> bool {
        match self {
            UnitWeights::Volume(v) => {
                v.len() == channels
                    && v.iter().all(|k| k.len() == size && k.iter().all(|r| r.len() == size))
            }
            UnitWeights::Flat(_) => false,
        }
    }
}

fn export_layer(layer: &Layer) -> ExportedLayer {
    let weights = match layer {
        Layer::FullyConnected(fc) => fc.neurons.iter()
            .map(|n| ExportedUnit { bias: n.bias, weights: UnitWeights::Flat(n.weights.clone()) })
            .collect(),
        Layer::Convolutional(conv) => conv.filters.iter()
            .map(|f| ExportedUnit { bias: f.bias, weights: UnitWeights::Volume(f.weights.clone()) })
            .collect(),
        Layer::Input(_) | Layer::Pooling(_) => Vec::new(),
    };
    ExportedLayer { weights }
}

fn check_layer(index: usize, layer: &Layer, exported: &ExportedLayer) -> Result<()> {
    if exported.weights.len() != layer.unit_count() {
        return Err(Error::shape_mismatch(
            format!("layer {index}"),
            format!("{} units", layer.unit_count()),
            format!("{} units", exported.weights.len()),
        ));
    }

    for (unit, exported_unit) in exported.weights.iter().enumerate() {
        let (ok, expected) = match layer {
            Layer::FullyConnected(fc) => {
                let n = fc.neurons[unit].weights.len();
                let ok = matches!(&exported_unit.weights, UnitWeights::Flat(w) if w.len() == n);
                (ok, format!("flat[{n}]"))
            }
            Layer::Convolutional(conv) => {
                let (c, f) = (conv.input_shape.channels, conv.filter_size);
                (exported_unit.weights.is_volume(c, f), format!("volume[{c}][{f}][{f}]"))
            }
            Layer::Input(_) | Layer::Pooling(_) => (true, String::new()),
        };
        if !ok {
            return Err(Error::shape_mismatch(
                format!("layer {index}, unit {unit}"),
                expected,
                exported_unit.weights.describe(),
            ));
        }
    }
    Ok(())
}

fn import_layer(layer: &mut Layer, exported: &ExportedLayer) {
    match layer {
        Layer::FullyConnected(fc) => {
            for (neuron, unit) in fc.neurons.iter_mut().zip(&exported.weights) {
                neuron.bias = unit.bias;
                if let UnitWeights::Flat(w) = &unit.weights {
                    neuron.weights.copy_from_slice(w);
                }
            }
        }
        Layer::Convolutional(conv) => {
            for (filter, unit) in conv.filters.iter_mut().zip(&exported.weights) {
                filter.bias = unit.bias;
                if let UnitWeights::Volume(v) = &unit.weights {
                    filter.weights.clone_from(v);
                }
            }
        }
        Layer::Input(_) | Layer::Pooling(_) => {}
    }
}

impl Network {
    pub fn export_weights(&self) -> ExportedNetwork {
        ExportedNetwork {
            layers: self.layers().iter().skip(1).map(export_layer).collect(),
        }
    }

    /// Overwrites every bias and weight from `exported`. All shapes are
    /// checked first; on mismatch nothing is written.
    pub fn import_weights(&mut self, exported: &ExportedNetwork) -> Result<()> {
        let expected = self.layers().len() - 1;
        if exported.layers.len() != expected {
            return Err(Error::shape_mismatch(
                "network",
                format!("{expected} layers"),
                format!("{} layers", exported.layers.len()),
            ));
        }
        for (i, (layer, exported_layer)) in self.layers().iter().skip(1).zip(&exported.layers).enumerate() {
            check_layer(i + 1, layer, exported_layer)?;
        }
        for (layer, exported_layer) in self.layers_mut().iter_mut().skip(1).zip(&exported.layers) {
            import_layer(layer, exported_layer);
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.export_weights())?)
    }

    pub fn import_json(&mut self, json: &str) -> Result<()> {
        let exported: ExportedNetwork = serde_json::from_str(json)?;
        self.import_weights(&exported)
    }

    /// Serializes the weights to a pretty-printed JSON file.
    pub fn save_weights_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.export_weights())?;
        Ok(())
    }

    /// Loads weights written by `save_weights_json` into this network.
    pub fn load_weights_json(&mut self, path: &str) -> Result<()> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let exported: ExportedNetwork = serde_json::from_reader(reader)?;
        self.import_weights(&exported)
    }

    /// Scalars per non-input layer in the flat export.
    pub fn data_sizes(&self) -> Vec<usize> {
        self.layers().iter().skip(1).map(Layer::data_size).collect()
    }

    pub fn export_flat(&self) -> Vec<f64> {
        self.layers().iter().skip(1).flat_map(Layer::flat_parameters).collect()
    }

    /// Inverse of `export_flat`. Fails without writing anything when the
    /// length disagrees with `data_sizes`.
    pub fn import_flat(&mut self, values: &[f64]) -> Result<()> {
        let sizes = self.data_sizes();
        let total: usize = sizes.iter().sum();
        if values.len() != total {
            return Err(Error::shape_mismatch("flat parameters", format!("{total} scalars"), format!("{} scalars", values.len())));
        }

        let mut offset = 0;
        for (layer, size) in self.layers_mut().iter_mut().skip(1).zip(sizes) {
            layer.load_flat_parameters(&values[offset..offset + size]);
            offset += size;
        }
        Ok(())
    }

    /// The flat export as little-endian `f64` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.export_flat().iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    pub fn from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() % 8 != 0 {
            return Err(Error::shape_mismatch("byte buffer", "a multiple of 8 bytes", format!("{} bytes", bytes.len())));
        }
        let values: Vec<f64> = bytes.chunks_exact(8)
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw)
            })
            .collect();
        self.import_flat(&values)
    }
}
